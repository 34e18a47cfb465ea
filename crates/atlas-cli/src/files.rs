//! File-backed data source: pre-downloaded scenes, DEM and vectors as JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::debug;

use atlas_core::sources::{
    DemResponse, DemSource, ImageryRequest, ImageryResponse, ImagerySource, Scene, SourceError,
    VectorLayer, VectorResponse, VectorSet, VectorSource,
};
use atlas_core::{Aoi, Raster};

/// A missing file means the collaborator has nothing for that request.
#[derive(Debug, Default)]
pub struct FileSource {
    scenes: Vec<Scene>,
    dem: Option<Raster>,
    vectors: BTreeMap<VectorLayer, VectorSet>,
}

impl FileSource {
    pub fn load(dir: &Path) -> Result<Self> {
        let source = Self {
            scenes: read_optional(&dir.join("scenes.json"))?.unwrap_or_default(),
            dem: read_optional(&dir.join("dem.json"))?,
            vectors: read_optional(&dir.join("vectors.json"))?.unwrap_or_default(),
        };
        debug!(
            scenes = source.scenes.len(),
            dem = source.dem.is_some(),
            layers = source.vectors.len(),
            "data directory loaded"
        );
        Ok(source)
    }
}

fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(value))
}

impl ImagerySource for FileSource {
    fn search_and_compose(&self, _req: &ImageryRequest<'_>) -> Result<ImageryResponse, SourceError> {
        if self.scenes.is_empty() {
            return Ok(ImageryResponse::NotAvailable);
        }
        Ok(ImageryResponse::Scenes(self.scenes.clone()))
    }
}

impl DemSource for FileSource {
    fn fetch_dem(&self, _aoi: &Aoi, _collections: &[String]) -> Result<DemResponse, SourceError> {
        Ok(match &self.dem {
            Some(r) => DemResponse::Raster(r.clone()),
            None => DemResponse::NotAvailable,
        })
    }
}

impl VectorSource for FileSource {
    fn query_vectors(
        &self,
        _aoi: &Aoi,
        layer: VectorLayer,
        _timeout: Duration,
    ) -> Result<VectorResponse, SourceError> {
        Ok(match self.vectors.get(&layer) {
            Some(set) => VectorResponse::Features(set.clone()),
            None => VectorResponse::Empty,
        })
    }
}
