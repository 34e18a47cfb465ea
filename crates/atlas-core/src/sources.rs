//! Data-source collaborators.
//!
//! The pipeline consumes imagery, DEM and map vectors through these traits
//! and never talks to a network or a disk itself. Each call is blocking from
//! the pipeline's point of view; retries and timeouts belong to the
//! implementor.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{Aoi, LineString};
use crate::params::TimeRange;
use crate::raster::Raster;
use crate::scoring::{ScoreMeta, ScoreRaster};
use crate::targets::Target;

/// Sentinel-2 bands used by the feature engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    /// Blue.
    B2,
    /// Green.
    B3,
    /// Red.
    B4,
    /// Near infrared.
    B8,
    /// Short-wave infrared.
    B11,
}

impl Band {
    pub const ALL: [Band; 5] = [Band::B2, Band::B3, Band::B4, Band::B8, Band::B11];
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One acquired scene: a raster per band plus its cloud cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    /// Percent; `None` when the catalogue did not report it.
    pub cloud_cover: Option<f64>,
    pub bands: BTreeMap<Band, Raster>,
}

/// Imagery search parameters handed to the collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageryRequest<'a> {
    pub aoi: &'a Aoi,
    /// STAC API root the collaborator searches.
    pub api_url: &'a str,
    pub collection: &'a str,
    pub time_range: Option<&'a TimeRange>,
    pub cloud_cover_max: f64,
    pub max_items: usize,
    pub bands: &'a [Band],
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageryResponse {
    Scenes(Vec<Scene>),
    NotAvailable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DemResponse {
    Raster(Raster),
    NotAvailable,
}

/// Map-vector layers queried for distance rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorLayer {
    Roads,
    Rivers,
    Coastline,
}

impl VectorLayer {
    pub const ALL: [VectorLayer; 3] = [VectorLayer::Roads, VectorLayer::Rivers, VectorLayer::Coastline];

    pub fn name(&self) -> &'static str {
        match self {
            VectorLayer::Roads => "roads",
            VectorLayer::Rivers => "rivers",
            VectorLayer::Coastline => "coastline",
        }
    }
}

impl fmt::Display for VectorLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Line features of one layer, in lon/lat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorSet {
    pub lines: Vec<LineString>,
}

impl VectorSet {
    pub fn new(lines: Vec<LineString>) -> Self {
        Self { lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.points().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VectorResponse {
    Features(VectorSet),
    Empty,
}

/// Failure reported by a collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("{0}")]
    Failed(String),
}

pub trait ImagerySource {
    fn search_and_compose(&self, req: &ImageryRequest<'_>) -> Result<ImageryResponse, SourceError>;
}

pub trait DemSource {
    /// `collections` are tried in order; the first hit wins.
    fn fetch_dem(&self, aoi: &Aoi, collections: &[String]) -> Result<DemResponse, SourceError>;
}

pub trait VectorSource {
    fn query_vectors(
        &self,
        aoi: &Aoi,
        layer: VectorLayer,
        timeout: Duration,
    ) -> Result<VectorResponse, SourceError>;
}

/// Receives the artifacts of a completed run (rendering, export).
pub trait OutputSink {
    fn publish(
        &self,
        run_id: &str,
        score: &ScoreRaster,
        targets: &[Target],
        meta: &ScoreMeta,
    ) -> Result<(), SourceError>;
}

/// A collaborator with no data at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSources;

impl ImagerySource for NoSources {
    fn search_and_compose(&self, _req: &ImageryRequest<'_>) -> Result<ImageryResponse, SourceError> {
        Ok(ImageryResponse::NotAvailable)
    }
}

impl DemSource for NoSources {
    fn fetch_dem(&self, _aoi: &Aoi, _collections: &[String]) -> Result<DemResponse, SourceError> {
        Ok(DemResponse::NotAvailable)
    }
}

impl VectorSource for NoSources {
    fn query_vectors(
        &self,
        _aoi: &Aoi,
        _layer: VectorLayer,
        _timeout: Duration,
    ) -> Result<VectorResponse, SourceError> {
        Ok(VectorResponse::Empty)
    }
}
