//! Feature engine: raw inputs → analytic layers on one shared grid.
//!
//! Every output raster uses the reference grid handed in by the caller;
//! inputs on other grids are resampled first (bilinear for continuous
//! values).

pub mod composite;
pub mod distance;
pub mod geology;
pub mod indices;
pub mod lineaments;
pub mod terrain;

mod gradient;

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Result;
use crate::params::Mode;
use crate::raster::{GridSpec, Raster, Resampling};
use crate::sources::{Band, Scene, VectorLayer, VectorSet};

use geology::GeologyLayer;

/// Raw inputs gathered by the acquisition steps.
pub struct FeatureInputs<'a> {
    pub mode: Mode,
    pub grid: &'a GridSpec,
    pub scenes: &'a [Scene],
    pub dem: &'a Raster,
    /// Present layers only; a missing key is an absent layer.
    pub vectors: &'a BTreeMap<VectorLayer, VectorSet>,
    pub geology: Option<&'a GeologyLayer>,
}

/// Analytic layers for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStack {
    pub grid: GridSpec,
    pub composite: BTreeMap<Band, Raster>,
    pub ndvi: Raster,
    pub ndwi: Raster,
    pub bsi: Raster,
    pub dem: Raster,
    pub slope: Raster,
    pub hillshade: Raster,
    /// Hardrock mode only.
    pub lineaments: Option<Raster>,
    /// One raster per layer; absent layers are entirely no-data.
    pub distances: BTreeMap<VectorLayer, Raster>,
    /// Hardrock mode with at least one favorable geology polygon.
    pub geology: Option<Raster>,
}

impl FeatureStack {
    /// Distance raster of `layer`, `None` when the layer was absent.
    pub fn distance(&self, layer: VectorLayer) -> Option<&Raster> {
        self.distances.get(&layer).filter(|r| !r.is_all_nodata())
    }
}

pub fn compute_features(inputs: &FeatureInputs<'_>) -> Result<FeatureStack> {
    let grid = inputs.grid;
    let composite = composite::median_composite(inputs.scenes, &Band::ALL, grid)?;
    let band = |b: Band| &composite[&b];

    let ndvi = indices::ndvi(band(Band::B8), band(Band::B4))?;
    let ndwi = indices::ndwi(band(Band::B3), band(Band::B8))?;
    let bsi = indices::bsi(band(Band::B11), band(Band::B4), band(Band::B8), band(Band::B2))?;

    let dem = inputs.dem.resample_to(grid, Resampling::Bilinear);
    let slope = terrain::slope_deg(&dem);
    let hillshade = terrain::hillshade(&dem);

    let lineaments = match inputs.mode {
        Mode::Hardrock => Some(lineaments::lineament_density(&hillshade)),
        Mode::Coastal => None,
    };

    let distances = VectorLayer::ALL
        .iter()
        .map(|&layer| {
            let raster = match inputs.vectors.get(&layer) {
                Some(set) => distance::distance_raster(set, grid),
                None => Raster::nodata(grid.clone()),
            };
            (layer, raster)
        })
        .collect();

    let geology = match (inputs.mode, inputs.geology) {
        (Mode::Hardrock, Some(layer)) => geology::geology_mask(layer, grid),
        _ => None,
    };

    debug!(
        width = grid.width,
        height = grid.height,
        scenes = inputs.scenes.len(),
        lineaments = lineaments.is_some(),
        geology = geology.is_some(),
        "features computed"
    );

    Ok(FeatureStack {
        grid: grid.clone(),
        composite,
        ndvi,
        ndwi,
        bsi,
        dem,
        slope,
        hillshade,
        lineaments,
        distances,
        geology,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Bounds;
    use crate::params::SyntheticGrid;
    use crate::synthetic::SyntheticSource;

    #[test]
    fn synthetic_stack_shares_one_grid() {
        let src = SyntheticSource::new(Bounds::new(30.0, -5.0, 30.05, -4.95), SyntheticGrid { width: 24, height: 20 });
        let scenes = [src.scene()];
        let dem = src.dem();
        let mut vectors = BTreeMap::new();
        vectors.insert(VectorLayer::Roads, src.vectors(VectorLayer::Roads));
        let stack = compute_features(&FeatureInputs {
            mode: Mode::Hardrock,
            grid: src.grid(),
            scenes: &scenes,
            dem: &dem,
            vectors: &vectors,
            geology: None,
        })
        .unwrap();

        for r in [&stack.ndvi, &stack.ndwi, &stack.bsi, &stack.slope, &stack.hillshade] {
            assert_eq!(&r.grid, src.grid());
        }
        assert!(stack.lineaments.is_some());
        assert!(stack.distance(VectorLayer::Roads).is_some());
        assert!(stack.distance(VectorLayer::Rivers).is_none());
        assert!(stack.distances[&VectorLayer::Coastline].is_all_nodata());
        assert!(stack.geology.is_none());
    }
}
