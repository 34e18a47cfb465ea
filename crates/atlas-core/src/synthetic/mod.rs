//! Deterministic, network-free data path.
//!
//! Everything is derived from the AOI bounds and the requested grid size; the
//! same inputs always produce bit-identical rasters and vectors.

pub mod fbm;

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::geo::{Aoi, Bounds, LineString, LonLat};
use crate::params::SyntheticGrid;
use crate::raster::{GridSpec, Raster};
use crate::sources::{
    Band, DemResponse, DemSource, ImageryRequest, ImageryResponse, ImagerySource, Scene,
    SourceError, VectorLayer, VectorResponse, VectorSet, VectorSource,
};
use fbm::Fbm;

const NOISE_SEED: u64 = 42;
const RELIEF_SEED: u32 = 42;
const NOISE_AMPLITUDE: f32 = 0.05;

/// `(scale, bias)` applied to the shared base pattern per band.
const BAND_PROFILE: [(Band, f32, f32); 5] = [
    (Band::B2, 0.6, 0.1),
    (Band::B3, 0.7, 0.1),
    (Band::B4, 0.8, 0.05),
    (Band::B8, 0.9, 0.02),
    (Band::B11, 0.7, 0.08),
];

/// Serves imagery, DEM and vectors synthesized over one grid.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    grid: GridSpec,
}

impl SyntheticSource {
    pub fn new(bounds: Bounds, size: SyntheticGrid) -> Self {
        Self { grid: GridSpec::from_bounds(bounds, size.width, size.height) }
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// Smooth sinusoid over normalized grid coordinates, in `[0, 1]`.
    fn base(&self, row: usize, col: usize) -> f32 {
        let u = (col as f64 + 0.5) / self.grid.width as f64;
        let v = (row as f64 + 0.5) / self.grid.height as f64;
        (0.5 + 0.25 * ((TAU * u).sin() + (TAU * v).cos())) as f32
    }

    /// One five-band scene. All bands share the same noise field.
    pub fn scene(&self) -> Scene {
        let mut rng = StdRng::seed_from_u64(NOISE_SEED);
        let noise: Vec<f32> = (0..self.grid.len())
            .map(|_| rng.gen_range(-NOISE_AMPLITUDE..=NOISE_AMPLITUDE))
            .collect();

        let mut bands = BTreeMap::new();
        for (band, scale, bias) in BAND_PROFILE {
            let mut r = Raster::new(self.grid.clone(), 0.0);
            for row in 0..self.grid.height {
                for col in 0..self.grid.width {
                    let i = self.grid.index(row, col);
                    let v = self.base(row, col) * scale + bias + noise[i];
                    r.data[i] = v.clamp(0.0, 1.0);
                }
            }
            bands.insert(band, r);
        }
        Scene { id: "synthetic".to_string(), cloud_cover: Some(0.0), bands }
    }

    /// Planar ramp rising to the east and north, plus fBm relief. Metres.
    pub fn dem(&self) -> Raster {
        let relief = Fbm::new(RELIEF_SEED, 0.8, 5);
        let mut r = Raster::new(self.grid.clone(), 0.0);
        let (w, h) = (self.grid.width as f64, self.grid.height as f64);
        for row in 0..self.grid.height {
            for col in 0..self.grid.width {
                let u = (col as f64 + 0.5) / w;
                let v = 1.0 - (row as f64 + 0.5) / h;
                let z = 20.0 + 60.0 * u + 30.0 * v + 40.0 * relief.sample(u * 4.0, v * 4.0);
                r.set(row, col, z as f32);
            }
        }
        r
    }

    /// Coastline on the western edge, a river from north-west to south-east,
    /// a road along the middle latitude.
    pub fn vectors(&self, layer: VectorLayer) -> VectorSet {
        let b = self.grid.bounds();
        let mid = (b.min_y + b.max_y) / 2.0;
        let line = match layer {
            VectorLayer::Coastline => vec![LonLat::new(b.min_x, b.min_y), LonLat::new(b.min_x, b.max_y)],
            VectorLayer::Rivers => vec![LonLat::new(b.min_x, b.max_y), LonLat::new(b.max_x, b.min_y)],
            VectorLayer::Roads => vec![LonLat::new(b.min_x, mid), LonLat::new(b.max_x, mid)],
        };
        VectorSet::new(vec![LineString::new(line)])
    }
}

impl ImagerySource for SyntheticSource {
    fn search_and_compose(&self, _req: &ImageryRequest<'_>) -> Result<ImageryResponse, SourceError> {
        Ok(ImageryResponse::Scenes(vec![self.scene()]))
    }
}

impl DemSource for SyntheticSource {
    fn fetch_dem(&self, _aoi: &Aoi, _collections: &[String]) -> Result<DemResponse, SourceError> {
        Ok(DemResponse::Raster(self.dem()))
    }
}

impl VectorSource for SyntheticSource {
    fn query_vectors(
        &self,
        _aoi: &Aoi,
        layer: VectorLayer,
        _timeout: Duration,
    ) -> Result<VectorResponse, SourceError> {
        Ok(VectorResponse::Features(self.vectors(layer)))
    }
}
