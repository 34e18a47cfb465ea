//! Shared fixtures for the pipeline integration tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::time::Duration;

use atlas_core::geo::LineString;
use atlas_core::pipeline::{ProgressObserver, Step, StepState};
use atlas_core::sources::{
    Band, DemResponse, DemSource, ImageryRequest, ImageryResponse, ImagerySource, OutputSink, Scene,
    SourceError, VectorLayer, VectorResponse, VectorSet, VectorSource,
};
use atlas_core::{
    Aoi, Bounds, GridSpec, LonLat, Mode, Raster, RunParameters, RunRequest, ScoreMeta, ScoreRaster,
    Target, ThresholdMethod,
};

pub const SIZE: usize = 64;
/// Degrees per pixel (about 111 m at the equator).
pub const CELL_DEG: f64 = 0.001;

pub fn bounds() -> Bounds {
    Bounds::new(10.0, 0.0, 10.0 + SIZE as f64 * CELL_DEG, SIZE as f64 * CELL_DEG)
}

pub fn grid() -> GridSpec {
    GridSpec::from_bounds(bounds(), SIZE, SIZE)
}

pub fn aoi() -> Aoi {
    Aoi::from_bounds(bounds()).unwrap()
}

pub fn request(mode: Mode, params: RunParameters) -> RunRequest {
    RunRequest { run_id: "run".to_string(), aoi: aoi(), mode, params }
}

pub fn fixed(value: f64) -> RunParameters {
    RunParameters { threshold: ThresholdMethod::Fixed(value), ..RunParameters::default() }
}

// ── Imagery ─────────────────────────────────────────────────────────────────

/// Reflectances of a dry, lightly vegetated background:
/// NDVI 0.25, NDWI ≈ −0.43, BSI ≈ 0.
pub const BACKGROUND: [(Band, f32); 5] =
    [(Band::B2, 0.1), (Band::B3, 0.1), (Band::B4, 0.15), (Band::B8, 0.25), (Band::B11, 0.2)];

/// A scene of uniform background reflectance.
pub fn background_scene(id: &str) -> Scene {
    let g = grid();
    let bands = BACKGROUND.iter().map(|&(b, v)| (b, Raster::new(g.clone(), v))).collect();
    Scene { id: id.to_string(), cloud_cover: Some(5.0), bands }
}

/// Set `band` to `value` over the rows and columns given.
pub fn paint(scene: &mut Scene, band: Band, rows: std::ops::Range<usize>, cols: std::ops::Range<usize>, value: f32) {
    let r = scene.bands.get_mut(&band).unwrap();
    for row in rows {
        for col in cols.clone() {
            r.set(row, col, value);
        }
    }
}

/// Bare sand (high SWIR) along the six western columns.
pub fn coastal_scene() -> Scene {
    let mut s = background_scene("coastal");
    paint(&mut s, Band::B11, 0..SIZE, 0..6, 0.6);
    s
}

// ── Vectors ─────────────────────────────────────────────────────────────────

pub fn west_coastline() -> VectorSet {
    let b = bounds();
    VectorSet::new(vec![LineString::new(vec![LonLat::new(b.min_x, b.min_y), LonLat::new(b.min_x, b.max_y)])])
}

pub fn east_road() -> VectorSet {
    let b = bounds();
    VectorSet::new(vec![LineString::new(vec![LonLat::new(b.max_x, b.min_y), LonLat::new(b.max_x, b.max_y)])])
}

// ── Collaborators ───────────────────────────────────────────────────────────

pub enum DemReply {
    Raster(Raster),
    NotAvailable,
    Error,
}

pub enum VectorReply {
    Lines(VectorSet),
    Empty,
    Timeout,
    Fail,
}

/// Canned responses, with call counters.
pub struct FixtureSource {
    pub scenes: Vec<Scene>,
    pub dem: DemReply,
    /// Layers without an entry answer `Empty`.
    pub vectors: BTreeMap<VectorLayer, VectorReply>,
    pub calls: Cell<usize>,
}

impl FixtureSource {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self {
            scenes,
            dem: DemReply::Raster(Raster::new(grid(), 25.0)),
            vectors: BTreeMap::new(),
            calls: Cell::new(0),
        }
    }

    /// Sand strip, flat DEM at 25 m, coastline on the west edge, road on the
    /// east edge, no rivers.
    pub fn coastal() -> Self {
        let mut s = Self::new(vec![coastal_scene()]);
        s.vectors.insert(VectorLayer::Coastline, VectorReply::Lines(west_coastline()));
        s.vectors.insert(VectorLayer::Roads, VectorReply::Lines(east_road()));
        s
    }

    pub fn with_vector(mut self, layer: VectorLayer, reply: VectorReply) -> Self {
        self.vectors.insert(layer, reply);
        self
    }

    pub fn with_dem(mut self, dem: DemReply) -> Self {
        self.dem = dem;
        self
    }

    fn tick(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl ImagerySource for FixtureSource {
    fn search_and_compose(&self, _req: &ImageryRequest<'_>) -> Result<ImageryResponse, SourceError> {
        self.tick();
        if self.scenes.is_empty() {
            return Ok(ImageryResponse::NotAvailable);
        }
        Ok(ImageryResponse::Scenes(self.scenes.clone()))
    }
}

impl DemSource for FixtureSource {
    fn fetch_dem(&self, _aoi: &Aoi, _collections: &[String]) -> Result<DemResponse, SourceError> {
        self.tick();
        match &self.dem {
            DemReply::Raster(r) => Ok(DemResponse::Raster(r.clone())),
            DemReply::NotAvailable => Ok(DemResponse::NotAvailable),
            DemReply::Error => Err(SourceError::Failed("connection reset".to_string())),
        }
    }
}

impl VectorSource for FixtureSource {
    fn query_vectors(&self, _aoi: &Aoi, layer: VectorLayer, timeout: Duration) -> Result<VectorResponse, SourceError> {
        self.tick();
        match self.vectors.get(&layer) {
            Some(VectorReply::Lines(set)) => Ok(VectorResponse::Features(set.clone())),
            Some(VectorReply::Empty) | None => Ok(VectorResponse::Empty),
            Some(VectorReply::Timeout) => Err(SourceError::Timeout { after: timeout }),
            Some(VectorReply::Fail) => Err(SourceError::Failed("HTTP 502".to_string())),
        }
    }
}

/// Records every transition it is told about.
#[derive(Default)]
pub struct Recorder {
    pub events: RefCell<Vec<(Step, StepState)>>,
}

impl ProgressObserver for Recorder {
    fn on_step(&self, step: Step, state: StepState) {
        self.events.borrow_mut().push((step, state));
    }
}

/// Sink that keeps the published target ids, or refuses everything.
#[derive(Default)]
pub struct Collector {
    pub refuse: bool,
    pub published: RefCell<Vec<(String, Vec<String>)>>,
}

impl OutputSink for Collector {
    fn publish(&self, run_id: &str, _score: &ScoreRaster, targets: &[Target], _meta: &ScoreMeta) -> Result<(), SourceError> {
        if self.refuse {
            return Err(SourceError::Failed("disk full".to_string()));
        }
        let ids = targets.iter().map(|t| t.id.clone()).collect();
        self.published.borrow_mut().push((run_id.to_string(), ids));
        Ok(())
    }
}
