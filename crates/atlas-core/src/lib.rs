//! Prospectivity run pipeline.
//!
//! Turns imagery, terrain and map-vector data over an area of interest into a
//! normalized score raster and a ranked set of target polygons with evidence.
//!
//! Stages, leaf-first:
//!   features  → analytic layers on one shared grid
//!   scoring   → weighted per-mode combination + water mask
//!   targets   → threshold, 4-connected components, polygons, evidence
//!   pipeline  → step sequencing, data-source fallbacks, run outcome

pub mod config;
pub mod error;
pub mod features;
pub mod geo;
pub mod params;
pub mod pipeline;
pub mod raster;
pub mod scoring;
pub mod sources;
pub mod stats;
pub mod synthetic;
pub mod targets;

mod parallel;

pub use config::Settings;
pub use error::{PipelineError, Result};
pub use geo::{Aoi, Bounds, LineString, LonLat, Polygon};
pub use params::{Mode, RunParameters, ThresholdMethod};
pub use pipeline::store::{MemoryRunStore, RunContext, RunStore, StoreError};
pub use pipeline::{
    DataSources, Fallback, NoProgress, Pipeline, ProgressObserver, RunArtifacts, RunFailure,
    RunOutcome, RunRequest, RunResult, Step, StepState,
};
pub use raster::{Crs, GeoTransform, GridSpec, Raster};
pub use scoring::{ScoreMeta, ScoreRaster, SubScore};
pub use targets::{EvidenceEntry, ReasonChip, Target};
