//! Run orchestrator.
//!
//! ```text
//! fetch_imagery → fetch_dem → fetch_osm → compute_features → score
//!               → extract_targets → generate_outputs
//! ```
//!
//! DEM and vector gaps fall back (flat DEM, absent layer) and are recorded in
//! [`ScoreMeta::fallbacks`]. Every other error halts the run; a failed run
//! exposes no score or targets.

pub mod steps;
pub mod store;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::features::{compute_features, FeatureInputs};
use crate::geo::Aoi;
use crate::params::{Mode, RunParameters};
use crate::raster::{GridSpec, Raster};
use crate::scoring::{self, ScoreMeta, ScoreRaster};
use crate::sources::{
    Band, DemResponse, DemSource, ImageryRequest, ImageryResponse, ImagerySource, OutputSink, Scene,
    SourceError, VectorLayer, VectorResponse, VectorSet, VectorSource,
};
use crate::synthetic::SyntheticSource;
use crate::targets::{self, Target};

pub use steps::{ActiveStep, Step, StepSequence, StepState, StepStatus};

// ── Run model ────────────────────────────────────────────────────────────────

/// Why a vector layer is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCause {
    Empty,
    TimedOut,
}

/// A data gap the run absorbed instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fallback {
    /// Constant zero elevation stood in for the DEM.
    FlatDem { reason: String },
    /// The layer's distance raster is entirely no-data.
    MissingVectorLayer { layer: VectorLayer, cause: MissingCause },
    /// A geology upload was supplied but no polygon matched a favorable
    /// lithology.
    GeologyWithoutMatches,
}

/// One run to execute. Immutable for the run's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub run_id: String,
    pub aoi: Aoi,
    pub mode: Mode,
    pub params: RunParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArtifacts {
    pub score: ScoreRaster,
    /// Rank order.
    pub targets: Vec<Target>,
    pub meta: ScoreMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Human-readable, prefixed with the failing step's name.
    pub error: String,
    /// `None` when the request was rejected before any step ran.
    pub failed_step: Option<Step>,
    pub last_completed_step: Option<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(RunArtifacts),
    Failed(RunFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub steps: Vec<StepStatus>,
    pub outcome: RunOutcome,
}

impl RunResult {
    pub fn artifacts(&self) -> Option<&RunArtifacts> {
        match &self.outcome {
            RunOutcome::Completed(a) => Some(a),
            RunOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        match &self.outcome {
            RunOutcome::Completed(_) => None,
            RunOutcome::Failed(f) => Some(f),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.artifacts().is_some()
    }
}

// ── Collaborators ────────────────────────────────────────────────────────────

/// Receives every step transition as it happens.
pub trait ProgressObserver {
    fn on_step(&self, step: Step, state: StepState);
}

/// Observer that ignores progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_step(&self, _step: Step, _state: StepState) {}
}

/// The collaborators one run reads from and publishes to.
#[derive(Clone, Copy)]
pub struct DataSources<'a> {
    pub imagery: &'a dyn ImagerySource,
    pub dem: &'a dyn DemSource,
    pub vectors: &'a dyn VectorSource,
    pub sink: Option<&'a dyn OutputSink>,
}

impl<'a> DataSources<'a> {
    /// Use one collaborator for imagery, DEM and vectors.
    pub fn new<S>(source: &'a S) -> Self
    where
        S: ImagerySource + DemSource + VectorSource,
    {
        Self { imagery: source, dem: source, vectors: source, sink: None }
    }

    pub fn with_sink(mut self, sink: &'a dyn OutputSink) -> Self {
        self.sink = Some(sink);
        self
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

/// A step's error, tagged with the step it came from.
struct Halted {
    step: Step,
    error: PipelineError,
}

/// Executes runs against process-wide settings. Holds no per-run state, so
/// one `Pipeline` may serve concurrent runs.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    settings: Settings,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Reject a request before any step executes.
    pub fn validate(&self, req: &RunRequest) -> Result<()> {
        if req.run_id.trim().is_empty() {
            return Err(PipelineError::invalid("run_id", "must not be empty"));
        }
        let area = req.aoi.area_km2();
        if !(area > 0.0) {
            return Err(PipelineError::invalid("aoi", "area must be greater than zero"));
        }
        if area > self.settings.max_aoi_km2 {
            return Err(PipelineError::invalid(
                "aoi",
                format!("area {area:.1} km² exceeds the {} km² limit", self.settings.max_aoi_km2),
            ));
        }
        req.params.validate(req.mode)
    }

    /// Run the full step sequence for `req`.
    pub fn execute(
        &self,
        req: &RunRequest,
        sources: &DataSources<'_>,
        observer: &dyn ProgressObserver,
    ) -> RunResult {
        let mut seq = StepSequence::new();

        if let Err(error) = self.validate(req) {
            warn!(run_id = %req.run_id, %error, "run rejected");
            return RunResult {
                run_id: req.run_id.clone(),
                steps: seq.snapshot(),
                outcome: RunOutcome::Failed(RunFailure {
                    error: error.to_string(),
                    failed_step: None,
                    last_completed_step: None,
                }),
            };
        }

        // Synthetic mode replaces the acquisition collaborators, never the sink.
        let synthetic = req.params.synthetic.map(|size| SyntheticSource::new(req.aoi.bounds(), size));
        let sources = match &synthetic {
            Some(s) => DataSources { sink: sources.sink, ..DataSources::new(s) },
            None => *sources,
        };

        info!(run_id = %req.run_id, mode = %req.mode, synthetic = synthetic.is_some(), "run started");
        let outcome = match self.run_steps(req, &sources, &mut seq, observer) {
            Ok(artifacts) => {
                info!(
                    run_id = %req.run_id,
                    targets = artifacts.targets.len(),
                    fallbacks = artifacts.meta.fallbacks.len(),
                    "run completed"
                );
                RunOutcome::Completed(artifacts)
            }
            Err(Halted { step, error }) => {
                let error = format!("{step}: {error}");
                warn!(run_id = %req.run_id, %error, "run failed");
                RunOutcome::Failed(RunFailure {
                    error,
                    failed_step: Some(step),
                    last_completed_step: seq.last_completed(),
                })
            }
        };

        RunResult { run_id: req.run_id.clone(), steps: seq.snapshot(), outcome }
    }

    fn run_steps(
        &self,
        req: &RunRequest,
        sources: &DataSources<'_>,
        seq: &mut StepSequence,
        observer: &dyn ProgressObserver,
    ) -> std::result::Result<RunArtifacts, Halted> {
        let params = &req.params;
        let mut fallbacks = Vec::new();

        // ── 1. Imagery ──────────────────────────────────────────────────────
        let (grid, scenes) = advance(seq, observer, Step::FetchImagery, || {
            self.fetch_imagery(&req.aoi, params, sources.imagery)
        })?;

        // ── 2. DEM ──────────────────────────────────────────────────────────
        let dem = advance(seq, observer, Step::FetchDem, || {
            Ok(self.fetch_dem(&req.aoi, &grid, sources.dem, &mut fallbacks))
        })?;

        // ── 3. Map vectors ──────────────────────────────────────────────────
        let vectors = advance(seq, observer, Step::FetchOsm, || {
            fetch_vectors(&req.aoi, params, sources.vectors, &mut fallbacks)
        })?;

        // ── 4. Features ─────────────────────────────────────────────────────
        let stack = advance(seq, observer, Step::ComputeFeatures, || {
            let stack = compute_features(&FeatureInputs {
                mode: req.mode,
                grid: &grid,
                scenes: &scenes,
                dem: &dem,
                vectors: &vectors,
                geology: params.geology.as_ref(),
            })?;
            if req.mode == Mode::Hardrock && params.geology.is_some() && stack.geology.is_none() {
                warn!("geology upload has no favorable lithology; boost weight redistributed");
                fallbacks.push(Fallback::GeologyWithoutMatches);
            }
            Ok(stack)
        })?;

        // ── 5. Score ────────────────────────────────────────────────────────
        let score = advance(seq, observer, Step::Score, || scoring::score(req.mode, &stack, params))?;

        // ── 6. Targets ──────────────────────────────────────────────────────
        let (targets, target_threshold) = advance(seq, observer, Step::ExtractTargets, || {
            targets::extract_targets(&req.run_id, &score, &stack, params)
        })?;

        let meta = ScoreMeta {
            mode: req.mode,
            weights: score.weights.clone(),
            thresholds: score.thresholds.clone(),
            skipped: score.skipped.clone(),
            target_threshold,
            fallbacks,
        };

        // ── 7. Outputs ──────────────────────────────────────────────────────
        advance(seq, observer, Step::GenerateOutputs, || {
            publish(&req.run_id, sources.sink, &score, &targets, &meta)
        })?;

        Ok(RunArtifacts { score, targets, meta })
    }

    fn fetch_imagery(
        &self,
        aoi: &Aoi,
        params: &RunParameters,
        source: &dyn ImagerySource,
    ) -> Result<(GridSpec, Vec<Scene>)> {
        let request = ImageryRequest {
            aoi,
            api_url: &self.settings.stac_api_url,
            collection: &self.settings.imagery_collection,
            time_range: params.time_range.as_ref(),
            cloud_cover_max: params.cloud_cover_max,
            max_items: params.max_items,
            bands: &Band::ALL,
        };
        let found = match source.search_and_compose(&request) {
            Ok(ImageryResponse::Scenes(scenes)) => scenes,
            Ok(ImageryResponse::NotAvailable) => Vec::new(),
            Err(e) => return Err(PipelineError::DataUnavailable(format!("imagery search failed: {e}"))),
        };
        let offered = found.len();
        let scenes = select_scenes(found, params.cloud_cover_max, params.max_items);
        let Some(first) = scenes.first() else {
            return Err(PipelineError::DataUnavailable(format!(
                "no imagery scene within {}% cloud cover ({offered} offered)",
                params.cloud_cover_max
            )));
        };
        let grid = first
            .bands
            .get(&Band::B4)
            .map(|r| r.grid.clone())
            .ok_or_else(|| PipelineError::DataUnavailable(format!("scene `{}` has no {} band", first.id, Band::B4)))?;
        for scene in &scenes {
            for (band, raster) in &scene.bands {
                raster.check_len().map_err(|e| {
                    PipelineError::DataUnavailable(format!("scene `{}` band {band} is malformed: {e}", scene.id))
                })?;
            }
        }
        info!(offered, selected = scenes.len(), width = grid.width, height = grid.height, "imagery selected");
        Ok((grid, scenes))
    }

    /// Never fails: a missing DEM becomes flat ground on the imagery grid.
    fn fetch_dem(
        &self,
        aoi: &Aoi,
        grid: &GridSpec,
        source: &dyn DemSource,
        fallbacks: &mut Vec<Fallback>,
    ) -> Raster {
        let reason = match source.fetch_dem(aoi, &self.settings.dem_collections) {
            Ok(DemResponse::Raster(dem)) => match dem.check_len() {
                Err(e) => format!("DEM raster is malformed: {e}"),
                Ok(()) if dem.is_all_nodata() => "DEM raster has no valid pixels".to_string(),
                Ok(()) => return dem,
            },
            Ok(DemResponse::NotAvailable) => {
                format!("no DEM item in {}", self.settings.dem_collections.join(", "))
            }
            Err(e) => format!("DEM fetch failed: {e}"),
        };
        warn!(%reason, "using flat DEM");
        fallbacks.push(Fallback::FlatDem { reason });
        Raster::new(grid.clone(), 0.0)
    }
}

/// Run one step under the sequence's state machine, reporting transitions.
fn advance<T>(
    seq: &mut StepSequence,
    observer: &dyn ProgressObserver,
    step: Step,
    body: impl FnOnce() -> Result<T>,
) -> std::result::Result<T, Halted> {
    let active = seq.begin(step).map_err(|error| Halted { step, error })?;
    observer.on_step(step, StepState::Running);
    match body() {
        Ok(out) => {
            seq.complete(active);
            observer.on_step(step, StepState::Done);
            Ok(out)
        }
        Err(error) => {
            seq.fail(active);
            observer.on_step(step, StepState::Failed);
            Err(Halted { step, error })
        }
    }
}

/// Drop scenes over the cloud ceiling, order clearest first (unknown cover
/// last, ties keep their order), keep at most `max_items`.
fn select_scenes(scenes: Vec<Scene>, cloud_cover_max: f64, max_items: usize) -> Vec<Scene> {
    let mut kept: Vec<Scene> = scenes
        .into_iter()
        .filter(|s| s.cloud_cover.map_or(true, |c| c <= cloud_cover_max))
        .collect();
    kept.sort_by(|a, b| match (a.cloud_cover, b.cloud_cover) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    kept.truncate(max_items);
    kept
}

/// Query every layer. Timeouts and empty answers leave the layer out; any
/// other source error fails the step.
fn fetch_vectors(
    aoi: &Aoi,
    params: &RunParameters,
    source: &dyn VectorSource,
    fallbacks: &mut Vec<Fallback>,
) -> Result<BTreeMap<VectorLayer, VectorSet>> {
    let mut present = BTreeMap::new();
    for layer in VectorLayer::ALL {
        let cause = match source.query_vectors(aoi, layer, params.osm_timeout()) {
            Ok(VectorResponse::Features(set)) if !set.is_empty() => {
                present.insert(layer, set);
                continue;
            }
            Ok(VectorResponse::Features(_)) | Ok(VectorResponse::Empty) => MissingCause::Empty,
            Err(SourceError::Timeout { .. }) => MissingCause::TimedOut,
            Err(SourceError::Failed(msg)) => {
                return Err(PipelineError::DataUnavailable(format!("{layer} query failed: {msg}")));
            }
        };
        warn!(%layer, ?cause, "vector layer absent");
        fallbacks.push(Fallback::MissingVectorLayer { layer, cause });
    }
    Ok(present)
}

fn publish(
    run_id: &str,
    sink: Option<&dyn OutputSink>,
    score: &ScoreRaster,
    targets: &[Target],
    meta: &ScoreMeta,
) -> Result<()> {
    match sink {
        Some(sink) => sink
            .publish(run_id, score, targets, meta)
            .map_err(|e| PipelineError::Output(e.to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(id: &str, cloud: Option<f64>) -> Scene {
        Scene { id: id.to_string(), cloud_cover: cloud, bands: BTreeMap::new() }
    }

    fn ids(scenes: &[Scene]) -> Vec<&str> {
        scenes.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn scenes_are_filtered_and_ordered_clearest_first() {
        let picked = select_scenes(
            vec![
                scene("a", Some(30.0)),
                scene("b", None),
                scene("c", Some(55.0)),
                scene("d", Some(5.0)),
                scene("e", Some(30.0)),
            ],
            40.0,
            10,
        );
        assert_eq!(ids(&picked), ["d", "a", "e", "b"]);
    }

    #[test]
    fn max_items_truncates_after_sorting() {
        let picked = select_scenes(vec![scene("a", None), scene("b", Some(20.0)), scene("c", Some(10.0))], 40.0, 2);
        assert_eq!(ids(&picked), ["c", "b"]);
    }

    #[test]
    fn fallbacks_serialize_with_a_kind_tag() {
        let f = Fallback::MissingVectorLayer { layer: VectorLayer::Rivers, cause: MissingCause::TimedOut };
        assert_eq!(
            serde_json::to_value(&f).unwrap(),
            serde_json::json!({"kind": "missing_vector_layer", "layer": "rivers", "cause": "timed_out"})
        );
        let flat = serde_json::to_value(Fallback::FlatDem { reason: "x".into() }).unwrap();
        assert_eq!(flat["kind"], "flat_dem");
    }

    #[test]
    fn imagery_search_uses_the_configured_catalogue() {
        struct Capture(std::cell::RefCell<Option<(String, String)>>);
        impl ImagerySource for Capture {
            fn search_and_compose(&self, req: &ImageryRequest<'_>) -> std::result::Result<ImageryResponse, SourceError> {
                *self.0.borrow_mut() = Some((req.api_url.to_string(), req.collection.to_string()));
                Ok(ImageryResponse::NotAvailable)
            }
        }

        let settings = Settings { stac_api_url: "https://stac.example.org/v1".into(), ..Settings::default() };
        let collection = settings.imagery_collection.clone();
        let aoi = Aoi::from_bounds(crate::geo::Bounds::new(0.0, 0.0, 0.1, 0.1)).unwrap();
        let capture = Capture(std::cell::RefCell::new(None));
        let err = Pipeline::new(settings).fetch_imagery(&aoi, &RunParameters::default(), &capture);
        assert!(matches!(err, Err(PipelineError::DataUnavailable(_))));
        assert_eq!(capture.0.into_inner(), Some(("https://stac.example.org/v1".to_string(), collection)));
    }
}
