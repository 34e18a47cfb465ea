//! Target extraction: score raster → ranked polygons with evidence.
//!
//! 1. threshold (percentile over valid pixels, or a fixed value)
//! 2. 4-connected components, keeping those with area ≥ `min_area_km2`
//! 3. boundary-traced polygon and centroid
//! 4. per-layer evidence and up to three reason chips
//! 5. deterministic ordering and ids `<run_id>-0001`, `<run_id>-0002`, …

pub mod components;
pub mod evidence;
pub mod polygonize;
pub mod threshold;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::features::FeatureStack;
use crate::geo::{LonLat, Polygon};
use crate::params::RunParameters;
use crate::raster::Raster;
use crate::scoring::{ScoreRaster, SubScore, TargetThreshold};
use crate::sources::VectorLayer;

pub use evidence::{EvidenceEntry, ReasonChip};

/// One extracted target. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub geometry: Polygon,
    pub centroid: LonLat,
    pub area_km2: f64,
    pub pixel_count: usize,
    pub mean_score: f64,
    pub max_score: f64,
    /// Nearest road, metres; `None` when the road layer was absent.
    ///
    /// Taken from the distance raster at the target's pixel centres, where
    /// lines are burned into whole cells. Accurate to about one pixel, and 0
    /// when a road crosses the target.
    pub distance_to_road_m: Option<f64>,
    /// Nearest river, metres, measured like `distance_to_road_m`.
    pub distance_to_river_m: Option<f64>,
    pub evidence: BTreeMap<SubScore, EvidenceEntry>,
    pub evidence_summary: Vec<ReasonChip>,
}

/// Extract targets from `score`. Returns the targets in rank order and the
/// threshold that was applied.
pub fn extract_targets(
    run_id: &str,
    score: &ScoreRaster,
    stack: &FeatureStack,
    params: &RunParameters,
) -> Result<(Vec<Target>, TargetThreshold)> {
    let raster = &score.raster;
    let grid = &raster.grid;
    let cutoff = threshold::resolve_threshold(params.threshold, raster);
    let applied = TargetThreshold { requested: params.threshold, value: cutoff };
    let Some(cutoff) = cutoff else {
        info!("score raster has no valid pixels; no targets");
        return Ok((Vec::new(), applied));
    };

    let mask = threshold::threshold_mask(raster, cutoff);
    let comps = components::connected_components(&mask, grid.width, grid.height);
    let found = comps.len();

    let road = stack.distance(VectorLayer::Roads);
    let river = stack.distance(VectorLayer::Rivers);

    let mut targets = Vec::new();
    for comp in comps {
        let area_km2: f64 = comp.pixels.iter().map(|&i| grid.pixel_area_km2(i / grid.width)).sum();
        if area_km2 < params.min_area_km2 {
            continue;
        }
        let rings = polygonize::trace_rings(&comp.pixels, grid.width)?;
        let Some(centroid) = rings.centroid(grid) else {
            continue;
        };

        let scores: Vec<f64> = comp.pixels.iter().map(|&i| raster.data[i] as f64).collect();
        let mean_score = scores.iter().sum::<f64>() / scores.len() as f64;
        let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let evidence = evidence::compute_evidence(score.mode, stack, &score.thresholds, &comp.pixels);
        let evidence_summary = evidence::reason_chips(&evidence);

        targets.push(Target {
            id: String::new(),
            geometry: rings.to_polygon(grid),
            centroid,
            area_km2,
            pixel_count: comp.pixels.len(),
            mean_score,
            max_score,
            distance_to_road_m: road.and_then(|r| min_over(r, &comp.pixels)),
            distance_to_river_m: river.and_then(|r| min_over(r, &comp.pixels)),
            evidence,
            evidence_summary,
        });
    }

    targets.sort_by(rank);
    for (i, t) in targets.iter_mut().enumerate() {
        t.id = format!("{run_id}-{:04}", i + 1);
    }
    debug!(threshold = cutoff, components = found, kept = targets.len(), "targets extracted");
    Ok((targets, applied))
}

/// mean_score descending, then centroid lon, lat ascending, then area
/// descending.
fn rank(a: &Target, b: &Target) -> Ordering {
    b.mean_score
        .total_cmp(&a.mean_score)
        .then(a.centroid.lon.total_cmp(&b.centroid.lon))
        .then(a.centroid.lat.total_cmp(&b.centroid.lat))
        .then(b.area_km2.total_cmp(&a.area_km2))
}

fn min_over(r: &Raster, pixels: &[usize]) -> Option<f64> {
    pixels.iter().map(|&i| r.data[i]).filter(|v| !v.is_nan()).map(f64::from).reduce(f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{compute_features, FeatureInputs};
    use crate::geo::{Bounds, LineString};
    use crate::params::{Mode, ThresholdMethod};
    use crate::raster::GridSpec;
    use crate::scoring::{weights::default_weights, ResolvedThresholds};
    use crate::sources::{Band, Scene, VectorSet};

    /// A feature stack over a small geographic grid with uniform bands, so
    /// the score raster under test can be set freely.
    fn fixture(w: usize, h: usize) -> (FeatureStack, ScoreRaster) {
        fixture_with(w, h, BTreeMap::new())
    }

    fn fixture_with(w: usize, h: usize, vectors: BTreeMap<VectorLayer, VectorSet>) -> (FeatureStack, ScoreRaster) {
        let grid = GridSpec::from_bounds(Bounds::new(10.0, 0.0, 10.0 + w as f64 * 0.001, h as f64 * 0.001), w, h);
        let bands = Band::ALL.iter().map(|&b| (b, Raster::new(grid.clone(), 0.2))).collect();
        let scenes = [Scene { id: "s".into(), cloud_cover: None, bands }];
        let dem = Raster::new(grid.clone(), 0.0);
        let stack = compute_features(&FeatureInputs {
            mode: Mode::Coastal,
            grid: &grid,
            scenes: &scenes,
            dem: &dem,
            vectors: &vectors,
            geology: None,
        })
        .unwrap();
        let thresholds =
            ResolvedThresholds::resolve(Mode::Coastal, &stack, &Default::default()).unwrap();
        let score = ScoreRaster {
            raster: Raster::new(grid, 0.0),
            mode: Mode::Coastal,
            weights: default_weights(Mode::Coastal),
            thresholds,
            skipped: vec![SubScore::CoastalProximity, SubScore::RiverProximity],
        };
        (stack, score)
    }

    fn params(threshold: ThresholdMethod, min_area_km2: f64) -> RunParameters {
        RunParameters { threshold, min_area_km2, ..Default::default() }
    }

    #[test]
    fn diagonal_pair_is_two_targets() {
        let (stack, mut score) = fixture(4, 4);
        score.raster.set(1, 1, 0.9);
        score.raster.set(2, 2, 0.8);
        let (targets, _) = extract_targets("run", &score, &stack, &params(ThresholdMethod::Fixed(0.7), 0.0)).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].id, "run-0001");
        assert_eq!(targets[0].mean_score, 0.9f32 as f64);
        assert_eq!(targets[1].id, "run-0002");
        assert!(targets.iter().all(|t| t.pixel_count == 1 && t.distance_to_road_m.is_none()));
    }

    #[test]
    fn road_distance_is_zero_under_the_road_and_pixel_steps_beside_it() {
        let road = LineString::new(vec![LonLat::new(10.0025, 0.0), LonLat::new(10.0025, 0.004)]);
        let vectors = BTreeMap::from([(VectorLayer::Roads, VectorSet::new(vec![road]))]);
        let (stack, mut score) = fixture_with(4, 4, vectors);
        score.raster.set(1, 2, 0.9);
        score.raster.set(1, 0, 0.8);
        let (targets, _) = extract_targets("run", &score, &stack, &params(ThresholdMethod::Fixed(0.7), 0.0)).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].distance_to_road_m, Some(0.0));
        // Two cell widths from the burned column, about 111 m each here.
        let beside = targets[1].distance_to_road_m.unwrap();
        assert!(beside > 200.0 && beside < 250.0, "{beside}");
        assert!(targets[1].distance_to_river_m.is_none());
    }

    #[test]
    fn area_bound_is_inclusive() {
        let (stack, mut score) = fixture(6, 6);
        for r in 1..3 {
            for c in 1..4 {
                score.raster.set(r, c, 0.95);
            }
        }
        let (all, _) = extract_targets("a", &score, &stack, &params(ThresholdMethod::Fixed(0.9), 0.0)).unwrap();
        assert_eq!(all.len(), 1);
        let exact = all[0].area_km2;

        let (at, _) = extract_targets("a", &score, &stack, &params(ThresholdMethod::Fixed(0.9), exact)).unwrap();
        assert_eq!(at.len(), 1);
        assert_eq!(at[0].area_km2, exact);

        let above = exact * (1.0 + 1e-9);
        let (none, _) = extract_targets("a", &score, &stack, &params(ThresholdMethod::Fixed(0.9), above)).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn ties_break_by_centroid_longitude() {
        let (stack, mut score) = fixture(5, 3);
        score.raster.set(1, 3, 0.8);
        score.raster.set(1, 0, 0.8);
        let (targets, _) = extract_targets("t", &score, &stack, &params(ThresholdMethod::Fixed(0.5), 0.0)).unwrap();
        assert_eq!(targets.len(), 2);
        assert!(targets[0].centroid.lon < targets[1].centroid.lon);
    }

    #[test]
    fn percentile_threshold_reports_resolved_value() {
        let (stack, mut score) = fixture(4, 1);
        for (c, v) in [0.1, 0.2, 0.3, 0.4].into_iter().enumerate() {
            score.raster.set(0, c, v);
        }
        let (targets, applied) =
            extract_targets("p", &score, &stack, &params(ThresholdMethod::Percentile(100.0), 0.0)).unwrap();
        assert_eq!(applied.value, Some(0.4f32 as f64));
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].pixel_count, 1);
    }

    #[test]
    fn zero_pixel_grid_is_empty() {
        let (stack, mut score) = fixture(2, 2);
        score.raster = Raster::nodata(GridSpec::from_bounds(Bounds::new(0.0, 0.0, 0.0, 0.0), 0, 0));
        let (targets, applied) = extract_targets("z", &score, &stack, &RunParameters::default()).unwrap();
        assert!(targets.is_empty());
        assert_eq!(applied.value, None);
    }

    #[test]
    fn evidence_summary_is_short_and_sorted() {
        let (stack, mut score) = fixture(4, 4);
        for r in 0..2 {
            for c in 0..2 {
                score.raster.set(r, c, 0.8);
            }
        }
        let (targets, _) = extract_targets("e", &score, &stack, &params(ThresholdMethod::Fixed(0.5), 0.0)).unwrap();
        let chips = &targets[0].evidence_summary;
        assert!(chips.len() <= 3);
        assert!(chips.windows(2).all(|w| w[0].pass_fraction >= w[1].pass_fraction));
        assert!(!targets[0].evidence.contains_key(&SubScore::CoastalProximity));
    }
}
