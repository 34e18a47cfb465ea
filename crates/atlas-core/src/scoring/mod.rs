//! Scoring engine: analytic layers → one `[0, 1]` score raster per mode.
//!
//! ```text
//! score = clamp(Σ wᵢ · subscoreᵢ, 0, 1)      then 0 wherever NDWI ≥ water
//! ```
//!
//! Mandatory layers (NDVI, NDWI, slope, and BSI or lineament density) that
//! are no-data make the pixel no-data. Optional layers (distances, geology)
//! that are no-data contribute nothing.

pub mod coastal;
pub mod hardrock;
pub mod weights;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::features::FeatureStack;
use crate::params::{LayerThresholds, Mode, RunParameters, ThresholdMethod};
use crate::parallel::*;
use crate::pipeline::Fallback;
use crate::raster::Raster;
use crate::sources::VectorLayer;
use crate::stats::percentile;

/// Named, normalized contribution to a mode's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubScore {
    CoastalProximity,
    Slope,
    BareLand,
    Sandiness,
    RiverProximity,
    Lineaments,
    Relief,
    Exposure,
    GeologyBoost,
}

impl SubScore {
    pub fn name(&self) -> &'static str {
        match self {
            SubScore::CoastalProximity => "coastal_proximity",
            SubScore::Slope => "slope",
            SubScore::BareLand => "bare_land",
            SubScore::Sandiness => "sandiness",
            SubScore::RiverProximity => "river_proximity",
            SubScore::Lineaments => "lineaments",
            SubScore::Relief => "relief",
            SubScore::Exposure => "exposure",
            SubScore::GeologyBoost => "geology_boost",
        }
    }

    /// Short reason-chip label.
    pub fn label(&self) -> &'static str {
        match self {
            SubScore::CoastalProximity => "Near coastline (<30 km)",
            SubScore::Slope => "Low slope (<=5°)",
            SubScore::BareLand => "Low vegetation (NDVI<=0.2)",
            SubScore::Sandiness => "High sandiness (BSI top 30%)",
            SubScore::RiverProximity => "Near rivers",
            SubScore::Lineaments => "High lineament density",
            SubScore::Relief => "Moderate relief (2–25°)",
            SubScore::Exposure => "Low vegetation (NDVI<=0.4)",
            SubScore::GeologyBoost => "Favorable lithology match",
        }
    }

    /// A no-data pixel in a mandatory layer makes the score no-data.
    pub fn is_mandatory(&self) -> bool {
        !matches!(self, SubScore::CoastalProximity | SubScore::RiverProximity | SubScore::GeologyBoost)
    }

    /// The raw analytic layer this sub-score normalizes, if present.
    pub fn raw_layer<'a>(&self, stack: &'a FeatureStack) -> Option<&'a Raster> {
        match self {
            SubScore::CoastalProximity => stack.distance(VectorLayer::Coastline),
            SubScore::RiverProximity => stack.distance(VectorLayer::Rivers),
            SubScore::Slope | SubScore::Relief => Some(&stack.slope),
            SubScore::BareLand | SubScore::Exposure => Some(&stack.ndvi),
            SubScore::Sandiness => Some(&stack.bsi),
            SubScore::Lineaments => stack.lineaments.as_ref(),
            SubScore::GeologyBoost => stack.geology.as_ref(),
        }
    }
}

impl fmt::Display for SubScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Layer constants plus the AOI-dependent percentile values they resolve to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedThresholds {
    pub layer: LayerThresholds,
    /// BSI values at `sand_pct_lo` / `sand_pct_hi` (coastal mode).
    pub sand_lo_value: Option<f64>,
    pub sand_hi_value: Option<f64>,
    /// Lineament density at `lineament_pct_lo` / `lineament_pct_hi` (hardrock mode).
    pub lineament_lo_value: Option<f64>,
    pub lineament_hi_value: Option<f64>,
}

impl ResolvedThresholds {
    /// Compute the percentile cut-offs the mode needs over valid pixels.
    pub fn resolve(mode: Mode, stack: &FeatureStack, layer: &LayerThresholds) -> Result<Self> {
        let mut out = Self {
            layer: layer.clone(),
            sand_lo_value: None,
            sand_hi_value: None,
            lineament_lo_value: None,
            lineament_hi_value: None,
        };
        match mode {
            Mode::Coastal => {
                let (lo, hi) = percentile_pair(&stack.bsi, layer.sand_pct_lo, layer.sand_pct_hi, "BSI")?;
                out.sand_lo_value = Some(lo);
                out.sand_hi_value = Some(hi);
            }
            Mode::Hardrock => {
                let density = stack
                    .lineaments
                    .as_ref()
                    .ok_or_else(|| PipelineError::Computation("lineament density was not computed".into()))?;
                let (lo, hi) =
                    percentile_pair(density, layer.lineament_pct_lo, layer.lineament_pct_hi, "lineament density")?;
                out.lineament_lo_value = Some(lo);
                out.lineament_hi_value = Some(hi);
            }
        }
        Ok(out)
    }

    /// Normalize a raw layer value to `[0, 1]`. `NaN` in, `NaN` out.
    pub fn normalize(&self, sub: SubScore, raw: f64) -> f64 {
        if raw.is_nan() {
            return f64::NAN;
        }
        let t = &self.layer;
        match sub {
            SubScore::CoastalProximity => coastal::proximity(raw, t.coastal_max_m),
            SubScore::Slope => coastal::low_slope(raw, t),
            SubScore::BareLand => coastal::at_most(raw, t.bare_ndvi_max),
            SubScore::Sandiness => coastal::sandiness(raw, self.sand_lo_value, self.sand_hi_value),
            SubScore::RiverProximity => coastal::proximity(raw, t.river_max_m),
            SubScore::Lineaments => hardrock::lineaments(raw, self.lineament_lo_value, self.lineament_hi_value),
            SubScore::Relief => hardrock::relief(raw, t),
            SubScore::Exposure => coastal::at_most(raw, t.exposure_ndvi_max),
            SubScore::GeologyBoost => raw.clamp(0.0, 1.0),
        }
    }

    /// Whether a raw layer value passes the layer's own evidence test.
    pub fn passes(&self, sub: SubScore, raw: f64) -> bool {
        if raw.is_nan() {
            return false;
        }
        let t = &self.layer;
        match sub {
            SubScore::CoastalProximity => raw <= t.coastal_max_m,
            SubScore::Slope => raw <= t.slope_flat_deg,
            SubScore::BareLand => raw <= t.bare_ndvi_max,
            SubScore::Sandiness => self.sand_lo_value.is_some_and(|lo| raw >= lo),
            SubScore::RiverProximity => raw <= t.river_max_m,
            SubScore::Lineaments => self.lineament_lo_value.is_some_and(|lo| raw >= lo),
            SubScore::Relief => raw >= t.relief_min_deg && raw <= t.relief_max_deg,
            SubScore::Exposure => raw <= t.exposure_ndvi_max,
            SubScore::GeologyBoost => raw >= t.geology_min,
        }
    }
}

fn percentile_pair(r: &Raster, lo: f64, hi: f64, what: &str) -> Result<(f64, f64)> {
    let values = r.valid_values();
    match (percentile(&values, lo), percentile(&values, hi)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(PipelineError::Computation(format!("no valid {what} pixels to rank"))),
    }
}

/// Output of the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRaster {
    pub raster: Raster,
    pub mode: Mode,
    /// Weights actually applied, summing to 1.
    pub weights: BTreeMap<SubScore, f64>,
    pub thresholds: ResolvedThresholds,
    /// Sub-scores whose optional layer was absent; their weight was kept
    /// but they contributed nothing.
    pub skipped: Vec<SubScore>,
}

/// Threshold used for target extraction: the requested rule and the score
/// value it resolved to (`None` when the score had no valid pixel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetThreshold {
    pub requested: ThresholdMethod,
    pub value: Option<f64>,
}

/// Run-level metadata handed to output collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMeta {
    pub mode: Mode,
    pub weights: BTreeMap<SubScore, f64>,
    pub thresholds: ResolvedThresholds,
    pub skipped: Vec<SubScore>,
    pub target_threshold: TargetThreshold,
    pub fallbacks: Vec<Fallback>,
}

/// Score every pixel of `stack` for `mode`.
pub fn score(mode: Mode, stack: &FeatureStack, params: &RunParameters) -> Result<ScoreRaster> {
    let thresholds = ResolvedThresholds::resolve(mode, stack, &params.thresholds)?;
    let weights = weights::resolve_weights(mode, params.weights.as_ref(), stack.geology.is_some())?;

    let mut terms: Vec<(SubScore, f64, &Raster)> = Vec::new();
    let mut skipped = Vec::new();
    for (&sub, &w) in &weights {
        match sub.raw_layer(stack) {
            Some(layer) => terms.push((sub, w, layer)),
            None if sub.is_mandatory() => {
                return Err(PipelineError::Computation(format!("mandatory layer for `{sub}` is missing")));
            }
            None => skipped.push(sub),
        }
    }
    if !skipped.is_empty() {
        info!(mode = %mode, skipped = ?skipped, "optional layers absent; sub-scores skipped");
    }

    let water = thresholds.layer.water_ndwi;
    let ndwi = &stack.ndwi;
    let (w, h) = (stack.grid.width, stack.grid.height);
    let data: Vec<f32> = (0..h)
        .into_par_iter()
        .flat_map(|row| {
            (0..w)
                .map(|col| {
                    let wet = ndwi.get(row, col);
                    if wet.is_nan() {
                        return f32::NAN;
                    }
                    if wet as f64 >= water {
                        return 0.0;
                    }
                    let mut acc = 0.0f64;
                    for &(sub, weight, layer) in &terms {
                        let v = thresholds.normalize(sub, layer.get(row, col) as f64);
                        if v.is_nan() {
                            if sub.is_mandatory() {
                                return f32::NAN;
                            }
                            continue;
                        }
                        acc += weight * v;
                    }
                    acc.clamp(0.0, 1.0) as f32
                })
                .collect::<Vec<f32>>()
        })
        .collect();

    let raster = Raster::from_vec(stack.grid.clone(), data)?;
    debug!(mode = %mode, valid = raster.valid_count(), "score raster computed");
    Ok(ScoreRaster { raster, mode, weights, thresholds, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_snake_case_and_match_serde() {
        for s in Mode::Coastal.sub_scores().iter().chain(Mode::Hardrock.sub_scores()) {
            assert_eq!(serde_json::to_value(s).unwrap(), serde_json::json!(s.name()));
        }
    }

    #[test]
    fn only_distance_and_geology_are_optional() {
        let optional: Vec<_> = Mode::Coastal
            .sub_scores()
            .iter()
            .chain(Mode::Hardrock.sub_scores())
            .filter(|s| !s.is_mandatory())
            .collect();
        assert_eq!(optional, [&SubScore::CoastalProximity, &SubScore::RiverProximity, &SubScore::GeologyBoost]);
    }
}
