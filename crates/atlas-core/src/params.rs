//! Per-run parameters.
//!
//! Deserialized once at run creation and never mutated. Unknown keys are
//! rejected; every value is checked by [`RunParameters::validate`] before the
//! first pipeline step runs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::features::geology::GeologyLayer;
use crate::scoring::SubScore;

/// Scoring mode. Selects the sub-score set and default weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Heavy-mineral sands near coastlines.
    Coastal,
    /// Structurally controlled hard-rock deposits.
    Hardrock,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Coastal => "coastal",
            Mode::Hardrock => "hardrock",
        }
    }

    /// Sub-scores combined in this mode, in weight-table order.
    pub fn sub_scores(&self) -> &'static [SubScore] {
        match self {
            Mode::Coastal => &[
                SubScore::CoastalProximity,
                SubScore::Slope,
                SubScore::BareLand,
                SubScore::Sandiness,
                SubScore::RiverProximity,
            ],
            Mode::Hardrock => &[
                SubScore::Lineaments,
                SubScore::Relief,
                SubScore::Exposure,
                SubScore::GeologyBoost,
            ],
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "coastal" => Ok(Mode::Coastal),
            "hardrock" => Ok(Mode::Hardrock),
            other => Err(PipelineError::invalid("mode", format!("unknown mode `{other}`"))),
        }
    }
}

/// Target threshold rule. Exactly one is active per run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "value", rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Keep pixels at or above the AOI-wide percentile (0–100) of valid scores.
    Percentile(f64),
    /// Keep pixels at or above a literal score (0–1).
    Fixed(f64),
}

impl Default for ThresholdMethod {
    fn default() -> Self {
        ThresholdMethod::Percentile(95.0)
    }
}

impl ThresholdMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ThresholdMethod::Percentile(_) => "percentile",
            ThresholdMethod::Fixed(_) => "fixed",
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            ThresholdMethod::Percentile(v) | ThresholdMethod::Fixed(v) => v,
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            ThresholdMethod::Percentile(p) if !(0.0..=100.0).contains(&p) => {
                Err(PipelineError::invalid("threshold", format!("percentile {p} outside 0–100")))
            }
            ThresholdMethod::Fixed(v) if !(0.0..=1.0).contains(&v) => {
                Err(PipelineError::invalid("threshold", format!("fixed value {v} outside 0–1")))
            }
            _ => Ok(()),
        }
    }
}

/// Acquisition window, ISO-8601 dates (`YYYY-MM-DD`, optional time suffix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    fn validate(&self) -> Result<()> {
        for (name, v) in [("time_range.start", &self.start), ("time_range.end", &self.end)] {
            if !is_iso_date(v) {
                return Err(PipelineError::invalid(name, format!("`{v}` is not an ISO-8601 date")));
            }
        }
        // Same-format ISO dates order lexicographically.
        if self.start[..10] > self.end[..10] {
            return Err(PipelineError::invalid("time_range", "start is after end"));
        }
        Ok(())
    }
}

fn is_iso_date(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() < 10 || (b.len() > 10 && b[10] != b'T') {
        return false;
    }
    let digits = |r: std::ops::Range<usize>| b[r].iter().all(u8::is_ascii_digit);
    if !(digits(0..4) && b[4] == b'-' && digits(5..7) && b[7] == b'-' && digits(8..10)) {
        return false;
    }
    let month = (b[5] - b'0') * 10 + (b[6] - b'0');
    let day = (b[8] - b'0') * 10 + (b[9] - b'0');
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

/// Caller-supplied sub-score weights. Replace the mode defaults wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weights(pub BTreeMap<SubScore, f64>);

impl Weights {
    pub fn new(entries: impl IntoIterator<Item = (SubScore, f64)>) -> Self {
        Self(entries.into_iter().collect())
    }

    pub fn get(&self, s: SubScore) -> f64 {
        self.0.get(&s).copied().unwrap_or(0.0)
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    fn validate(&self, mode: Mode) -> Result<()> {
        for (&s, &w) in &self.0 {
            if !mode.sub_scores().contains(&s) {
                return Err(PipelineError::invalid(
                    "weights",
                    format!("`{}` is not a {mode} sub-score", s.name()),
                ));
            }
            if !w.is_finite() || w < 0.0 {
                return Err(PipelineError::invalid("weights", format!("`{}` = {w}", s.name())));
            }
        }
        if self.sum() <= 0.0 {
            return Err(PipelineError::invalid("weights", "weights must sum to a positive total"));
        }
        Ok(())
    }
}

/// Per-layer constants used both to normalize sub-scores and to decide
/// whether a pixel passes a layer's evidence test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayerThresholds {
    /// Coastline distance ramp length and evidence cut-off, metres.
    pub coastal_max_m: f64,
    /// Slope at or below which the slope sub-score is 1, degrees.
    pub slope_flat_deg: f64,
    /// Slope at which the slope sub-score reaches 0, degrees.
    pub slope_max_deg: f64,
    pub bare_ndvi_max: f64,
    /// Lower/upper percentile of BSI used for sandiness scaling.
    pub sand_pct_lo: f64,
    pub sand_pct_hi: f64,
    pub river_max_m: f64,
    pub lineament_pct_lo: f64,
    pub lineament_pct_hi: f64,
    pub relief_min_deg: f64,
    pub relief_max_deg: f64,
    /// Width of the linear taper outside the relief window, degrees.
    pub relief_taper_deg: f64,
    pub exposure_ndvi_max: f64,
    pub geology_min: f64,
    /// NDWI at or above which a pixel is water and scores 0.
    pub water_ndwi: f64,
}

impl Default for LayerThresholds {
    fn default() -> Self {
        Self {
            coastal_max_m: 30_000.0,
            slope_flat_deg: 5.0,
            slope_max_deg: 15.0,
            bare_ndvi_max: 0.2,
            sand_pct_lo: 70.0,
            sand_pct_hi: 98.0,
            river_max_m: 10_000.0,
            lineament_pct_lo: 70.0,
            lineament_pct_hi: 98.0,
            relief_min_deg: 2.0,
            relief_max_deg: 25.0,
            relief_taper_deg: 2.0,
            exposure_ndvi_max: 0.4,
            geology_min: 0.5,
            water_ndwi: 0.1,
        }
    }
}

impl LayerThresholds {
    fn validate(&self) -> Result<()> {
        let t = self;
        let positive = [
            ("thresholds.coastal_max_m", t.coastal_max_m),
            ("thresholds.river_max_m", t.river_max_m),
            ("thresholds.relief_taper_deg", t.relief_taper_deg),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(PipelineError::invalid(name, format!("{v} must be positive")));
            }
        }
        if !(t.slope_flat_deg >= 0.0 && t.slope_max_deg > t.slope_flat_deg) {
            return Err(PipelineError::invalid("thresholds.slope_max_deg", "must exceed slope_flat_deg"));
        }
        if !(t.relief_min_deg >= 0.0 && t.relief_max_deg >= t.relief_min_deg) {
            return Err(PipelineError::invalid("thresholds.relief_max_deg", "must be >= relief_min_deg"));
        }
        for (name, lo, hi) in [
            ("thresholds.sand_pct", t.sand_pct_lo, t.sand_pct_hi),
            ("thresholds.lineament_pct", t.lineament_pct_lo, t.lineament_pct_hi),
        ] {
            if !(0.0..=100.0).contains(&lo) || !(0.0..=100.0).contains(&hi) || lo > hi {
                return Err(PipelineError::invalid(name, format!("need 0 <= {lo} <= {hi} <= 100")));
            }
        }
        for (name, v) in [
            ("thresholds.bare_ndvi_max", t.bare_ndvi_max),
            ("thresholds.exposure_ndvi_max", t.exposure_ndvi_max),
            ("thresholds.water_ndwi", t.water_ndwi),
        ] {
            if !(-1.0..=1.0).contains(&v) {
                return Err(PipelineError::invalid(name, format!("index threshold {v} outside -1–1")));
            }
        }
        if !(0.0..=1.0).contains(&t.geology_min) {
            return Err(PipelineError::invalid("thresholds.geology_min", "must be within 0–1"));
        }
        Ok(())
    }
}

/// Grid size of the synthetic data path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticGrid {
    pub width: usize,
    pub height: usize,
}

impl Default for SyntheticGrid {
    fn default() -> Self {
        Self { width: 256, height: 256 }
    }
}

pub const MAX_SYNTHETIC_DIM: usize = 4096;

/// Immutable configuration snapshot for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunParameters {
    pub time_range: Option<TimeRange>,
    /// Maximum scene cloud cover, percent.
    pub cloud_cover_max: f64,
    /// Maximum number of scenes in the composite.
    pub max_items: usize,
    pub threshold: ThresholdMethod,
    pub min_area_km2: f64,
    pub weights: Option<Weights>,
    pub thresholds: LayerThresholds,
    /// Uploaded geology polygons (hardrock mode only).
    pub geology: Option<GeologyLayer>,
    pub osm_timeout_s: u64,
    /// When set, all data comes from the deterministic synthetic source.
    pub synthetic: Option<SyntheticGrid>,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            time_range: None,
            cloud_cover_max: 40.0,
            max_items: 3,
            threshold: ThresholdMethod::default(),
            min_area_km2: 0.1,
            weights: None,
            thresholds: LayerThresholds::default(),
            geology: None,
            osm_timeout_s: 40,
            synthetic: None,
        }
    }
}

impl RunParameters {
    /// Parse a JSON parameter blob. Unknown keys or methods are
    /// `InvalidParameters`.
    pub fn from_json(v: &serde_json::Value) -> Result<Self> {
        RunParameters::deserialize(v).map_err(|e| PipelineError::invalid("params", e.to_string()))
    }

    pub fn osm_timeout(&self) -> Duration {
        Duration::from_secs(self.osm_timeout_s)
    }

    pub fn validate(&self, mode: Mode) -> Result<()> {
        if let Some(tr) = &self.time_range {
            tr.validate()?;
        }
        if !(0.0..=100.0).contains(&self.cloud_cover_max) {
            return Err(PipelineError::invalid("cloud_cover_max", "must be within 0–100"));
        }
        if self.max_items == 0 {
            return Err(PipelineError::invalid("max_items", "must be at least 1"));
        }
        self.threshold.validate()?;
        if !(self.min_area_km2.is_finite() && self.min_area_km2 >= 0.0) {
            return Err(PipelineError::invalid("min_area_km2", "must be a non-negative number"));
        }
        if let Some(w) = &self.weights {
            w.validate(mode)?;
        }
        self.thresholds.validate()?;
        if self.osm_timeout_s == 0 {
            return Err(PipelineError::invalid("osm_timeout_s", "must be positive"));
        }
        if let Some(g) = self.synthetic {
            for (name, v) in [("synthetic.width", g.width), ("synthetic.height", g.height)] {
                if !(1..=MAX_SYNTHETIC_DIM).contains(&v) {
                    return Err(PipelineError::invalid(name, format!("{v} outside 1–{MAX_SYNTHETIC_DIM}")));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_from_empty_object() {
        let p = RunParameters::from_json(&json!({})).unwrap();
        assert_eq!(p, RunParameters::default());
        assert_eq!(p.threshold, ThresholdMethod::Percentile(95.0));
        assert!(p.validate(Mode::Coastal).is_ok());
    }

    #[test]
    fn tagged_threshold_and_weights_parse() {
        let p = RunParameters::from_json(&json!({
            "threshold": {"method": "fixed", "value": 0.6},
            "weights": {"coastal_proximity": 1.0, "sandiness": 1.0},
            "synthetic": {"width": 64}
        }))
        .unwrap();
        assert_eq!(p.threshold, ThresholdMethod::Fixed(0.6));
        assert_eq!(p.weights.as_ref().unwrap().get(SubScore::Sandiness), 1.0);
        assert_eq!(p.weights.as_ref().unwrap().get(SubScore::Slope), 0.0);
        assert_eq!(p.synthetic, Some(SyntheticGrid { width: 64, height: 256 }));
        assert!(p.validate(Mode::Coastal).is_ok());
    }

    #[test]
    fn unknown_method_and_keys_are_rejected() {
        let err = RunParameters::from_json(&json!({"threshold": {"method": "otsu", "value": 1}}));
        assert!(matches!(err, Err(PipelineError::InvalidParameters { .. })));
        assert!(RunParameters::from_json(&json!({"cloud_cover": 10})).is_err());
    }

    #[test]
    fn weight_validation() {
        let zero = RunParameters {
            weights: Some(Weights::new([(SubScore::Slope, 0.0)])),
            ..Default::default()
        };
        assert!(zero.validate(Mode::Coastal).is_err());

        let wrong_mode = RunParameters {
            weights: Some(Weights::new([(SubScore::Lineaments, 1.0)])),
            ..Default::default()
        };
        assert!(wrong_mode.validate(Mode::Coastal).is_err());
        assert!(wrong_mode.validate(Mode::Hardrock).is_ok());

        let negative = RunParameters {
            weights: Some(Weights::new([(SubScore::Relief, -1.0), (SubScore::Exposure, 2.0)])),
            ..Default::default()
        };
        assert!(negative.validate(Mode::Hardrock).is_err());
    }

    #[test]
    fn range_checks() {
        let bad = |p: RunParameters| p.validate(Mode::Coastal).is_err();
        assert!(bad(RunParameters { threshold: ThresholdMethod::Percentile(101.0), ..Default::default() }));
        assert!(bad(RunParameters { threshold: ThresholdMethod::Fixed(1.5), ..Default::default() }));
        assert!(bad(RunParameters { max_items: 0, ..Default::default() }));
        assert!(bad(RunParameters { min_area_km2: -0.1, ..Default::default() }));
        assert!(bad(RunParameters { synthetic: Some(SyntheticGrid { width: 0, height: 8 }), ..Default::default() }));
        assert!(bad(RunParameters {
            time_range: Some(TimeRange { start: "2024-06-01".into(), end: "2024-01-01".into() }),
            ..Default::default()
        }));
        assert!(bad(RunParameters {
            time_range: Some(TimeRange { start: "June".into(), end: "2024-01-01".into() }),
            ..Default::default()
        }));
        let ok = RunParameters {
            time_range: Some(TimeRange { start: "2024-01-01".into(), end: "2024-06-30T23:59:59Z".into() }),
            ..Default::default()
        };
        assert!(ok.validate(Mode::Coastal).is_ok());
    }
}
