//! Score threshold resolution.

use crate::params::ThresholdMethod;
use crate::raster::Raster;
use crate::stats::percentile;

/// Score value a pixel must reach to be kept. `None` when the raster has no
/// valid pixel.
pub fn resolve_threshold(method: ThresholdMethod, score: &Raster) -> Option<f64> {
    if score.valid_count() == 0 {
        return None;
    }
    match method {
        ThresholdMethod::Percentile(p) => percentile(&score.data, p),
        ThresholdMethod::Fixed(v) => Some(v),
    }
}

/// `true` where the score is valid and at or above `threshold`.
pub fn threshold_mask(score: &Raster, threshold: f64) -> Vec<bool> {
    score.data.iter().map(|&v| !v.is_nan() && v as f64 >= threshold).collect()
}
