//! Coastal-mode sub-score normalizations.
//!
//! | sub-score         | raw layer         | normalization                         |
//! |-------------------|-------------------|---------------------------------------|
//! | coastal_proximity | coastline dist, m | 1 − d / 30 km                         |
//! | slope             | slope, °          | 1 up to 5°, linear to 0 at 15°        |
//! | bare_land         | NDVI              | 1 if NDVI ≤ 0.2                       |
//! | sandiness         | BSI               | (BSI − p70) / (p98 − p70)             |
//! | river_proximity   | river dist, m     | 1 − d / 10 km                         |
//!
//! All results are clamped to `[0, 1]`.

use crate::params::LayerThresholds;
use crate::stats::{percentile_scale, proximity_ramp};

/// Closer is higher, zero beyond `max_m`.
pub fn proximity(d: f64, max_m: f64) -> f64 {
    proximity_ramp(d, max_m)
}

/// 1 at or below `slope_flat_deg`, 0 at or above `slope_max_deg`.
pub fn low_slope(slope: f64, t: &LayerThresholds) -> f64 {
    if slope <= t.slope_flat_deg {
        1.0
    } else if slope >= t.slope_max_deg {
        0.0
    } else {
        (t.slope_max_deg - slope) / (t.slope_max_deg - t.slope_flat_deg)
    }
}

/// Membership: 1 when `v ≤ max`.
pub fn at_most(v: f64, max: f64) -> f64 {
    if v <= max {
        1.0
    } else {
        0.0
    }
}

/// Percentile-range scaling of BSI. Unresolved cut-offs score 0.
pub fn sandiness(bsi: f64, lo: Option<f64>, hi: Option<f64>) -> f64 {
    match (lo, hi) {
        (Some(lo), Some(hi)) => percentile_scale(bsi, lo, hi),
        _ => 0.0,
    }
}
