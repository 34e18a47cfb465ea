//! Hardrock-mode sub-score normalizations.
//!
//! | sub-score     | raw layer         | normalization                           |
//! |---------------|-------------------|-----------------------------------------|
//! | lineaments    | lineament density | (x − p70) / (p98 − p70)                 |
//! | relief        | slope, °          | 1 within 2–25°, 2° linear taper outside |
//! | exposure      | NDVI              | 1 if NDVI ≤ 0.4                         |
//! | geology_boost | geology mask      | mask value                              |

use crate::params::LayerThresholds;
use crate::stats::percentile_scale;

pub fn lineaments(density: f64, lo: Option<f64>, hi: Option<f64>) -> f64 {
    match (lo, hi) {
        (Some(lo), Some(hi)) => percentile_scale(density, lo, hi),
        _ => 0.0,
    }
}

/// Window membership with linear shoulders of `relief_taper_deg`.
pub fn relief(slope: f64, t: &LayerThresholds) -> f64 {
    let outside = if slope < t.relief_min_deg {
        t.relief_min_deg - slope
    } else if slope > t.relief_max_deg {
        slope - t.relief_max_deg
    } else {
        0.0
    };
    (1.0 - outside / t.relief_taper_deg).clamp(0.0, 1.0)
}
