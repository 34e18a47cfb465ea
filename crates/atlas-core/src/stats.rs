//! Raster statistics over valid (non-`NaN`) cells.

use crate::raster::Raster;

/// Value at percentile `q` (0–100) of `values`, ignoring `NaN`.
///
/// Linear interpolation between closest ranks:
/// `pos = q/100 · (n − 1)`, `v = s[⌊pos⌋] + (pos − ⌊pos⌋)(s[⌈pos⌉] − s[⌊pos⌋])`.
/// Returns `None` when no valid value exists.
pub fn percentile(values: &[f32], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().filter(|v| !v.is_nan()).map(|&v| v as f64).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    Some(percentile_sorted(&sorted, q))
}

/// Same as [`percentile`] on an already sorted, `NaN`-free slice.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    let pos = (q.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Mean and population standard deviation of valid values.
pub fn mean_std(values: &[f32]) -> Option<(f64, f64)> {
    let (mut n, mut sum) = (0usize, 0.0f64);
    for &v in values.iter().filter(|v| !v.is_nan()) {
        n += 1;
        sum += v as f64;
    }
    if n == 0 {
        return None;
    }
    let mean = sum / n as f64;
    let var = values
        .iter()
        .filter(|v| !v.is_nan())
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64;
    Some((mean, var.sqrt()))
}

/// Map `x` linearly from `[lo, hi]` onto `[0, 1]`, clamped.
/// A collapsed range (`hi <= lo`) maps everything to 0.
#[inline]
pub fn percentile_scale(x: f64, lo: f64, hi: f64) -> f64 {
    if hi - lo <= f64::EPSILON {
        return 0.0;
    }
    ((x - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// `1 − d / max`, clamped to `[0, 1]`. Closer is higher.
#[inline]
pub fn proximity_ramp(d: f64, max: f64) -> f64 {
    (1.0 - d / max).clamp(0.0, 1.0)
}

/// Min–max normalization onto `[0, 1]`. `NaN` cells stay `NaN`; a constant
/// raster normalizes to all zeros.
pub fn normalize_minmax(r: &Raster) -> Raster {
    match (r.min_valid(), r.max_valid()) {
        (Some(lo), Some(hi)) if hi > lo => {
            let span = hi - lo;
            r.map(|v| (v - lo) / span)
        }
        _ => r.map(|v| if v.is_nan() { v } else { 0.0 }),
    }
}
