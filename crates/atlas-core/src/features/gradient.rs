//! Horn (1981) 3×3 gradient shared by slope and hillshade.
//! `pub(crate)` only.

use crate::raster::Raster;

/// Horn weighted 3×3 gradient at `(r, c)`.
///
/// Returns `(dz_dx, dz_dy)` with x growing east and y growing south (row
/// order), as rise/run given metre spacings `dx`, `dy`.
///
/// ```text
///   NW(-1,-1)  N(-1, 0)  NE(-1,+1)
///   W ( 0,-1)  *         E ( 0,+1)
///   SW(+1,-1)  S(+1, 0)  SE(+1,+1)
/// ```
///
/// `dz/dx = ((NE + 2E + SE) − (NW + 2W + SW)) / (8 · dx)`
/// `dz/dy = ((SW + 2S + SE) − (NW + 2N + NE)) / (8 · dy)`
///
/// Neighbours outside the grid replicate the nearest edge cell, so border
/// cells get a one-sided estimate instead of being dropped. A no-data
/// neighbour yields `NaN`.
pub(crate) fn horn_gradient(dem: &Raster, r: usize, c: usize, dx: f64, dy: f64) -> (f64, f64) {
    let (r, c) = (r as isize, c as isize);
    let z = |dr: isize, dc: isize| dem.get_clamped(r + dr, c + dc) as f64;

    let nw = z(-1, -1);
    let n = z(-1, 0);
    let ne = z(-1, 1);
    let w = z(0, -1);
    let e = z(0, 1);
    let sw = z(1, -1);
    let s = z(1, 0);
    let se = z(1, 1);

    let dz_dx = ((ne + 2.0 * e + se) - (nw + 2.0 * w + sw)) / (8.0 * dx);
    let dz_dy = ((sw + 2.0 * s + se) - (nw + 2.0 * n + ne)) / (8.0 * dy);
    (dz_dx, dz_dy)
}
