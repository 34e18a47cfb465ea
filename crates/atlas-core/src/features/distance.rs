//! Distance-to-feature rasters in metres.
//!
//! Lines are burned onto the grid and an exact Euclidean distance transform
//! (Felzenszwalb & Huttenlocher separable lower-envelope method) runs with
//! the grid's metre spacing along each axis. When a layer has features but
//! none of them touches the grid, every cell gets an exact point-to-segment
//! distance in the grid's UTM zone instead.

use crate::geo::LonLat;
use crate::parallel::*;
use crate::raster::{GridSpec, Raster};
use crate::sources::VectorSet;

/// Lines lying exactly on the grid border still count as on-grid, in pixels.
const EDGE_TOLERANCE: f64 = 1e-6;

/// Distance from each cell centre to the nearest line of `set`, metres.
/// An empty set gives an all-no-data raster.
pub fn distance_raster(set: &VectorSet, grid: &GridSpec) -> Raster {
    if set.is_empty() || grid.is_empty() {
        return Raster::nodata(grid.clone());
    }
    let seeds = burn_lines(set, grid);
    if seeds.iter().any(|&s| s) {
        let (dx, dy) = grid.pixel_spacing_m();
        Raster { grid: grid.clone(), data: edt(&seeds, grid.width, grid.height, dx, dy) }
    } else {
        exact_distances(set, grid)
    }
}

/// Mark every cell crossed by a segment, sampling at half-pixel steps.
fn burn_lines(set: &VectorSet, grid: &GridSpec) -> Vec<bool> {
    let (w, h) = (grid.width, grid.height);
    let mut seeds = vec![false; grid.len()];
    let to_lattice = |p: LonLat| {
        let (x, y) = grid.crs.from_lonlat(p);
        grid.transform.to_lattice(x, y)
    };
    for line in &set.lines {
        let pts: Vec<(f64, f64)> = line.points().iter().map(|&p| to_lattice(p)).collect();
        let segments: Vec<((f64, f64), (f64, f64))> = if pts.len() == 1 {
            vec![(pts[0], pts[0])]
        } else {
            pts.windows(2).map(|s| (s[0], s[1])).collect()
        };
        for ((c0, r0), (c1, r1)) in segments {
            let span = (c1 - c0).abs().max((r1 - r0).abs());
            if !span.is_finite() {
                continue;
            }
            let steps = (span / 0.5).ceil() as usize + 1;
            for i in 0..=steps {
                let t = i as f64 / steps as f64;
                let fc = c0 + t * (c1 - c0);
                let fr = r0 + t * (r1 - r0);
                if fc < -EDGE_TOLERANCE
                    || fr < -EDGE_TOLERANCE
                    || fc > w as f64 + EDGE_TOLERANCE
                    || fr > h as f64 + EDGE_TOLERANCE
                {
                    continue;
                }
                let c = (fc.max(0.0).floor() as usize).min(w - 1);
                let r = (fr.max(0.0).floor() as usize).min(h - 1);
                seeds[r * w + c] = true;
            }
        }
    }
    seeds
}

/// Exact Euclidean distance transform. Returns metres from each cell to the
/// nearest seed cell, or `NaN` everywhere when there is no seed.
fn edt(seeds: &[bool], w: usize, h: usize, dx: f64, dy: f64) -> Vec<f32> {
    // Column pass: squared vertical distance to the nearest seed.
    let columns: Vec<Vec<f64>> = (0..w)
        .into_par_iter()
        .map(|c| {
            let f: Vec<f64> = (0..h).map(|r| if seeds[r * w + c] { 0.0 } else { f64::INFINITY }).collect();
            lower_envelope(&f, dy)
        })
        .collect();
    // Row pass over the column result.
    (0..h)
        .into_par_iter()
        .flat_map(|r| {
            let f: Vec<f64> = (0..w).map(|c| columns[c][r]).collect();
            lower_envelope(&f, dx)
                .into_iter()
                .map(|d2| if d2.is_finite() { d2.sqrt() as f32 } else { f32::NAN })
                .collect::<Vec<f32>>()
        })
        .collect()
}

/// 1D squared distance transform of sampled function `f` at positions
/// `i · spacing`: `d(q) = min_p ((q − p)·spacing)² + f(p)`.
/// Infinite samples are not sites.
fn lower_envelope(f: &[f64], spacing: f64) -> Vec<f64> {
    let n = f.len();
    // v: parabola apexes; z[i]: left boundary of parabola v[i].
    let mut v: Vec<usize> = Vec::with_capacity(n);
    let mut z: Vec<f64> = Vec::with_capacity(n);
    for q in 0..n {
        if !f[q].is_finite() {
            continue;
        }
        let xq = q as f64 * spacing;
        while let (Some(&p), Some(&zl)) = (v.last(), z.last()) {
            let xp = p as f64 * spacing;
            let s = ((f[q] + xq * xq) - (f[p] + xp * xp)) / (2.0 * (xq - xp));
            if s <= zl {
                v.pop();
                z.pop();
            } else {
                v.push(q);
                z.push(s);
                break;
            }
        }
        if v.is_empty() {
            v.push(q);
            z.push(f64::NEG_INFINITY);
        }
    }
    if v.is_empty() {
        return vec![f64::INFINITY; n];
    }
    let mut out = vec![0.0; n];
    let mut k = 0;
    for (q, slot) in out.iter_mut().enumerate() {
        let xq = q as f64 * spacing;
        while k + 1 < v.len() && z[k + 1] < xq {
            k += 1;
        }
        let d = xq - v[k] as f64 * spacing;
        *slot = d * d + f[v[k]];
    }
    out
}

/// Brute-force point-to-segment distances in the grid's metric CRS.
fn exact_distances(set: &VectorSet, grid: &GridSpec) -> Raster {
    let metric = grid.metric_crs();
    let segments: Vec<((f64, f64), (f64, f64))> = set
        .lines
        .iter()
        .flat_map(|l| {
            let pts: Vec<(f64, f64)> = l.points().iter().map(|&p| metric.from_lonlat(p)).collect();
            if pts.len() == 1 {
                vec![(pts[0], pts[0])]
            } else {
                pts.windows(2).map(|s| (s[0], s[1])).collect()
            }
        })
        .collect();

    let data: Vec<f32> = (0..grid.height)
        .into_par_iter()
        .flat_map(|r| {
            (0..grid.width)
                .map(|c| {
                    let p = metric.from_lonlat(grid.center_lonlat(r, c));
                    segments
                        .iter()
                        .map(|&(a, b)| point_segment_distance(p, a, b))
                        .fold(f64::INFINITY, f64::min) as f32
                })
                .collect::<Vec<f32>>()
        })
        .collect();
    Raster { grid: grid.clone(), data }
}

fn point_segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let len2 = abx * abx + aby * aby;
    let t = if len2 > 0.0 { (((p.0 - a.0) * abx + (p.1 - a.1) * aby) / len2).clamp(0.0, 1.0) } else { 0.0 };
    let (cx, cy) = (a.0 + t * abx, a.1 + t * aby);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Bounds, LineString};
    use crate::raster::{Crs, GeoTransform};

    fn utm_grid(w: usize, h: usize) -> GridSpec {
        GridSpec::new(w, h, GeoTransform::new(500_000.0, 1_000_000.0, 30.0, -30.0), Crs::Utm { zone: 31, north: true })
    }

    #[test]
    fn envelope_matches_brute_force() {
        let f = [f64::INFINITY, 0.0, f64::INFINITY, f64::INFINITY, 4.0, f64::INFINITY, 0.0];
        let got = lower_envelope(&f, 2.0);
        for (q, &g) in got.iter().enumerate() {
            let want = f
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_finite())
                .map(|(p, &v)| ((q as f64 - p as f64) * 2.0).powi(2) + v)
                .fold(f64::INFINITY, f64::min);
            assert_eq!(g, want, "q = {q}");
        }
        assert!(lower_envelope(&[f64::INFINITY; 3], 1.0).iter().all(|v| v.is_infinite()));
    }

    #[test]
    fn edt_is_euclidean_with_anisotropic_spacing() {
        let (w, h) = (7, 5);
        let mut seeds = vec![false; w * h];
        seeds[2 * w + 3] = true;
        let d = edt(&seeds, w, h, 10.0, 20.0);
        assert_eq!(d[2 * w + 3], 0.0);
        assert!((d[2 * w + 6] - 30.0).abs() < 1e-4);
        assert!((d[4 * w + 3] - 40.0).abs() < 1e-4);
        assert!((d[0] - (30f32 * 30.0 + 40.0 * 40.0).sqrt()).abs() < 1e-3);
    }

    #[test]
    fn line_through_first_column_gives_column_distances() {
        let grid = utm_grid(10, 4);
        let north = grid.crs.to_lonlat(500_015.0, 1_000_000.0);
        let south = grid.crs.to_lonlat(500_015.0, 1_000_000.0 - 120.0);
        let set = VectorSet::new(vec![LineString::new(vec![north, south])]);
        let d = distance_raster(&set, &grid);
        for c in 0..10 {
            assert!((d.get(1, c) - 30.0 * c as f32).abs() < 0.5, "col {c}: {}", d.get(1, c));
        }
    }

    #[test]
    fn off_grid_line_uses_exact_distances() {
        let grid = GridSpec::from_bounds(Bounds::new(10.0, 0.0, 10.01, 0.01), 4, 4);
        let far = VectorSet::new(vec![LineString::new(vec![LonLat::new(10.02, -1.0), LonLat::new(10.02, 1.0)])]);
        let d = distance_raster(&far, &grid);
        assert!(d.data.iter().all(|v| v.is_finite()));
        // Closer to the line in the east column than in the west column.
        assert!(d.get(0, 3) < d.get(0, 0));
        assert!((d.get(0, 0) - 0.01875 * 111_320.0).abs() < 300.0);
    }

    #[test]
    fn empty_layer_is_nodata() {
        let grid = utm_grid(3, 3);
        assert!(distance_raster(&VectorSet::default(), &grid).is_all_nodata());
    }
}
