//! Lineament density from hillshade.
//!
//! Pipeline:
//! 1. min–max normalize hillshade
//! 2. separable [1 2 1] smoothing, two passes
//! 3. Sobel gradient magnitude
//! 4. non-maximum suppression along the gradient, keeping magnitudes above
//!    mean + 1σ
//! 5. fraction of edge cells in a 15×15 window
//! 6. min–max normalize

use crate::raster::Raster;
use crate::stats::{mean_std, normalize_minmax};

pub const DENSITY_WINDOW: usize = 15;
const SMOOTHING_PASSES: usize = 2;

pub fn lineament_density(hillshade: &Raster) -> Raster {
    let (w, h) = (hillshade.width(), hillshade.height());
    if w == 0 || h == 0 {
        return hillshade.clone();
    }
    let norm = normalize_minmax(hillshade);
    let mut img: Vec<f64> = norm.data.iter().map(|&v| if v.is_nan() { 0.0 } else { v as f64 }).collect();
    for _ in 0..SMOOTHING_PASSES {
        img = smooth_121(&img, w, h);
    }
    let (mag, dir) = sobel(&img, w, h);
    let edges = suppress(&mag, &dir, w, h);
    let density = box_mean(&edges, w, h, DENSITY_WINDOW / 2);

    let data = density
        .iter()
        .zip(&hillshade.data)
        .map(|(&d, &src)| if src.is_nan() { f32::NAN } else { d as f32 })
        .collect();
    normalize_minmax(&Raster { grid: hillshade.grid.clone(), data })
}

#[inline]
fn at(img: &[f64], w: usize, h: usize, r: isize, c: isize) -> f64 {
    let r = r.clamp(0, h as isize - 1) as usize;
    let c = c.clamp(0, w as isize - 1) as usize;
    img[r * w + c]
}

fn smooth_121(img: &[f64], w: usize, h: usize) -> Vec<f64> {
    let mut tmp = vec![0.0; img.len()];
    for r in 0..h as isize {
        for c in 0..w as isize {
            tmp[r as usize * w + c as usize] =
                (at(img, w, h, r, c - 1) + 2.0 * at(img, w, h, r, c) + at(img, w, h, r, c + 1)) / 4.0;
        }
    }
    let mut out = vec![0.0; img.len()];
    for r in 0..h as isize {
        for c in 0..w as isize {
            out[r as usize * w + c as usize] =
                (at(&tmp, w, h, r - 1, c) + 2.0 * at(&tmp, w, h, r, c) + at(&tmp, w, h, r + 1, c)) / 4.0;
        }
    }
    out
}

/// Gradient magnitude and direction (radians, `atan2(gy, gx)`).
fn sobel(img: &[f64], w: usize, h: usize) -> (Vec<f64>, Vec<f64>) {
    let mut mag = vec![0.0; img.len()];
    let mut dir = vec![0.0; img.len()];
    for r in 0..h as isize {
        for c in 0..w as isize {
            let z = |dr: isize, dc: isize| at(img, w, h, r + dr, c + dc);
            let gx = (z(-1, 1) + 2.0 * z(0, 1) + z(1, 1)) - (z(-1, -1) + 2.0 * z(0, -1) + z(1, -1));
            let gy = (z(1, -1) + 2.0 * z(1, 0) + z(1, 1)) - (z(-1, -1) + 2.0 * z(-1, 0) + z(-1, 1));
            let i = r as usize * w + c as usize;
            mag[i] = (gx * gx + gy * gy).sqrt();
            dir[i] = gy.atan2(gx);
        }
    }
    (mag, dir)
}

/// Thin edges to local maxima across the gradient and drop weak responses.
fn suppress(mag: &[f64], dir: &[f64], w: usize, h: usize) -> Vec<f64> {
    let as_f32: Vec<f32> = mag.iter().map(|&m| m as f32).collect();
    let threshold = match mean_std(&as_f32) {
        Some((mean, sd)) => mean + sd,
        None => return vec![0.0; mag.len()],
    };
    let mut edges = vec![0.0; mag.len()];
    for r in 0..h as isize {
        for c in 0..w as isize {
            let i = r as usize * w + c as usize;
            let m = mag[i];
            if m <= threshold || m <= 0.0 {
                continue;
            }
            // Quantize the gradient direction to one of four neighbour axes.
            let deg = dir[i].to_degrees().rem_euclid(180.0);
            let (dr, dc) = if !(22.5..157.5).contains(&deg) {
                (0, 1)
            } else if deg < 67.5 {
                (1, 1)
            } else if deg < 112.5 {
                (1, 0)
            } else {
                (1, -1)
            };
            let a = at(mag, w, h, r + dr, c + dc);
            let b = at(mag, w, h, r - dr, c - dc);
            if m >= a && m >= b {
                edges[i] = 1.0;
            }
        }
    }
    edges
}

/// Mean over a `(2·radius+1)²` window clipped to the grid, via a summed-area
/// table.
fn box_mean(img: &[f64], w: usize, h: usize, radius: usize) -> Vec<f64> {
    let stride = w + 1;
    let mut sat = vec![0.0; (w + 1) * (h + 1)];
    for r in 0..h {
        let mut row_sum = 0.0;
        for c in 0..w {
            row_sum += img[r * w + c];
            sat[(r + 1) * stride + c + 1] = sat[r * stride + c + 1] + row_sum;
        }
    }
    let mut out = vec![0.0; img.len()];
    for r in 0..h {
        let (r0, r1) = (r.saturating_sub(radius), (r + radius + 1).min(h));
        for c in 0..w {
            let (c0, c1) = (c.saturating_sub(radius), (c + radius + 1).min(w));
            let sum = sat[r1 * stride + c1] - sat[r0 * stride + c1] - sat[r1 * stride + c0] + sat[r0 * stride + c0];
            out[r * w + c] = sum / ((r1 - r0) * (c1 - c0)) as f64;
        }
    }
    out
}
