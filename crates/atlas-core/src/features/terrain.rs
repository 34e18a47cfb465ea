//! Slope and hillshade from a DEM on a shared grid.

use crate::parallel::*;
use crate::raster::Raster;

use super::gradient::horn_gradient;

pub const SUN_AZIMUTH_DEG: f64 = 315.0;
pub const SUN_ALTITUDE_DEG: f64 = 45.0;

/// Slope in degrees: `atan(√(dz_dx² + dz_dy²))`.
///
/// Pixel spacing in metres comes from the grid, so geographic DEMs are
/// handled without reprojection.
pub fn slope_deg(dem: &Raster) -> Raster {
    let (dx, dy) = dem.grid.pixel_spacing_m();
    let data: Vec<f32> = (0..dem.height())
        .into_par_iter()
        .flat_map(|row| {
            (0..dem.width())
                .map(|col| {
                    let (gx, gy) = horn_gradient(dem, row, col, dx, dy);
                    (gx * gx + gy * gy).sqrt().atan().to_degrees() as f32
                })
                .collect::<Vec<f32>>()
        })
        .collect();
    Raster { grid: dem.grid.clone(), data }
}

/// Normalized hillshade in `[0, 1]` for a sun at azimuth 315°, altitude 45°.
///
/// `shade = cos(zenith)·cos(slope) + sin(zenith)·sin(slope)·cos(azimuth − aspect)`
///
/// Flat terrain shades to `cos(45°)`.
pub fn hillshade(dem: &Raster) -> Raster {
    let (dx, dy) = dem.grid.pixel_spacing_m();
    let azimuth = (360.0 - SUN_AZIMUTH_DEG + 90.0).to_radians();
    let zenith = (90.0 - SUN_ALTITUDE_DEG).to_radians();
    let (cos_z, sin_z) = (zenith.cos(), zenith.sin());

    let data: Vec<f32> = (0..dem.height())
        .into_par_iter()
        .flat_map(|row| {
            (0..dem.width())
                .map(|col| {
                    let (gx, gy) = horn_gradient(dem, row, col, dx, dy);
                    if gx.is_nan() || gy.is_nan() {
                        return f32::NAN;
                    }
                    let slope = (gx * gx + gy * gy).sqrt().atan();
                    let aspect = if gx.abs() < 1e-10 && gy.abs() < 1e-10 {
                        0.0
                    } else {
                        let a = (-gy).atan2(-gx);
                        if a < 0.0 {
                            std::f64::consts::TAU + a
                        } else {
                            a
                        }
                    };
                    let shade = cos_z * slope.cos() + sin_z * slope.sin() * (azimuth - aspect).cos();
                    shade.clamp(0.0, 1.0) as f32
                })
                .collect::<Vec<f32>>()
        })
        .collect();
    Raster { grid: dem.grid.clone(), data }
}
