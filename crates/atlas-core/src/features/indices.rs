//! Band-ratio spectral indices. A zero denominator or a no-data input band
//! gives a no-data pixel.

use crate::error::{PipelineError, Result};
use crate::parallel::*;
use crate::raster::Raster;

fn check_grids(first: &Raster, rest: &[&Raster]) -> Result<()> {
    for r in rest {
        if r.grid != first.grid {
            return Err(PipelineError::SizeMismatch { expected: first.grid.len(), actual: r.grid.len() });
        }
    }
    Ok(())
}

/// `(a − b) / (a + b)`.
pub fn normalized_difference(a: &Raster, b: &Raster) -> Result<Raster> {
    check_grids(a, &[b])?;
    let data: Vec<f32> = (0..a.height())
        .into_par_iter()
        .flat_map(|row| {
            (0..a.width())
                .map(|col| ratio(a.get(row, col) - b.get(row, col), a.get(row, col) + b.get(row, col)))
                .collect::<Vec<f32>>()
        })
        .collect();
    Raster::from_vec(a.grid.clone(), data)
}

/// NDVI = (NIR − Red) / (NIR + Red).
pub fn ndvi(nir: &Raster, red: &Raster) -> Result<Raster> {
    normalized_difference(nir, red)
}

/// NDWI = (Green − NIR) / (Green + NIR).
pub fn ndwi(green: &Raster, nir: &Raster) -> Result<Raster> {
    normalized_difference(green, nir)
}

/// Bare Soil Index:
///
/// `BSI = ((SWIR + Red) − (NIR + Blue)) / ((SWIR + Red) + (NIR + Blue))`
pub fn bsi(swir: &Raster, red: &Raster, nir: &Raster, blue: &Raster) -> Result<Raster> {
    check_grids(swir, &[red, nir, blue])?;
    let data: Vec<f32> = (0..swir.height())
        .into_par_iter()
        .flat_map(|row| {
            (0..swir.width())
                .map(|col| {
                    let bright = swir.get(row, col) + red.get(row, col);
                    let veg = nir.get(row, col) + blue.get(row, col);
                    ratio(bright - veg, bright + veg)
                })
                .collect::<Vec<f32>>()
        })
        .collect();
    Raster::from_vec(swir.grid.clone(), data)
}

#[inline]
fn ratio(num: f32, den: f32) -> f32 {
    // NaN inputs propagate through both operands.
    if den.is_nan() || den.abs() < 1e-10 {
        f32::NAN
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Bounds;
    use crate::raster::GridSpec;
    use approx::assert_relative_eq;

    fn raster(vals: &[f32]) -> Raster {
        let g = GridSpec::from_bounds(Bounds::new(0.0, 0.0, vals.len() as f64, 1.0), vals.len(), 1);
        Raster::from_vec(g, vals.to_vec()).unwrap()
    }

    #[test]
    fn ndvi_values_and_zero_denominator() {
        let nir = raster(&[0.5, 0.0, f32::NAN]);
        let red = raster(&[0.1, 0.0, 0.2]);
        let v = ndvi(&nir, &red).unwrap();
        assert_relative_eq!(v.get(0, 0), 0.4 / 0.6, epsilon = 1e-6);
        assert!(v.get(0, 1).is_nan());
        assert!(v.get(0, 2).is_nan());
    }

    #[test]
    fn bsi_of_bright_soil_is_positive() {
        let v = bsi(&raster(&[0.6]), &raster(&[0.15]), &raster(&[0.25]), &raster(&[0.1])).unwrap();
        assert_relative_eq!(v.get(0, 0), 0.4 / 1.1, epsilon = 1e-6);
    }

    #[test]
    fn mismatched_grids_are_rejected() {
        assert!(ndwi(&raster(&[0.1, 0.2]), &raster(&[0.1])).is_err());
    }
}
