//! Per-band median composite over the selected scenes.

use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};
use crate::parallel::*;
use crate::raster::{GridSpec, Raster, Resampling};
use crate::sources::{Band, Scene};

/// Median of `vals` (mean of the two middle values for even counts), `NaN`
/// when empty. Sorts in place.
fn median(vals: &mut [f32]) -> f32 {
    if vals.is_empty() {
        return f32::NAN;
    }
    vals.sort_by(f32::total_cmp);
    let n = vals.len();
    if n % 2 == 1 {
        vals[n / 2]
    } else {
        (vals[n / 2 - 1] + vals[n / 2]) / 2.0
    }
}

/// Resample every scene's `bands` onto `grid` and take the pixel-wise median
/// of valid values. A pixel with no valid value in any scene stays no-data.
pub fn median_composite(
    scenes: &[Scene],
    bands: &[Band],
    grid: &GridSpec,
) -> Result<BTreeMap<Band, Raster>> {
    let mut out = BTreeMap::new();
    for &band in bands {
        let layers = scenes
            .iter()
            .map(|s| {
                s.bands
                    .get(&band)
                    .map(|r| r.resample_to(grid, Resampling::Bilinear))
                    .ok_or_else(|| PipelineError::DataUnavailable(format!("scene {} lacks band {band}", s.id)))
            })
            .collect::<Result<Vec<Raster>>>()?;

        let composite = if layers.len() == 1 {
            layers.into_iter().next().unwrap_or_else(|| Raster::nodata(grid.clone()))
        } else {
            let data: Vec<f32> = (0..grid.height)
                .into_par_iter()
                .flat_map(|row| {
                    let mut stack = Vec::with_capacity(layers.len());
                    (0..grid.width)
                        .map(|col| {
                            stack.clear();
                            stack.extend(layers.iter().map(|l| l.get(row, col)).filter(|v| !v.is_nan()));
                            median(&mut stack)
                        })
                        .collect::<Vec<f32>>()
                })
                .collect();
            Raster::from_vec(grid.clone(), data)?
        };
        out.insert(band, composite);
    }
    Ok(out)
}
