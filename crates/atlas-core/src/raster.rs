use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PipelineError, Result};
use crate::geo::area::lonlat_cell_area_km2;
use crate::geo::{utm_forward, utm_inverse, utm_zone_for, Bounds, LonLat};

/// Coordinate reference system of a raster grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// Geographic longitude/latitude, EPSG:4326.
    Wgs84,
    /// WGS84 / UTM, EPSG:326xx (north) or 327xx (south).
    Utm { zone: u8, north: bool },
}

impl Crs {
    pub fn epsg(&self) -> u32 {
        match *self {
            Crs::Wgs84 => 4326,
            Crs::Utm { zone, north: true } => 32600 + zone as u32,
            Crs::Utm { zone, north: false } => 32700 + zone as u32,
        }
    }

    /// UTM zone containing `p`.
    pub fn utm_for(p: LonLat) -> Self {
        Crs::Utm { zone: utm_zone_for(p.lon), north: p.lat >= 0.0 }
    }

    pub fn to_lonlat(&self, x: f64, y: f64) -> LonLat {
        match *self {
            Crs::Wgs84 => LonLat::new(x, y),
            Crs::Utm { zone, north } => utm_inverse(x, y, zone, north),
        }
    }

    pub fn from_lonlat(&self, p: LonLat) -> (f64, f64) {
        match *self {
            Crs::Wgs84 => (p.lon, p.lat),
            Crs::Utm { zone, north } => utm_forward(p, zone, north),
        }
    }
}

/// North-up affine transform.
///
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height      (pixel_height < 0)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self { origin_x, origin_y, pixel_width, pixel_height }
    }

    /// Transform covering `b` with `width × height` pixels.
    pub fn from_bounds(b: Bounds, width: usize, height: usize) -> Self {
        Self::new(
            b.min_x,
            b.max_y,
            b.width() / width.max(1) as f64,
            -b.height() / height.max(1) as f64,
        )
    }

    /// World coordinates of a lattice corner; `(row, col)` may run to `height`/`width`.
    #[inline]
    pub fn corner(&self, row: f64, col: f64) -> (f64, f64) {
        (self.origin_x + col * self.pixel_width, self.origin_y + row * self.pixel_height)
    }

    /// World coordinates of a pixel centre.
    #[inline]
    pub fn center(&self, row: usize, col: usize) -> (f64, f64) {
        self.corner(row as f64 + 0.5, col as f64 + 0.5)
    }

    /// Fractional `(col, row)` lattice position of a world point.
    /// Pixel `(r, c)` spans `[c, c+1) × [r, r+1)`.
    #[inline]
    pub fn to_lattice(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.origin_x) / self.pixel_width, (y - self.origin_y) / self.pixel_height)
    }
}

/// Pixel grid shared by every raster of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: Crs,
}

impl GridSpec {
    pub fn new(width: usize, height: usize, transform: GeoTransform, crs: Crs) -> Self {
        Self { width, height, transform, crs }
    }

    /// Geographic grid covering `b`.
    pub fn from_bounds(b: Bounds, width: usize, height: usize) -> Self {
        Self::new(width, height, GeoTransform::from_bounds(b, width, height), Crs::Wgs84)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    /// Pixel centre in the grid's own CRS.
    pub fn center(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.center(row, col)
    }

    pub fn center_lonlat(&self, row: usize, col: usize) -> LonLat {
        let (x, y) = self.center(row, col);
        self.crs.to_lonlat(x, y)
    }

    /// Extent in the grid's own CRS.
    pub fn bounds(&self) -> Bounds {
        let (x0, y0) = self.transform.corner(0.0, 0.0);
        let (x1, y1) = self.transform.corner(self.height as f64, self.width as f64);
        Bounds::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Area of one pixel in `row`, km². Geographic grids vary with latitude.
    pub fn pixel_area_km2(&self, row: usize) -> f64 {
        let t = &self.transform;
        match self.crs {
            Crs::Wgs84 => {
                let (_, lat_a) = t.corner(row as f64, 0.0);
                let (_, lat_b) = t.corner(row as f64 + 1.0, 0.0);
                lonlat_cell_area_km2(t.pixel_width, lat_a, lat_b)
            }
            Crs::Utm { .. } => (t.pixel_width * t.pixel_height).abs() / 1_000_000.0,
        }
    }

    /// Projected CRS used for metre distances on this grid.
    pub fn metric_crs(&self) -> Crs {
        match self.crs {
            Crs::Utm { .. } => self.crs,
            Crs::Wgs84 => {
                let c = self.bounds().center();
                Crs::utm_for(c)
            }
        }
    }

    /// Pixel spacing `(dx, dy)` in metres, measured at the grid centre.
    /// Falls back to 30 m when the grid is degenerate.
    pub fn pixel_spacing_m(&self) -> (f64, f64) {
        let t = &self.transform;
        let (dx, dy) = match self.crs {
            Crs::Utm { .. } => (t.pixel_width.abs(), t.pixel_height.abs()),
            Crs::Wgs84 => {
                let metric = self.metric_crs();
                let r = self.height as f64 / 2.0;
                let c = self.width as f64 / 2.0;
                let (x0, y0) = t.corner(r, c);
                let (x1, y1) = t.corner(r, c + 1.0);
                let (x2, y2) = t.corner(r + 1.0, c);
                let p0 = metric.from_lonlat(LonLat::new(x0, y0));
                let p1 = metric.from_lonlat(LonLat::new(x1, y1));
                let p2 = metric.from_lonlat(LonLat::new(x2, y2));
                (
                    ((p1.0 - p0.0).powi(2) + (p1.1 - p0.1).powi(2)).sqrt(),
                    ((p2.0 - p0.0).powi(2) + (p2.1 - p0.1).powi(2)).sqrt(),
                )
            }
        };
        let fix = |v: f64| if v.is_finite() && v > 1e-6 { v } else { 30.0 };
        (fix(dx), fix(dy))
    }
}

/// Resampling kernel used when projecting a raster onto another grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resampling {
    /// Categorical layers (masks).
    Nearest,
    /// Continuous layers (reflectance, elevation).
    Bilinear,
}

/// A 2D grid of f32 values, row-major, with `NaN` as the no-data sentinel.
/// Coordinate math uses f64; stored values use f32.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRaster")]
pub struct Raster {
    pub grid: GridSpec,
    /// Row-major values; `NaN` marks no-data (serialized as `null`).
    pub data: Vec<f32>,
}

/// Wire shape of [`Raster`]; converted through [`Raster::from_vec`].
#[derive(Deserialize)]
struct RawRaster {
    grid: GridSpec,
    #[serde(deserialize_with = "null_as_nan_vec")]
    data: Vec<f32>,
}

impl TryFrom<RawRaster> for Raster {
    type Error = PipelineError;

    fn try_from(raw: RawRaster) -> Result<Self> {
        Raster::from_vec(raw.grid, raw.data)
    }
}

impl Raster {
    /// A raster filled with `fill`.
    pub fn new(grid: GridSpec, fill: f32) -> Self {
        let data = vec![fill; grid.len()];
        Self { grid, data }
    }

    /// A raster with every cell no-data.
    pub fn nodata(grid: GridSpec) -> Self {
        Self::new(grid, f32::NAN)
    }

    pub fn from_vec(grid: GridSpec, data: Vec<f32>) -> Result<Self> {
        if data.len() != grid.len() {
            return Err(PipelineError::SizeMismatch { expected: grid.len(), actual: data.len() });
        }
        Ok(Self { grid, data })
    }

    /// Errors unless `data` holds exactly one value per grid cell.
    pub fn check_len(&self) -> Result<()> {
        if self.data.len() != self.grid.len() {
            return Err(PipelineError::SizeMismatch { expected: self.grid.len(), actual: self.data.len() });
        }
        Ok(())
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.grid.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.grid.height
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.grid.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.grid.width + col] = val;
    }

    /// Value at `(row, col)` with indices clamped into the grid.
    #[inline]
    pub fn get_clamped(&self, row: isize, col: isize) -> f32 {
        let r = row.clamp(0, self.grid.height as isize - 1) as usize;
        let c = col.clamp(0, self.grid.width as isize - 1) as usize;
        self.get(r, c)
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    pub fn is_all_nodata(&self) -> bool {
        self.data.iter().all(|v| v.is_nan())
    }

    /// Valid values only, in grid order.
    pub fn valid_values(&self) -> Vec<f32> {
        self.data.iter().copied().filter(|v| !v.is_nan()).collect()
    }

    /// Same grid, values mapped cell by cell. `f` sees the raw value,
    /// including `NaN`.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Raster {
        Raster { grid: self.grid.clone(), data: self.data.iter().map(|&v| f(v)).collect() }
    }

    pub fn min_valid(&self) -> Option<f32> {
        self.data.iter().copied().filter(|v| !v.is_nan()).reduce(f32::min)
    }

    pub fn max_valid(&self) -> Option<f32> {
        self.data.iter().copied().filter(|v| !v.is_nan()).reduce(f32::max)
    }

    /// Sample at world point `(x, y)` given in this raster's CRS.
    /// Returns `NaN` outside the raster footprint.
    pub fn sample(&self, x: f64, y: f64, kernel: Resampling) -> f32 {
        let (w, h) = (self.grid.width, self.grid.height);
        if w == 0 || h == 0 {
            return f32::NAN;
        }
        let (fc, fr) = self.grid.transform.to_lattice(x, y);
        if !(fc >= 0.0 && fr >= 0.0 && fc <= w as f64 && fr <= h as f64) {
            return f32::NAN;
        }
        match kernel {
            Resampling::Nearest => {
                let c = (fc.floor() as usize).min(w - 1);
                let r = (fr.floor() as usize).min(h - 1);
                self.get(r, c)
            }
            Resampling::Bilinear => self.bilinear(fc - 0.5, fr - 0.5),
        }
    }

    /// Bilinear interpolation at centre-relative position `(fx, fy)`.
    /// Taps outside the grid are clamped; no-data taps are dropped and the
    /// remaining weights renormalized.
    fn bilinear(&self, fx: f64, fy: f64) -> f32 {
        let (w, h) = (self.grid.width as isize, self.grid.height as isize);
        let fx = fx.clamp(0.0, (w - 1) as f64);
        let fy = fy.clamp(0.0, (h - 1) as f64);
        let x0 = fx.floor() as isize;
        let y0 = fy.floor() as isize;
        let tx = fx - x0 as f64;
        let ty = fy - y0 as f64;
        let taps = [
            (y0, x0, (1.0 - tx) * (1.0 - ty)),
            (y0, x0 + 1, tx * (1.0 - ty)),
            (y0 + 1, x0, (1.0 - tx) * ty),
            (y0 + 1, x0 + 1, tx * ty),
        ];
        let mut acc = 0.0f64;
        let mut wsum = 0.0f64;
        for (r, c, wt) in taps {
            if wt <= 0.0 {
                continue;
            }
            let v = self.get_clamped(r, c);
            if v.is_nan() {
                continue;
            }
            acc += v as f64 * wt;
            wsum += wt;
        }
        if wsum > 0.0 {
            (acc / wsum) as f32
        } else {
            f32::NAN
        }
    }

    /// Project this raster onto `target`. Identical grids are copied as-is.
    pub fn resample_to(&self, target: &GridSpec, kernel: Resampling) -> Raster {
        if self.grid == *target {
            return self.clone();
        }
        let mut out = Raster::nodata(target.clone());
        for r in 0..target.height {
            for c in 0..target.width {
                let (x, y) = target.center(r, c);
                let (sx, sy) = if target.crs == self.grid.crs {
                    (x, y)
                } else {
                    self.grid.crs.from_lonlat(target.crs.to_lonlat(x, y))
                };
                out.set(r, c, self.sample(sx, sy, kernel));
            }
        }
        out
    }
}

/// Deserialize a `Vec<f32>` where `null` entries stand for no-data.
fn null_as_nan_vec<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<f32>, D::Error> {
    let v: Vec<Option<f32>> = Vec::deserialize(d)?;
    Ok(v.into_iter().map(|x| x.unwrap_or(f32::NAN)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(w: usize, h: usize) -> GridSpec {
        GridSpec::from_bounds(Bounds::new(10.0, 0.0, 10.0 + w as f64 * 0.001, h as f64 * 0.001), w, h)
    }

    #[test]
    fn centers_and_lattice_roundtrip() {
        let g = grid(4, 4);
        let (x, y) = g.center(0, 0);
        assert!((x - 10.0005).abs() < 1e-12);
        assert!((y - 0.0035).abs() < 1e-12);
        let (fc, fr) = g.transform.to_lattice(x, y);
        assert!((fc - 0.5).abs() < 1e-9 && (fr - 0.5).abs() < 1e-9);
    }

    #[test]
    fn same_grid_resample_is_identity() {
        let g = grid(5, 3);
        let mut r = Raster::new(g.clone(), 0.0);
        for (i, v) in r.data.iter_mut().enumerate() {
            *v = i as f32 * 0.37;
        }
        assert_eq!(r.resample_to(&g, Resampling::Bilinear), r);
    }

    #[test]
    fn bilinear_of_constant_stays_constant_and_outside_is_nodata() {
        let src = Raster::new(grid(8, 8), 25.0);
        let fine = GridSpec::from_bounds(src.grid.bounds(), 16, 16);
        let out = src.resample_to(&fine, Resampling::Bilinear);
        assert!(out.data.iter().all(|&v| (v - 25.0).abs() < 1e-5));

        let shifted = Bounds::new(10.004, 0.0, 10.012, 0.008);
        let out = src.resample_to(&GridSpec::from_bounds(shifted, 8, 8), Resampling::Nearest);
        assert!(!out.get(0, 0).is_nan());
        assert!(out.get(0, 7).is_nan());
    }

    #[test]
    fn bilinear_skips_nodata_taps() {
        let mut src = Raster::new(grid(2, 1), 10.0);
        src.set(0, 1, f32::NAN);
        let (x, y) = src.grid.transform.corner(0.5, 1.0);
        assert_eq!(src.sample(x, y, Resampling::Bilinear), 10.0);
    }

    #[test]
    fn utm_grid_pixel_area_and_spacing() {
        let t = GeoTransform::new(500_000.0, 1_000.0, 30.0, -30.0);
        let g = GridSpec::new(10, 10, t, Crs::Utm { zone: 32, north: true });
        assert!((g.pixel_area_km2(0) - 0.0009).abs() < 1e-12);
        assert_eq!(g.pixel_spacing_m(), (30.0, 30.0));
        assert_eq!(g.crs.epsg(), 32632);
    }

    #[test]
    fn geographic_spacing_near_equator() {
        let g = grid(64, 64);
        let (dx, dy) = g.pixel_spacing_m();
        assert!((dx - 111.3).abs() < 1.0, "dx = {dx}");
        assert!((dy - 110.6).abs() < 1.0, "dy = {dy}");
    }

    #[test]
    fn nulls_deserialize_as_nodata() {
        let g = grid(2, 1);
        let json = format!(
            "{{\"grid\":{},\"data\":[1.5,null]}}",
            serde_json::to_string(&g).unwrap()
        );
        let r: Raster = serde_json::from_str(&json).unwrap();
        assert_eq!(r.get(0, 0), 1.5);
        assert!(r.get(0, 1).is_nan());
        assert!(Raster::from_vec(g, vec![0.0; 3]).is_err());
    }

    #[test]
    fn short_data_is_rejected_on_deserialize() {
        let g = grid(2, 2);
        let json = format!("{{\"grid\":{},\"data\":[1.0,2.0]}}", serde_json::to_string(&g).unwrap());
        assert!(serde_json::from_str::<Raster>(&json).is_err());

        let r = Raster { grid: g, data: vec![0.0; 2] };
        assert!(matches!(r.check_len(), Err(PipelineError::SizeMismatch { expected: 4, actual: 2 })));
    }
}
