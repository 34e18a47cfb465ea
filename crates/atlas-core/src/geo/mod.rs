//! Geographic primitives: points, bounds, polygons, lines and the AOI.
//! Coordinate math uses f64 throughout.

pub mod area;
pub mod geojson;
pub mod projection;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub use area::{geodesic_polygon_area_km2, geodesic_ring_area_m2, EARTH_AUTHALIC_RADIUS_M};
pub use projection::{utm_forward, utm_inverse, utm_zone_for};

/// A point in geographic coordinates (degrees, WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

/// Axis-aligned bounding box `(min_x, min_y) .. (max_x, max_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Bounds of a point set. `None` for an empty set.
    pub fn of_points<'a>(points: impl IntoIterator<Item = &'a LonLat>) -> Option<Self> {
        let mut it = points.into_iter();
        let first = it.next()?;
        let mut b = Self::new(first.lon, first.lat, first.lon, first.lat);
        for p in it {
            b.min_x = b.min_x.min(p.lon);
            b.min_y = b.min_y.min(p.lat);
            b.max_x = b.max_x.max(p.lon);
            b.max_y = b.max_y.max(p.lat);
        }
        Some(b)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> LonLat {
        LonLat::new((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    /// True when either extent is zero (or inverted).
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }
}

/// A polygon with one exterior ring and zero or more holes.
///
/// Rings are stored open (the closing vertex is implied). Exterior rings
/// produced by target extraction are counter-clockwise, holes clockwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<LonLat>,
    #[serde(default)]
    pub holes: Vec<Vec<LonLat>>,
}

impl Polygon {
    /// Build a polygon, dropping a duplicated closing vertex if present.
    pub fn new(exterior: Vec<LonLat>, holes: Vec<Vec<LonLat>>) -> Self {
        Self { exterior: open_ring(exterior), holes: holes.into_iter().map(open_ring).collect() }
    }

    /// Axis-aligned rectangle, counter-clockwise.
    pub fn rectangle(b: Bounds) -> Self {
        Self::new(
            vec![
                LonLat::new(b.min_x, b.min_y),
                LonLat::new(b.max_x, b.min_y),
                LonLat::new(b.max_x, b.max_y),
                LonLat::new(b.min_x, b.max_y),
            ],
            Vec::new(),
        )
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of_points(&self.exterior)
    }

    /// Even–odd containment over all rings, so holes are excluded.
    pub fn contains(&self, p: LonLat) -> bool {
        let mut inside = ring_crossings(&self.exterior, p);
        for hole in &self.holes {
            if ring_crossings(hole, p) {
                inside = !inside;
            }
        }
        inside
    }

    /// Planar area in squared coordinate units (exterior minus holes).
    pub fn planar_area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(|h| signed_ring_area(h).abs()).sum();
        signed_ring_area(&self.exterior).abs() - holes
    }

    /// Area-weighted planar centroid. Falls back to the vertex mean for
    /// zero-area rings.
    pub fn centroid(&self) -> Option<LonLat> {
        let mut a_sum = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        let ext_sign = signed_ring_area(&self.exterior).signum();
        let rings = std::iter::once((&self.exterior, 1.0))
            .chain(self.holes.iter().map(|h| (h, -1.0)));
        for (ring, role) in rings {
            let a = signed_ring_area(ring);
            if a == 0.0 {
                continue;
            }
            // Normalize orientation so the exterior counts positive and holes negative.
            let w = role * a.abs();
            let (rx, ry) = ring_centroid(ring, a);
            a_sum += w;
            cx += rx * w;
            cy += ry * w;
        }
        if a_sum.abs() > 0.0 && ext_sign != 0.0 {
            return Some(LonLat::new(cx / a_sum, cy / a_sum));
        }
        let n = self.exterior.len();
        if n == 0 {
            return None;
        }
        let lon = self.exterior.iter().map(|p| p.lon).sum::<f64>() / n as f64;
        let lat = self.exterior.iter().map(|p| p.lat).sum::<f64>() / n as f64;
        Some(LonLat::new(lon, lat))
    }

    /// Geodesic area in km² on the authalic sphere.
    pub fn area_km2(&self) -> f64 {
        geodesic_polygon_area_km2(self)
    }
}

/// A polyline in geographic coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineString(pub Vec<LonLat>);

impl LineString {
    pub fn new(points: Vec<LonLat>) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[LonLat] {
        &self.0
    }
}

/// The run's area of interest: one polygon plus its geodesic area.
///
/// Constructed once, validated, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAoi")]
pub struct Aoi {
    polygon: Polygon,
    bounds: Bounds,
    area_km2: f64,
}

/// Wire shape of [`Aoi`]. Only the polygon is read back; bounds and area are
/// recomputed by [`Aoi::new`].
#[derive(Deserialize)]
struct RawAoi {
    polygon: Polygon,
}

impl TryFrom<RawAoi> for Aoi {
    type Error = PipelineError;

    fn try_from(raw: RawAoi) -> Result<Self> {
        Aoi::new(raw.polygon)
    }
}

impl Aoi {
    /// Validate and wrap a polygon. Rejects non-finite coordinates, fewer than
    /// three distinct vertices, and zero-area shapes.
    pub fn new(polygon: Polygon) -> Result<Self> {
        if polygon.exterior.iter().chain(polygon.holes.iter().flatten()).any(|p| !p.is_finite()) {
            return Err(PipelineError::invalid("aoi", "coordinates must be finite"));
        }
        let mut distinct: Vec<LonLat> = Vec::with_capacity(polygon.exterior.len());
        for p in &polygon.exterior {
            if !distinct.contains(p) {
                distinct.push(*p);
            }
        }
        if distinct.len() < 3 {
            return Err(PipelineError::invalid("aoi", "polygon needs at least 3 distinct vertices"));
        }
        let bounds = polygon
            .bounds()
            .ok_or_else(|| PipelineError::invalid("aoi", "polygon has no vertices"))?;
        let area_km2 = polygon.area_km2();
        if !(area_km2 > 0.0) || bounds.is_degenerate() {
            return Err(PipelineError::invalid("aoi", "area must be greater than zero"));
        }
        Ok(Self { polygon, bounds, area_km2 })
    }

    /// Convenience constructor for a rectangular AOI.
    pub fn from_bounds(b: Bounds) -> Result<Self> {
        Self::new(Polygon::rectangle(b))
    }

    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn area_km2(&self) -> f64 {
        self.area_km2
    }
}

/// Shoelace signed area; positive for counter-clockwise rings in a y-up frame.
pub(crate) fn signed_ring_area(ring: &[LonLat]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let mut s = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        s += a.lon * b.lat - b.lon * a.lat;
    }
    s / 2.0
}

fn ring_centroid(ring: &[LonLat], signed_area: f64) -> (f64, f64) {
    let n = ring.len();
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        let cross = a.lon * b.lat - b.lon * a.lat;
        cx += (a.lon + b.lon) * cross;
        cy += (a.lat + b.lat) * cross;
    }
    (cx / (6.0 * signed_area), cy / (6.0 * signed_area))
}

/// Ray-casting parity test for a single ring.
fn ring_crossings(ring: &[LonLat], p: LonLat) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a.lat > p.lat) != (b.lat > p.lat) {
            let x = (b.lon - a.lon) * (p.lat - a.lat) / (b.lat - a.lat) + a.lon;
            if p.lon < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn open_ring(mut ring: Vec<LonLat>) -> Vec<LonLat> {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}
