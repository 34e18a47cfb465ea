//! Geodesic area on the WGS84 authalic sphere.
//!
//! Uses the line-integral form (Chamberlain & Duquette, 2007):
//!   A = R² / 2 · |Σ (λ₂ − λ₁) · (2 + sin φ₁ + sin φ₂)|
//! which is exact on the sphere for lat/lon rectangles and accurate to well
//! under 0.5 % for AOI-sized polygons on the ellipsoid.

use super::{LonLat, Polygon};

/// Radius of the sphere with the same surface area as the WGS84 ellipsoid.
pub const EARTH_AUTHALIC_RADIUS_M: f64 = 6_371_007.2;

/// Unsigned area of one ring in m².
pub fn geodesic_ring_area_m2(ring: &[LonLat]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let mut s = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        let dl = (b.lon - a.lon).to_radians();
        s += dl * (2.0 + a.lat.to_radians().sin() + b.lat.to_radians().sin());
    }
    (s * EARTH_AUTHALIC_RADIUS_M * EARTH_AUTHALIC_RADIUS_M / 2.0).abs()
}

/// Polygon area in km², holes subtracted.
pub fn geodesic_polygon_area_km2(poly: &Polygon) -> f64 {
    let ext = geodesic_ring_area_m2(&poly.exterior);
    let holes: f64 = poly.holes.iter().map(|h| geodesic_ring_area_m2(h)).sum();
    ((ext - holes) / 1_000_000.0).max(0.0)
}

/// Area in km² of a lat/lon-aligned cell spanning `dlon_deg` and the
/// latitude band `[lat_a, lat_b]`.
pub fn lonlat_cell_area_km2(dlon_deg: f64, lat_a: f64, lat_b: f64) -> f64 {
    let r2 = EARTH_AUTHALIC_RADIUS_M * EARTH_AUTHALIC_RADIUS_M;
    let band = (lat_a.to_radians().sin() - lat_b.to_radians().sin()).abs();
    r2 * dlon_deg.to_radians().abs() * band / 1_000_000.0
}
