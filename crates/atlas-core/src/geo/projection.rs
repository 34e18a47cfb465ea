//! WGS84 Universal Transverse Mercator projection.
//!
//! UTM is the projected, locally equal-distance frame used for every
//! metre-valued quantity in the pipeline (pixel spacing, distances to roads,
//! rivers and coastline). Series expansions follow Snyder (1987), §8.

use super::LonLat;

const A: f64 = 6_378_137.0;
const F: f64 = 1.0 / 298.257_223_563;
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

#[inline]
fn e2() -> f64 {
    F * (2.0 - F)
}

/// UTM zone (1–60) containing `lon`.
pub fn utm_zone_for(lon: f64) -> u8 {
    let z = ((lon + 180.0) / 6.0).floor() as i64 + 1;
    z.clamp(1, 60) as u8
}

fn central_meridian(zone: u8) -> f64 {
    (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
}

fn meridian_arc(phi: f64) -> f64 {
    let e2 = e2();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    A * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

/// Project a geographic point into the given UTM zone. Returns `(easting, northing)` in metres.
pub fn utm_forward(p: LonLat, zone: u8, north: bool) -> (f64, f64) {
    let e2 = e2();
    let ep2 = e2 / (1.0 - e2);
    let phi = p.lat.to_radians();
    let lam = (p.lon - central_meridian(zone)).to_radians();

    let sin_phi = phi.sin();
    let cos_phi = phi.cos();
    let tan_phi = phi.tan();

    let n = A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = ep2 * cos_phi * cos_phi;
    let a = cos_phi * lam;
    let m = meridian_arc(phi);

    let x = K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + FALSE_EASTING;
    let mut y = K0
        * (m + n
            * tan_phi
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
    if !north {
        y += FALSE_NORTHING_SOUTH;
    }
    (x, y)
}

/// Inverse of [`utm_forward`].
pub fn utm_inverse(x: f64, y: f64, zone: u8, north: bool) -> LonLat {
    let e2 = e2();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);

    let x = x - FALSE_EASTING;
    let y = if north { y } else { y - FALSE_NORTHING_SOUTH };

    let m = y / K0;
    let mu = m / (A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let sq = (1.0 - e2).sqrt();
    let e1 = (1.0 - sq) / (1.0 + sq);

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin1 = phi1.sin();
    let cos1 = phi1.cos();
    let tan1 = phi1.tan();
    let n1 = A / (1.0 - e2 * sin1 * sin1).sqrt();
    let t1 = tan1 * tan1;
    let c1 = ep2 * cos1 * cos1;
    let r1 = A * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
    let d = x / (n1 * K0);

    let phi = phi1
        - (n1 * tan1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lam = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5)
            / 120.0)
        / cos1;

    LonLat::new(central_meridian(zone) + lam.to_degrees(), phi.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_boundaries() {
        assert_eq!(utm_zone_for(-180.0), 1);
        assert_eq!(utm_zone_for(-177.1), 1);
        assert_eq!(utm_zone_for(10.032), 32);
        assert_eq!(utm_zone_for(179.99), 60);
        assert_eq!(utm_zone_for(180.0), 60);
    }

    #[test]
    fn central_meridian_maps_to_false_easting() {
        let (x, y) = utm_forward(LonLat::new(9.0, 0.0), 32, true);
        assert!((x - 500_000.0).abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn one_degree_of_latitude_is_about_110_km() {
        let (_, y) = utm_forward(LonLat::new(9.0, 1.0), 32, true);
        // Meridian arc to 1° is 110 574 m, scaled by k0.
        assert!((y - 110_574.0 * K0).abs() < 5.0, "got {y}");
    }

    #[test]
    fn roundtrip_within_tolerance() {
        // LCG for deterministic pseudo-random points.
        let mut state: u64 = 42;
        for _ in 0..500 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let lat = (state as f64 / u64::MAX as f64) * 160.0 - 80.0;
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let lon = (state as f64 / u64::MAX as f64) * 360.0 - 180.0;

            let zone = utm_zone_for(lon);
            let north = lat >= 0.0;
            let (x, y) = utm_forward(LonLat::new(lon, lat), zone, north);
            let back = utm_inverse(x, y, zone, north);
            assert!((back.lon - lon).abs() < 1e-6, "lon {lon} → {}", back.lon);
            assert!((back.lat - lat).abs() < 1e-6, "lat {lat} → {}", back.lat);
        }
    }
}
