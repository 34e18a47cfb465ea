//! Pixel-footprint → polygon by directed boundary tracing.
//!
//! Every pixel edge between the component and the outside becomes a directed
//! lattice edge with the component on its right (screen coordinates, row
//! axis pointing down), so exterior rings run clockwise on screen and holes
//! counter-clockwise. At a vertex where two component pixels touch only at
//! a corner the trace turns right, keeping diagonal neighbours apart as
//! 4-connectivity requires. Collinear vertices are dropped; the polygon
//! covers exactly the component's pixels.

use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};
use crate::geo::{LonLat, Polygon};
use crate::raster::GridSpec;

/// Lattice vertex `(col, row)`.
pub type Vertex = (i64, i64);

/// Rings of one component in lattice coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatticeRings {
    pub exterior: Vec<Vertex>,
    pub holes: Vec<Vec<Vertex>>,
}

impl LatticeRings {
    /// Geographic polygon: exterior counter-clockwise, holes clockwise.
    pub fn to_polygon(&self, grid: &GridSpec) -> Polygon {
        let map = |ring: &[Vertex]| -> Vec<LonLat> {
            ring.iter()
                .map(|&(c, r)| {
                    let (x, y) = grid.transform.corner(r as f64, c as f64);
                    grid.crs.to_lonlat(x, y)
                })
                .collect()
        };
        Polygon::new(map(&self.exterior), self.holes.iter().map(|h| map(h)).collect())
    }

    /// Area-weighted centroid, computed on the lattice and mapped through
    /// the grid's affine transform (centroids commute with affine maps).
    pub fn centroid(&self, grid: &GridSpec) -> Option<LonLat> {
        let as_points = |ring: &[Vertex]| ring.iter().map(|&(c, r)| LonLat::new(c as f64, r as f64)).collect();
        let lattice = Polygon::new(as_points(&self.exterior), self.holes.iter().map(|h| as_points(h)).collect());
        let c = lattice.centroid()?;
        let (x, y) = grid.transform.corner(c.lat, c.lon);
        Some(grid.crs.to_lonlat(x, y))
    }
}

/// Trace the boundary of the pixels in `pixels` (row-major indices into a
/// grid `w` wide).
pub fn trace_rings(pixels: &[usize], w: usize) -> Result<LatticeRings> {
    let inside: std::collections::BTreeSet<(i64, i64)> =
        pixels.iter().map(|&i| ((i % w) as i64, (i / w) as i64)).collect();
    let has = |c: i64, r: i64| inside.contains(&(c, r));

    let mut edges: Vec<(Vertex, Vertex)> = Vec::new();
    for &(c, r) in &inside {
        if !has(c, r - 1) {
            edges.push(((c, r), (c + 1, r)));
        }
        if !has(c + 1, r) {
            edges.push(((c + 1, r), (c + 1, r + 1)));
        }
        if !has(c, r + 1) {
            edges.push(((c + 1, r + 1), (c, r + 1)));
        }
        if !has(c - 1, r) {
            edges.push(((c, r + 1), (c, r)));
        }
    }

    let mut outgoing: BTreeMap<Vertex, Vec<usize>> = BTreeMap::new();
    for (i, &(from, _)) in edges.iter().enumerate() {
        outgoing.entry(from).or_default().push(i);
    }

    let dir = |e: usize| {
        let ((x0, y0), (x1, y1)) = edges[e];
        (x1 - x0, y1 - y0)
    };
    let next = |e: usize| -> Option<usize> {
        let (dx, dy) = dir(e);
        let candidates = outgoing.get(&edges[e].1)?;
        [(-dy, dx), (dx, dy), (dy, -dx)]
            .iter()
            .find_map(|&want| candidates.iter().copied().find(|&c| dir(c) == want))
    };

    let mut used = vec![false; edges.len()];
    let mut rings: Vec<Vec<Vertex>> = Vec::new();
    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let mut ring = Vec::new();
        let mut e = start;
        loop {
            used[e] = true;
            ring.push(edges[e].0);
            e = next(e).ok_or_else(|| PipelineError::Computation("open pixel boundary".into()))?;
            if e == start {
                break;
            }
            if used[e] {
                return Err(PipelineError::Computation("pixel boundary trace revisited an edge".into()));
            }
        }
        rings.push(drop_collinear(ring));
    }

    let mut exterior: Option<Vec<Vertex>> = None;
    let mut holes = Vec::new();
    for ring in rings {
        if twice_area(&ring) > 0 {
            if exterior.is_some() {
                return Err(PipelineError::Computation("component traced to several exterior rings".into()));
            }
            exterior = Some(ring);
        } else {
            holes.push(ring);
        }
    }
    let exterior = exterior.ok_or_else(|| PipelineError::Computation("component has no exterior ring".into()))?;
    Ok(LatticeRings { exterior, holes })
}

/// Twice the signed shoelace area in screen coordinates; positive for
/// clockwise-on-screen rings.
fn twice_area(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (x0, y0) = ring[i];
            let (x1, y1) = ring[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum()
}

fn drop_collinear(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len();
    if n < 4 {
        return ring;
    }
    (0..n)
        .filter(|&i| {
            let (px, py) = ring[(i + n - 1) % n];
            let (x, y) = ring[i];
            let (nx, ny) = ring[(i + 1) % n];
            (x - px) * (ny - y) - (y - py) * (nx - x) != 0
        })
        .map(|i| ring[i])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Bounds;

    fn pixels(rows: &[&str]) -> (Vec<usize>, usize) {
        let w = rows[0].len();
        let px = rows
            .iter()
            .flat_map(|r| r.chars())
            .enumerate()
            .filter(|(_, ch)| *ch == '#')
            .map(|(i, _)| i)
            .collect();
        (px, w)
    }

    #[test]
    fn single_pixel_is_a_square() {
        let rings = trace_rings(&[0], 1).unwrap();
        assert_eq!(rings.exterior, vec![(0, 0), (1, 0), (1, 1), (0, 1)]);
        assert!(rings.holes.is_empty());
    }

    #[test]
    fn rectangle_keeps_only_corners() {
        let (px, w) = pixels(&["###", "###"]);
        let rings = trace_rings(&px, w).unwrap();
        assert_eq!(rings.exterior, vec![(0, 0), (3, 0), (3, 2), (0, 2)]);
    }

    #[test]
    fn ring_of_pixels_has_a_hole() {
        let (px, w) = pixels(&["###", "#.#", "###"]);
        let rings = trace_rings(&px, w).unwrap();
        assert_eq!(twice_area(&rings.exterior), 18);
        assert_eq!(rings.holes.len(), 1);
        assert_eq!(twice_area(&rings.holes[0]), -2);
    }

    #[test]
    fn l_shape_area_is_preserved() {
        let (px, w) = pixels(&["#..", "#..", "###"]);
        let rings = trace_rings(&px, w).unwrap();
        assert_eq!(rings.exterior.len(), 6);
        assert_eq!(twice_area(&rings.exterior), 10);
    }

    #[test]
    fn hole_touching_outside_at_a_corner_opens_up() {
        // Hole at (1,1) meets the empty corner (2,2) diagonally.
        let (px, w) = pixels(&["###", "#.#", "##."]);
        let rings = trace_rings(&px, w).unwrap();
        assert!(rings.holes.is_empty());
        assert_eq!(twice_area(&rings.exterior), 14);
    }

    #[test]
    fn geographic_exterior_is_counter_clockwise() {
        let grid = GridSpec::from_bounds(Bounds::new(10.0, 0.0, 10.003, 0.002), 3, 2);
        let (px, w) = pixels(&["##.", "##."]);
        let rings = trace_rings(&px, w).unwrap();
        let poly = rings.to_polygon(&grid);
        assert!(crate::geo::signed_ring_area(&poly.exterior) > 0.0);
        let c = rings.centroid(&grid).unwrap();
        assert!((c.lon - 10.001).abs() < 1e-12 && (c.lat - 0.001).abs() < 1e-12);
    }
}
