//! 4-connected component labelling.
//!
//! Pixels sharing an edge belong to the same component; pixels touching only
//! at a corner do not.

/// Pixel indices (row-major) of one component, ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub pixels: Vec<usize>,
}

/// Label the `true` cells of a `w × h` mask. Components come out in order of
/// their first pixel in raster order.
pub fn connected_components(mask: &[bool], w: usize, h: usize) -> Vec<Component> {
    let mut seen = vec![false; mask.len()];
    let mut out = Vec::new();
    let mut stack = Vec::new();
    for start in 0..mask.len().min(w * h) {
        if !mask[start] || seen[start] {
            continue;
        }
        seen[start] = true;
        stack.push(start);
        let mut pixels = Vec::new();
        while let Some(i) = stack.pop() {
            pixels.push(i);
            let (r, c) = (i / w, i % w);
            let mut visit = |j: usize| {
                if mask[j] && !seen[j] {
                    seen[j] = true;
                    stack.push(j);
                }
            };
            if r > 0 {
                visit(i - w);
            }
            if r + 1 < h {
                visit(i + w);
            }
            if c > 0 {
                visit(i - 1);
            }
            if c + 1 < w {
                visit(i + 1);
            }
        }
        pixels.sort_unstable();
        out.push(Component { pixels });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(rows: &[&str]) -> (Vec<bool>, usize, usize) {
        let w = rows[0].len();
        let m = rows.iter().flat_map(|r| r.chars().map(|ch| ch == '#')).collect();
        (m, w, rows.len())
    }

    #[test]
    fn diagonal_neighbours_are_separate() {
        let (m, w, h) = mask(&["#.", ".#"]);
        let cc = connected_components(&m, w, h);
        assert_eq!(cc.len(), 2);
        assert_eq!(cc[0].pixels, vec![0]);
        assert_eq!(cc[1].pixels, vec![3]);
    }

    #[test]
    fn u_shape_is_one_component() {
        let (m, w, h) = mask(&["#.#", "#.#", "###"]);
        let cc = connected_components(&m, w, h);
        assert_eq!(cc.len(), 1);
        assert_eq!(cc[0].pixels.len(), 7);
    }

    #[test]
    fn empty_grid() {
        assert!(connected_components(&[], 0, 0).is_empty());
    }
}
