//! Boundary extraction from alpha masks using marching squares.
//!
//! The mask is sampled on a node lattice every `step` pixels and surrounded by
//! an implicit ring of empty nodes, so shapes touching the raster border still
//! produce closed outlines. Segments are oriented consistently (each cell's
//! segment leaves through the edge the next cell enters), which lets a single
//! scan chain them with two endpoint maps.
//!
//! Saddle cells (codes 5 and 10) always split along the same diagonal. This is
//! an approximation at checkerboard patterns; no center sample is taken.

use std::collections::{HashMap, VecDeque};

use crate::geometry::{Point, Polyline};
use crate::grid::Grid;

/// Edge midpoints in normalized cell coordinates (y grows downward)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

impl Edge {
    fn offset(self) -> (f64, f64) {
        match self {
            Edge::Top => (0.5, 0.0),
            Edge::Right => (1.0, 0.5),
            Edge::Bottom => (0.5, 1.0),
            Edge::Left => (0.0, 0.5),
        }
    }
}

/// Oriented boundary segments for each corner code (TL=8, TR=4, BR=2, BL=1)
fn cell_segments(code: u8) -> &'static [(Edge, Edge)] {
    use Edge::*;
    match code {
        1 => &[(Left, Bottom)],
        2 => &[(Bottom, Right)],
        3 => &[(Left, Right)],
        4 => &[(Right, Top)],
        5 => &[(Left, Bottom), (Right, Top)],
        6 => &[(Bottom, Top)],
        7 => &[(Left, Top)],
        8 => &[(Top, Left)],
        9 => &[(Top, Bottom)],
        10 => &[(Top, Left), (Bottom, Right)],
        11 => &[(Top, Right)],
        12 => &[(Right, Left)],
        13 => &[(Right, Bottom)],
        14 => &[(Bottom, Left)],
        _ => &[],
    }
}

/// Binary node lattice sampled from a mask
struct SampleGrid {
    nx: i64,
    ny: i64,
    inside: Vec<bool>,
}

impl SampleGrid {
    fn new(mask: &Grid<f32>, step: usize, threshold: f32) -> Self {
        let nx = mask.width.div_ceil(step);
        let ny = mask.height.div_ceil(step);
        let mut inside = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                inside.push(*mask.get(i * step, j * step) > threshold);
            }
        }
        Self {
            nx: nx as i64,
            ny: ny as i64,
            inside,
        }
    }

    /// Nodes outside the lattice read as empty
    fn at(&self, i: i64, j: i64) -> bool {
        if i < 0 || j < 0 || i >= self.nx || j >= self.ny {
            return false;
        }
        self.inside[(j * self.nx + i) as usize]
    }

    fn code(&self, i: i64, j: i64) -> u8 {
        (self.at(i, j) as u8) << 3
            | (self.at(i + 1, j) as u8) << 2
            | (self.at(i + 1, j + 1) as u8) << 1
            | self.at(i, j + 1) as u8
    }
}

/// Half-pixel quantized endpoint key
type Key = (i64, i64);

fn key_of(p: Point) -> Key {
    ((p.x * 2.0).round() as i64, (p.y * 2.0).round() as i64)
}

#[derive(Debug)]
struct Chain {
    points: VecDeque<Point>,
    closed: bool,
}

/// Links oriented segments into chains as they arrive
#[derive(Debug, Default)]
struct ChainBuilder {
    chains: Vec<Option<Chain>>,
    by_start: HashMap<Key, usize>,
    by_end: HashMap<Key, usize>,
}

impl ChainBuilder {
    fn add_segment(&mut self, a: Point, b: Point) {
        let (ka, kb) = (key_of(a), key_of(b));
        if ka == kb {
            return;
        }
        let before = self.by_end.remove(&ka);
        let after = self.by_start.remove(&kb);

        match (before, after) {
            (Some(ci), Some(cj)) if ci == cj => {
                if let Some(chain) = self.chains[ci].as_mut() {
                    chain.closed = true;
                }
            }
            (Some(ci), Some(cj)) => {
                // Splice chain cj onto the end of chain ci
                let Some(tail) = self.chains[cj].take() else {
                    return;
                };
                if let Some(end) = tail.points.back().copied() {
                    self.by_end.insert(key_of(end), ci);
                }
                if let Some(head) = self.chains[ci].as_mut() {
                    head.points.extend(tail.points);
                }
            }
            (Some(ci), None) => {
                if let Some(chain) = self.chains[ci].as_mut() {
                    chain.points.push_back(b);
                }
                self.by_end.insert(kb, ci);
            }
            (None, Some(cj)) => {
                if let Some(chain) = self.chains[cj].as_mut() {
                    chain.points.push_front(a);
                }
                self.by_start.insert(ka, cj);
            }
            (None, None) => {
                let id = self.chains.len();
                self.chains.push(Some(Chain {
                    points: VecDeque::from([a, b]),
                    closed: false,
                }));
                self.by_start.insert(ka, id);
                self.by_end.insert(kb, id);
            }
        }
    }

    fn finish(self) -> Vec<Polyline> {
        self.chains
            .into_iter()
            .flatten()
            .filter(|c| c.points.len() >= 2)
            .map(|c| Polyline::new(c.points.into_iter().collect(), c.closed))
            .collect()
    }
}

/// Extract mask boundaries as polylines in raster pixel space.
///
/// Nodes sample the pixel at `(i * step, j * step)`; output coordinates refer
/// to pixel centers, so a node sits at `(i * step + 0.5, j * step + 0.5)`.
pub fn contours_from_alpha(mask: &Grid<f32>, step: usize, threshold: f32) -> Vec<Polyline> {
    let step = step.max(1);
    if mask.width == 0 || mask.height == 0 {
        return Vec::new();
    }

    let samples = SampleGrid::new(mask, step, threshold);
    let s = step as f64;
    let mut builder = ChainBuilder::default();

    for j in -1..samples.ny {
        for i in -1..samples.nx {
            let code = samples.code(i, j);
            for &(from, to) in cell_segments(code) {
                let point = |edge: Edge| {
                    let (u, v) = edge.offset();
                    Point::new((i as f64 + u) * s + 0.5, (j as f64 + v) * s + 0.5)
                };
                builder.add_segment(point(from), point(to));
            }
        }
    }

    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_rect(w: usize, h: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> Grid<f32> {
        let mut g = Grid::new_with(w, h, 0.0f32);
        for y in y0..y1 {
            for x in x0..x1 {
                g.set(x, y, 1.0);
            }
        }
        g
    }

    #[test]
    fn test_empty_mask_has_no_contours() {
        let g = Grid::new_with(10, 10, 0.0f32);
        assert!(contours_from_alpha(&g, 1, 0.5).is_empty());
    }

    #[test]
    fn test_rectangle_single_closed_contour() {
        let g = filled_rect(40, 30, 10, 8, 30, 20);
        let contours = contours_from_alpha(&g, 2, 0.5);
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert!(c.closed);

        let b = c.bounds().unwrap();
        assert!((b.min_x - 10.0).abs() <= 2.0);
        assert!((b.max_x - 30.0).abs() <= 2.0);
        assert!((b.min_y - 8.0).abs() <= 2.0);
        assert!((b.max_y - 20.0).abs() <= 2.0);
    }

    #[test]
    fn test_border_touching_mask_still_closes() {
        let g = Grid::new_with(6, 6, 1.0f32);
        let contours = contours_from_alpha(&g, 1, 0.5);
        assert_eq!(contours.len(), 1);
        assert!(contours[0].closed);
        let b = contours[0].bounds().unwrap();
        assert_eq!((b.min_x, b.max_x), (0.0, 6.0));
    }

    #[test]
    fn test_two_islands_two_contours() {
        let mut g = filled_rect(30, 10, 2, 2, 8, 8);
        for y in 2..8 {
            for x in 20..26 {
                g.set(x, y, 1.0);
            }
        }
        let contours = contours_from_alpha(&g, 1, 0.5);
        assert_eq!(contours.len(), 2);
        assert!(contours.iter().all(|c| c.closed));
    }

    #[test]
    fn test_hole_gives_inner_contour() {
        let mut g = filled_rect(20, 20, 2, 2, 18, 18);
        for y in 7..13 {
            for x in 7..13 {
                g.set(x, y, 0.0);
            }
        }
        let contours = contours_from_alpha(&g, 1, 0.5);
        assert_eq!(contours.len(), 2);
    }

    #[test]
    fn test_saddle_uses_fixed_diagonal() {
        assert_eq!(cell_segments(5).len(), 2);
        assert_eq!(cell_segments(10).len(), 2);
        assert!(cell_segments(0).is_empty());
        assert!(cell_segments(15).is_empty());
    }
}
