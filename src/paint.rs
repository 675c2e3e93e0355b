//! Anti-aliased coverage rasterization in raster pixel space.
//!
//! Shapes are first turned into a windowed coverage buffer, then combined into
//! a target mask with a `BlendMode`. Pixel `(x, y)` covers `[x, x+1) x [y, y+1)`.

use crate::composite::BlendMode;
use crate::geometry::{distance_to_segment, Point};
use crate::grid::Grid;

/// Vertical sub-scanlines per pixel row for polygon fills
const SUBSCANLINES: usize = 4;

/// Coverage of one shape, restricted to the window it touches
#[derive(Clone, Debug)]
pub struct Coverage {
    pub x0: usize,
    pub y0: usize,
    pub grid: Grid<f32>,
}

/// Pixel window `[x0, x1) x [y0, y1)` of a padded point set clipped to the raster
fn window(points: &[Point], pad: f64, width: usize, height: usize) -> Option<(usize, usize, usize, usize)> {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for p in points.iter().filter(|p| p.is_finite()) {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    if !min_x.is_finite() {
        return None;
    }

    let x0 = (min_x - pad).floor().max(0.0) as usize;
    let y0 = (min_y - pad).floor().max(0.0) as usize;
    let x1 = ((max_x + pad).ceil().max(0.0) as usize).min(width);
    let y1 = ((max_y + pad).ceil().max(0.0) as usize).min(height);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0, y0, x1, y1))
}

// =============================================================================
// POLYGON FILL
// =============================================================================

/// Coverage of a closed polygon under the nonzero winding rule
pub fn polygon_coverage(polygon: &[Point], width: usize, height: usize) -> Option<Coverage> {
    let ring: Vec<Point> = polygon.iter().copied().filter(|p| p.is_finite()).collect();
    if ring.len() < 3 {
        return None;
    }
    let (x0, y0, x1, y1) = window(&ring, 0.0, width, height)?;
    let mut grid = Grid::new_with(x1 - x0, y1 - y0, 0.0f32);
    let weight = 1.0 / SUBSCANLINES as f32;
    let mut crossings: Vec<(f64, i32)> = Vec::with_capacity(16);
    let mut acc = vec![0.0f32; x1 - x0];

    for y in y0..y1 {
        acc.fill(0.0);
        for k in 0..SUBSCANLINES {
            let sy = y as f64 + (k as f64 + 0.5) / SUBSCANLINES as f64;
            crossings.clear();

            for i in 0..ring.len() {
                let a = ring[i];
                let b = ring[(i + 1) % ring.len()];
                if (a.y <= sy) == (b.y <= sy) {
                    continue;
                }
                let x = a.x + (sy - a.y) * (b.x - a.x) / (b.y - a.y);
                let dir = if b.y > a.y { 1 } else { -1 };
                crossings.push((x, dir));
            }
            crossings.sort_by(|l, r| l.0.total_cmp(&r.0));

            let mut winding = 0;
            let mut span_start = 0.0;
            for &(x, dir) in &crossings {
                let was_inside = winding != 0;
                winding += dir;
                let is_inside = winding != 0;
                if !was_inside && is_inside {
                    span_start = x;
                } else if was_inside && !is_inside {
                    accumulate_span(&mut acc, x0, span_start, x, weight);
                }
            }
        }

        for (i, &v) in acc.iter().enumerate() {
            grid.set(i, y - y0, v.min(1.0));
        }
    }

    Some(Coverage { x0, y0, grid })
}

/// Add horizontal span `[xa, xb)` into a row accumulator whose first cell is pixel `x0`
fn accumulate_span(acc: &mut [f32], x0: usize, xa: f64, xb: f64, weight: f32) {
    let x_end = (x0 + acc.len()) as f64;
    let xa = xa.max(x0 as f64);
    let xb = xb.min(x_end);
    if xb <= xa {
        return;
    }

    let ia = xa.floor() as usize;
    let ib = xb.floor() as usize;
    if ia == ib {
        acc[ia - x0] += (xb - xa) as f32 * weight;
        return;
    }

    acc[ia - x0] += ((ia + 1) as f64 - xa) as f32 * weight;
    for cell in &mut acc[(ia + 1 - x0)..(ib - x0)] {
        *cell += weight;
    }
    if ib < x0 + acc.len() {
        acc[ib - x0] += (xb - ib as f64) as f32 * weight;
    }
}

// =============================================================================
// STROKES
// =============================================================================

/// Coverage of a polyline stroked with round caps and joins
pub fn stroke_coverage(
    points: &[Point],
    closed: bool,
    line_width: f64,
    width: usize,
    height: usize,
) -> Option<Coverage> {
    let pts: Vec<Point> = points.iter().copied().filter(|p| p.is_finite()).collect();
    if pts.is_empty() || !(line_width > 0.0) {
        return None;
    }
    let radius = line_width * 0.5;
    let (x0, y0, x1, y1) = window(&pts, radius + 1.0, width, height)?;
    let mut grid = Grid::new_with(x1 - x0, y1 - y0, 0.0f32);

    let mut segments: Vec<(Point, Point)> = pts.windows(2).map(|w| (w[0], w[1])).collect();
    if closed && pts.len() > 2 {
        segments.push((pts[pts.len() - 1], pts[0]));
    }
    if segments.is_empty() {
        segments.push((pts[0], pts[0]));
    }

    for (a, b) in segments {
        let Some((sx0, sy0, sx1, sy1)) = window(&[a, b], radius + 1.0, width, height) else {
            continue;
        };
        for y in sy0.max(y0)..sy1.min(y1) {
            for x in sx0.max(x0)..sx1.min(x1) {
                let center = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                let d = distance_to_segment(center, a, b);
                let c = (radius + 0.5 - d).clamp(0.0, 1.0) as f32;
                if c > 0.0 {
                    let cell = grid.get_mut(x - x0, y - y0);
                    if c > *cell {
                        *cell = c;
                    }
                }
            }
        }
    }

    Some(Coverage { x0, y0, grid })
}

// =============================================================================
// APPLYING COVERAGE
// =============================================================================

/// Combine a coverage window into a full-size mask
pub fn apply_coverage(mask: &mut Grid<f32>, coverage: &Coverage, mode: BlendMode) {
    for (x, y, &c) in coverage.grid.iter() {
        let (mx, my) = (coverage.x0 + x, coverage.y0 + y);
        if mx >= mask.width || my >= mask.height {
            continue;
        }
        let cell = mask.get_mut(mx, my);
        *cell = mode.combine_alpha(*cell, c);
    }
    // DestinationIn also clears everything outside the window
    if mode == BlendMode::DestinationIn {
        let (x1, y1) = (
            coverage.x0 + coverage.grid.width,
            coverage.y0 + coverage.grid.height,
        );
        for (x, y, cell) in mask.iter_mut() {
            if x < coverage.x0 || y < coverage.y0 || x >= x1 || y >= y1 {
                *cell = 0.0;
            }
        }
    }
}

/// Union by maximum (used when accumulating many strokes of one color)
pub fn max_coverage(mask: &mut Grid<f32>, coverage: &Coverage) {
    for (x, y, &c) in coverage.grid.iter() {
        let (mx, my) = (coverage.x0 + x, coverage.y0 + y);
        if mx >= mask.width || my >= mask.height {
            continue;
        }
        let cell = mask.get_mut(mx, my);
        if c > *cell {
            *cell = c;
        }
    }
}

pub fn fill_polygon(mask: &mut Grid<f32>, polygon: &[Point], mode: BlendMode) {
    if let Some(cov) = polygon_coverage(polygon, mask.width, mask.height) {
        apply_coverage(mask, &cov, mode);
    }
}

pub fn stroke_polyline(
    mask: &mut Grid<f32>,
    points: &[Point],
    closed: bool,
    line_width: f64,
    mode: BlendMode,
) {
    if let Some(cov) = stroke_coverage(points, closed, line_width, mask.width, mask.height) {
        apply_coverage(mask, &cov, mode);
    }
}

/// Soft round dot whose coverage falls off from 1 at the center to 0 at `radius`
pub fn radial_dot(center: Point, radius: f64, width: usize, height: usize) -> Option<Coverage> {
    if !center.is_finite() || !(radius > 0.0) {
        return None;
    }
    let (x0, y0, x1, y1) = window(&[center], radius + 1.0, width, height)?;
    let mut grid = Grid::new_with(x1 - x0, y1 - y0, 0.0f32);
    for (x, y, cell) in grid.iter_mut() {
        let p = Point::new((x0 + x) as f64 + 0.5, (y0 + y) as f64 + 0.5);
        let t = (1.0 - p.distance(center) / radius).clamp(0.0, 1.0);
        *cell = (t * t) as f32;
    }
    Some(Coverage { x0, y0, grid })
}
