//! Planar geometry primitives shared by every stage of the pipeline
//!
//! World space uses real-valued coordinates; raster space is the same plane
//! scaled by `ppu` and translated by the padded bounds origin.

use serde::{Deserialize, Serialize};

// =============================================================================
// POINTS
// =============================================================================

/// A point (or vector) in world or raster space
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, s: f64) -> Point {
        Point::new(self.x * s, self.y * s)
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product
    pub fn cross(self, other: Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Point) -> f64 {
        self.sub(other).length()
    }

    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector
    pub fn normalized(self) -> Option<Point> {
        let len = self.length();
        if len > 1e-12 {
            Some(self.scale(1.0 / len))
        } else {
            None
        }
    }

    /// Left-hand perpendicular `(-y, x)`
    pub fn perp(self) -> Point {
        Point::new(-self.y, self.x)
    }

    pub fn rotate(self, angle: f64) -> Point {
        let (s, c) = angle.sin_cos();
        Point::new(self.x * c - self.y * s, self.x * s + self.y * c)
    }
}

// =============================================================================
// BOUNDS
// =============================================================================

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
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

    /// Bounding box of a point set, ignoring non-finite points
    pub fn from_points(points: &[Point]) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        for p in points.iter().filter(|p| p.is_finite()) {
            bounds = Some(match bounds {
                None => Bounds::new(p.x, p.y, p.x, p.y),
                Some(b) => b.include(*p),
            });
        }
        bounds
    }

    pub fn include(self, p: Point) -> Bounds {
        Bounds::new(
            self.min_x.min(p.x),
            self.min_y.min(p.y),
            self.max_x.max(p.x),
            self.max_y.max(p.y),
        )
    }

    pub fn union(self, other: Bounds) -> Bounds {
        Bounds::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Grow on all sides by `amount`
    pub fn pad(self, amount: f64) -> Bounds {
        Bounds::new(
            self.min_x - amount,
            self.min_y - amount,
            self.max_x + amount,
            self.max_y + amount,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

// =============================================================================
// POLYLINES
// =============================================================================

/// An open or closed polyline.
///
/// Closed polylines do not repeat their first vertex at the end.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub points: Vec<Point>,
    pub closed: bool,
}

impl Polyline {
    pub fn new(points: Vec<Point>, closed: bool) -> Self {
        Self { points, closed }
    }

    /// Total arc length, including the closing edge of a closed polyline
    pub fn length(&self) -> f64 {
        let mut len = polyline_length(&self.points);
        if self.closed && self.points.len() > 2 {
            if let (Some(first), Some(last)) = (self.points.first(), self.points.last()) {
                len += first.distance(*last);
            }
        }
        len
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.points)
    }

    /// Iterate over the edges, including the closing edge if closed
    pub fn segments(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        let count = if self.closed && n > 2 { n } else { n.saturating_sub(1) };
        (0..count).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    pub fn map(&self, f: impl Fn(Point) -> Point) -> Polyline {
        Polyline::new(self.points.iter().map(|&p| f(p)).collect(), self.closed)
    }
}

/// Arc length of an open point sequence
pub fn polyline_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Distance from `p` to the segment `a..b`
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let ab = b.sub(a);
    let len_sq = ab.dot(ab);
    if len_sq < 1e-12 {
        return p.distance(a);
    }
    let t = (p.sub(a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a.add(ab.scale(t)))
}

// =============================================================================
// SIMPLIFICATION (Douglas-Peucker)
// =============================================================================

/// Simplify an open polyline with Douglas-Peucker. Endpoints are always kept.
pub fn simplify_polyline(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut result = Vec::new();
    simplify_recursive(points, epsilon, &mut result);

    if let Some(last) = points.last() {
        result.push(*last);
    }

    result
}

/// Simplify a closed ring by splitting it at the vertex farthest from the first
/// vertex and simplifying both halves as open chains.
pub fn simplify_ring(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() < 4 {
        return points.to_vec();
    }

    let first = points[0];
    let mut split = 0;
    let mut best = 0.0;
    for (i, p) in points.iter().enumerate() {
        let d = p.distance(first);
        if d > best {
            best = d;
            split = i;
        }
    }
    if split == 0 {
        return vec![first];
    }

    let mut closed_chain = points.to_vec();
    closed_chain.push(first);

    let mut head = simplify_polyline(&closed_chain[..=split], epsilon);
    let tail = simplify_polyline(&closed_chain[split..], epsilon);

    head.pop();
    head.extend_from_slice(&tail[..tail.len() - 1]);
    head
}

fn simplify_recursive(points: &[Point], epsilon: f64, result: &mut Vec<Point>) {
    if points.len() < 2 {
        return;
    }

    let (max_dist, max_idx) = find_max_distance(points);

    if max_dist > epsilon {
        simplify_recursive(&points[..=max_idx], epsilon, result);
        simplify_recursive(&points[max_idx..], epsilon, result);
    } else {
        // Add first point only (last will be added by parent)
        result.push(points[0]);
    }
}

fn find_max_distance(points: &[Point]) -> (f64, usize) {
    if points.len() < 3 {
        return (0.0, 0);
    }

    let first = points[0];
    let last = points[points.len() - 1];

    let mut max_dist = 0.0;
    let mut max_idx = 0;

    for (i, p) in points.iter().enumerate().take(points.len() - 1).skip(1) {
        let dist = distance_to_segment(*p, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_idx = i;
        }
    }

    (max_dist, max_idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_from_points_skips_non_finite() {
        let pts = [
            Point::new(1.0, 2.0),
            Point::new(f64::NAN, 50.0),
            Point::new(-3.0, 4.0),
        ];
        let b = Bounds::from_points(&pts).unwrap();
        assert_eq!(b, Bounds::new(-3.0, 2.0, 1.0, 4.0));
    }

    #[test]
    fn test_simplify_polyline_keeps_endpoints() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.1),
            Point::new(2.0, 0.0),
            Point::new(3.0, 0.0),
        ];

        let simplified = simplify_polyline(&points, 0.2);
        assert_eq!(simplified.first(), points.first());
        assert_eq!(simplified.last(), points.last());
        assert_eq!(simplified.len(), 2);
    }

    #[test]
    fn test_simplify_ring_square() {
        let mut ring = Vec::new();
        for i in 0..10 {
            ring.push(Point::new(i as f64, 0.0));
        }
        for i in 0..10 {
            ring.push(Point::new(10.0, i as f64));
        }
        for i in 0..10 {
            ring.push(Point::new(10.0 - i as f64, 10.0));
        }
        for i in 0..10 {
            ring.push(Point::new(0.0, 10.0 - i as f64));
        }

        let simplified = simplify_ring(&ring, 0.1);
        assert_eq!(simplified.len(), 4);
    }

    #[test]
    fn test_closed_polyline_length() {
        let square = Polyline::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.0, 1.0),
            ],
            true,
        );
        assert!((square.length() - 4.0).abs() < 1e-12);
        assert_eq!(square.segments().count(), 4);
    }
}
