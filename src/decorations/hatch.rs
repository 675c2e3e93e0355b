//! Cross-hatching outside the walls.
//!
//! Every contour segment owns its own generator, seeded from the contour and
//! segment index, so editing one part of the map leaves the hatching of
//! unrelated segments untouched.

use rand::Rng;

use crate::composite::{tint, Raster};
use crate::error::LayerError;
use crate::geometry::{Point, Polyline};
use crate::grid::Grid;
use crate::model::HatchStyle;
use crate::paint::{max_coverage, stroke_coverage};
use crate::seeds::{derive_seed_indexed, rng_from_seed, SeededRng};

use super::{check_frame, draw_between, intersect};

const HATCH_SALT: u64 = 0x4A7C_11E5;
/// Strokes per segment are capped to keep dense maps bounded
const MAX_STROKES_PER_SEGMENT: usize = 64;
/// Points sampled along each curved stroke
const CURVE_SAMPLES: usize = 6;

/// Whether the style asks for any hatching at all
pub fn hatch_enabled(style: &HatchStyle) -> bool {
    style.enabled && style.density > 0.0 && style.opacity > 0.0 && style.depth > 0.0
}

fn quadratic(p0: Point, c: Point, p2: Point, t: f64) -> Point {
    let a = p0.lerp(c, t);
    let b = c.lerp(p2, t);
    a.lerp(b, t)
}

/// A short curved stroke centered on `center`, pointing along `dir`
fn curved_stroke(center: Point, dir: Point, length: f64, bend: f64) -> Vec<Point> {
    let half = dir.scale(length * 0.5);
    let p0 = center.sub(half);
    let p2 = center.add(half);
    let control = center.add(dir.perp().scale(bend));
    (0..CURVE_SAMPLES)
        .map(|i| quadratic(p0, control, p2, i as f64 / (CURVE_SAMPLES - 1) as f64))
        .collect()
}

/// Unit normal of segment `a -> b` pointing away from the interior
fn outward_normal(a: Point, b: Point, interior: &Grid<f32>) -> Option<Point> {
    let tangent = b.sub(a).normalized()?;
    let n = tangent.perp();
    let mid = a.lerp(b, 0.5);
    let probe = mid.add(n.scale(2.0));
    let inside = interior
        .try_get(probe.x.floor() as i64, probe.y.floor() as i64)
        .is_some_and(|&v| v > 0.5);
    Some(if inside { n.scale(-1.0) } else { n })
}

fn segment_strokes(
    rng: &mut SeededRng,
    a: Point,
    b: Point,
    normal: Point,
    style: &HatchStyle,
    ppu: f64,
) -> Vec<(Vec<Point>, f64)> {
    let seg_len = a.distance(b);
    let (min_len, max_len) = (
        style.min_length.min(style.max_length) * ppu,
        style.min_length.max(style.max_length) * ppu,
    );
    let spacing = ((min_len + max_len) * 0.25).max(1.0);

    let expected = style.density * seg_len / spacing;
    let mut count = expected.floor() as usize;
    if rng.gen::<f64>() < expected.fract() {
        count += 1;
    }
    count = count.min(MAX_STROKES_PER_SEGMENT);

    let Some(tangent) = b.sub(a).normalized() else {
        return Vec::new();
    };
    let angle_range = style.angle_range.to_radians();
    let line_width = (ppu * 0.9).clamp(1.0, 3.0);
    let mut strokes = Vec::with_capacity(count * 2);

    for _ in 0..count {
        let t = rng.gen::<f64>();
        let depth = draw_between(rng, -style.depth, style.depth);
        let base = a.lerp(b, t);
        let center = base.add(normal.scale((style.inset + depth) * ppu));
        let length = draw_between(rng, min_len, max_len).max(1.0);
        let angle = draw_between(rng, -angle_range, angle_range);
        let dir = tangent.rotate(angle);
        let bend = draw_between(rng, -0.25, 0.25) * length;
        strokes.push((curved_stroke(center, dir, length, bend), line_width));

        // Rotated companion for texture
        let twist = draw_between(rng, 0.3, 0.7);
        let companion_dir = dir.rotate(twist);
        strokes.push((
            curved_stroke(center, companion_dir, length * 0.7, -bend * 0.5),
            line_width * 0.8,
        ));
    }
    strokes
}

/// Build the hatch layer, or `None` when hatching is disabled.
/// `contours` are in raster pixel space.
pub fn build_hatch(
    contours: &[Polyline],
    interior: &Grid<f32>,
    style: &HatchStyle,
    ppu: f64,
) -> Result<Option<Raster>, LayerError> {
    if !hatch_enabled(style) {
        return Ok(None);
    }
    check_frame("hatch", interior)?;
    let (w, h) = (interior.width, interior.height);
    let mut coverage = Grid::new_with(w, h, 0.0f32);

    for (ci, contour) in contours.iter().enumerate() {
        for (si, (a, b)) in contour.segments().enumerate() {
            let Some(normal) = outward_normal(a, b, interior) else {
                continue;
            };
            let mut rng = rng_from_seed(derive_seed_indexed(&[ci as u64, si as u64, HATCH_SALT]));
            for (points, width) in segment_strokes(&mut rng, a, b, normal, style, ppu) {
                if let Some(cov) = stroke_coverage(&points, false, width, w, h) {
                    max_coverage(&mut coverage, &cov);
                }
            }
        }
    }

    let clipped = intersect(&coverage, &interior.inverted());
    Ok(Some(tint(&clipped, style.color, style.opacity as f32)))
}
