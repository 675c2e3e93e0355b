//! Drop shadow cast by the walls onto the floor.
//!
//! The exterior is swept along the shadow offset one pixel step at a time and
//! the union of every swept copy is intersected with the interior. Sweeping
//! (instead of a single shifted copy) keeps the band attached to the wall and
//! gives mitered inner corners.

use crate::composite::{tint, Raster};
use crate::error::LayerError;
use crate::geometry::Point;
use crate::grid::Grid;
use crate::model::ShadowStyle;

use super::{check_frame, intersect, union_into};

/// Minimum world-space length worth drawing
const MIN_SHADOW_LENGTH: f64 = 0.1;

pub fn shadow_enabled(style: &ShadowStyle) -> bool {
    style.enabled && style.opacity > 0.0 && style.length > MIN_SHADOW_LENGTH
}

/// Integer pixel offset of the shadow tip
pub fn shadow_offset(style: &ShadowStyle, ppu: f64) -> (i64, i64) {
    let dir = style
        .direction
        .normalized()
        .unwrap_or(Point::new(1.0, 1.0).scale(std::f64::consts::FRAC_1_SQRT_2));
    let reach = style.length * ppu;
    ((dir.x * reach).round() as i64, (dir.y * reach).round() as i64)
}

/// Union of the exterior swept from offset 0 to `(dx, dy)`.
/// Pixels swept in from beyond the raster count as exterior.
fn swept_exterior(exterior: &Grid<f32>, dx: i64, dy: i64) -> Grid<f32> {
    let steps = dx.abs().max(dy.abs());
    let mut union = exterior.clone();
    for k in 1..=steps {
        let sx = (dx as f64 * k as f64 / steps as f64).round() as i64;
        let sy = (dy as f64 * k as f64 / steps as f64).round() as i64;
        union_into(&mut union, &exterior.shifted(sx, sy, 1.0));
    }
    union
}

/// Build the shadow layer, or `None` when shadows are disabled
pub fn build_shadow(
    interior: &Grid<f32>,
    style: &ShadowStyle,
    ppu: f64,
) -> Result<Option<Raster>, LayerError> {
    if !shadow_enabled(style) {
        return Ok(None);
    }
    check_frame("shadow", interior)?;

    let (dx, dy) = shadow_offset(style, ppu);
    if dx == 0 && dy == 0 {
        return Ok(Some(Raster::new(interior.width, interior.height)));
    }

    let band = intersect(&swept_exterior(&interior.inverted(), dx, dy), interior);

    // Soften the far edge, but never let the blur pull the band off the wall
    let mut soft = band.box_blur(1);
    union_into(&mut soft, &band);
    let soft = intersect(&soft, interior);

    Ok(Some(tint(&soft, style.color, style.opacity as f32)))
}
