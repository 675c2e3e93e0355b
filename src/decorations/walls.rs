//! Wall outlines along the interior boundary.
//!
//! Two strokes per contour: a thick centered stroke whose inner half is cut
//! away by the exterior clip, and a thin fully opaque stroke that keeps the
//! outer edge crisp at low resolutions.

use crate::composite::{tint, Raster};
use crate::error::LayerError;
use crate::geometry::Polyline;
use crate::grid::Grid;
use crate::model::WallStyle;
use crate::paint::{max_coverage, stroke_coverage};

use super::{check_frame, intersect, union_into};

/// Coverage above this is treated as solid in the crisp stroke
const CRISP_THRESHOLD: f32 = 0.35;

/// Build the wall layer. `contours` are in raster pixel space.
pub fn build_walls(
    contours: &[Polyline],
    interior: &Grid<f32>,
    style: &WallStyle,
    ppu: f64,
) -> Result<Raster, LayerError> {
    check_frame("walls", interior)?;
    let (w, h) = (interior.width, interior.height);

    // Wall width straddles the boundary; only the outer half survives the clip
    let thick_px = (style.width * ppu * 2.0).max(1.0);
    let thin_px = (thick_px * 0.25).max(1.0);

    let mut thick = Grid::new_with(w, h, 0.0f32);
    let mut crisp = Grid::new_with(w, h, 0.0f32);
    for contour in contours {
        if let Some(cov) = stroke_coverage(&contour.points, contour.closed, thick_px, w, h) {
            max_coverage(&mut thick, &cov);
        }
        if let Some(mut cov) = stroke_coverage(&contour.points, contour.closed, thin_px, w, h) {
            for c in cov.grid.data_mut() {
                *c = if *c > CRISP_THRESHOLD { 1.0 } else { 0.0 };
            }
            max_coverage(&mut crisp, &cov);
        }
    }

    union_into(&mut thick, &crisp);
    let walls = intersect(&thick, &interior.inverted());
    Ok(tint(&walls, style.color, 1.0))
}
