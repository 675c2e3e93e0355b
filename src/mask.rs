//! Occupancy masks from ordered add/subtract primitives.
//!
//! All primitives of a mask are merged into one edit stream ordered by `seq`,
//! so a subtracting room drawn after a corridor erases it no matter which
//! collection either one lives in.

use serde::{Deserialize, Serialize};

use crate::composite::BlendMode;
use crate::geometry::{Bounds, Point};
use crate::grid::Grid;
use crate::model::{Mode, PathPrimitive, Primitive};
use crate::paint::{fill_polygon, stroke_polyline};
use crate::path_geometry::{render_geometry, GeometryKind, RenderOptions, ShapeSettings};

/// Fixed world-space frame of a raster: world `bounds.min` maps to pixel `(0, 0)`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RasterFrame {
    pub bounds: Bounds,
    pub ppu: f64,
    pub width: usize,
    pub height: usize,
}

impl RasterFrame {
    pub fn new(bounds: Bounds, ppu: f64, width: usize, height: usize) -> Self {
        Self {
            bounds,
            ppu,
            width,
            height,
        }
    }

    pub fn to_px(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.bounds.min_x) * self.ppu,
            (p.y - self.bounds.min_y) * self.ppu,
        )
    }

    pub fn to_world(&self, p: Point) -> Point {
        Point::new(
            p.x / self.ppu + self.bounds.min_x,
            p.y / self.ppu + self.bounds.min_y,
        )
    }

    pub fn empty_mask(&self) -> Grid<f32> {
        Grid::new_with(self.width, self.height, 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Mode {
    pub fn blend_mode(self) -> BlendMode {
        match self {
            Mode::Add => BlendMode::SourceOver,
            Mode::Subtract => BlendMode::DestinationOut,
        }
    }
}

/// Order primitives for painting.
///
/// Degenerate primitives are dropped. Primitives without a `seq` sort after
/// every sequenced one, keeping their position in `primitives`; ties break on
/// that position too.
pub fn edit_stream<'a>(primitives: &[Primitive<'a>]) -> Vec<Primitive<'a>> {
    let max_seq = primitives.iter().filter_map(|p| p.seq()).max().unwrap_or(0);

    let mut keyed: Vec<(u64, usize, Primitive<'a>)> = primitives
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_degenerate())
        .map(|(idx, p)| {
            let fallback = max_seq.saturating_add(1).saturating_add(idx as u64);
            (p.seq().unwrap_or(fallback), idx, *p)
        })
        .collect();

    keyed.sort_by_key(|&(seq, idx, _)| (seq, idx));
    keyed.into_iter().map(|(_, _, p)| p).collect()
}

/// Paint a corridor into `mask`, using the path engine in world space
fn paint_path(
    mask: &mut Grid<f32>,
    path: &PathPrimitive,
    frame: &RasterFrame,
    default_width: f64,
    preview: bool,
) {
    let width = path.effective_width(default_width);
    let settings = ShapeSettings::normalize(&path.shape);
    let options = RenderOptions {
        width,
        seed: path.seed,
        preview,
        point_budget: None,
    };
    let geometry = render_geometry(&path.points, &settings, &options);
    let px: Vec<Point> = geometry.points.iter().map(|&p| frame.to_px(p)).collect();
    let blend = path.mode.blend_mode();

    match geometry.kind {
        GeometryKind::Stroke => stroke_polyline(mask, &px, false, width * frame.ppu, blend),
        GeometryKind::Polygon => fill_polygon(mask, &px, blend),
    }
}

/// Rasterize primitives into an occupancy mask covering `frame`
pub fn rasterize(
    primitives: &[Primitive<'_>],
    frame: &RasterFrame,
    default_width: f64,
    preview: bool,
) -> Grid<f32> {
    let mut mask = frame.empty_mask();
    if frame.is_empty() {
        return mask;
    }

    for primitive in edit_stream(primitives) {
        match primitive {
            Primitive::Space(region) | Primitive::Shape(region) => {
                let px: Vec<Point> = region.polygon.iter().map(|&p| frame.to_px(p)).collect();
                fill_polygon(&mut mask, &px, region.mode.blend_mode());
            }
            Primitive::Path(path) | Primitive::WaterPath(path) => {
                paint_path(&mut mask, path, frame, default_width, preview);
            }
        }
    }
    mask
}
