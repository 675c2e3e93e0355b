//! Presenting a compiled world.
//!
//! Cached layers live in a fixed world frame; this module maps them into a
//! view through a `Camera` (`screen = (world + offset) * zoom`) and stacks them
//! over the paper: floor, water fill, water edge, hatch, shadow, grid, walls.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::composite::{BlendMode, Raster, Rgba};
use crate::geometry::{Point, Polyline};
use crate::model::{GridStyle, Style};
use crate::paint::stroke_coverage;
use crate::world_cache::WorldCacheEntry;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub offset: Point,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset: Point::ZERO,
            zoom: 1.0,
        }
    }
}

impl Camera {
    pub fn new(offset: Point, zoom: f64) -> Self {
        Self { offset, zoom }
    }

    /// Camera that reproduces the cache raster one-to-one
    pub fn native(entry: &WorldCacheEntry) -> Self {
        let b = entry.bounds();
        Self::new(Point::new(-b.min_x, -b.min_y), entry.ppu())
    }

    pub fn world_to_screen(&self, p: Point) -> Point {
        p.add(self.offset).scale(self.zoom)
    }

    pub fn screen_to_world(&self, p: Point) -> Point {
        let zoom = if self.zoom.abs() > 1e-12 { self.zoom } else { 1.0 };
        p.scale(1.0 / zoom).sub(self.offset)
    }
}

/// Coverage of grid lines at a world position, one screen pixel wide
fn grid_coverage(world: Point, grid: &GridStyle, zoom: f64) -> f32 {
    if !grid.enabled || !(grid.size > 0.0) {
        return 0.0;
    }
    let line = |v: f64| {
        let cells = v / grid.size;
        let dist_px = (cells - cells.round()).abs() * grid.size * zoom;
        (1.0 - dist_px).clamp(0.0, 1.0)
    };
    (line(world.x).max(line(world.y)) * grid.opacity) as f32
}

/// Render the world as seen through `camera` into a `width x height` view
pub fn render_view(
    entry: &WorldCacheEntry,
    style: &Style,
    camera: &Camera,
    width: usize,
    height: usize,
) -> Raster {
    let mut view = Raster::new(width, height);
    if width == 0 {
        return view;
    }
    let frame = entry.frame;
    let paper = Rgba::from_color(style.paper_color, 1.0);
    let layers_under_grid: Vec<&Raster> = [&entry.water_fill, &entry.water_edge, &entry.hatch, &entry.shadow]
        .into_iter()
        .filter_map(|l| l.as_deref())
        .collect();
    let walls = entry.walls.as_deref();

    view.data_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.iter_mut().enumerate() {
                let world = camera.screen_to_world(Point::new(x as f64 + 0.5, y as f64 + 0.5));
                let r = frame.to_px(world);
                let mut out = paper;

                let inside = r.x >= 0.0
                    && r.y >= 0.0
                    && r.x <= frame.width as f64
                    && r.y <= frame.height as f64;
                if inside {
                    // Cached rasters address pixel centers at integer positions
                    let (sx, sy) = ((r.x - 0.5) as f32, (r.y - 0.5) as f32);
                    let floor = entry.interior.sample_bilinear(sx, sy);
                    out = BlendMode::SourceOver.combine(out, Rgba::from_color(style.floor_color, floor));

                    for layer in &layers_under_grid {
                        out = BlendMode::SourceOver.combine(out, layer.sample_bilinear(sx, sy));
                    }

                    let g = grid_coverage(world, &style.grid, camera.zoom) * floor;
                    if g > 0.0 {
                        out = BlendMode::SourceOver.combine(out, Rgba::from_color(style.grid.color, g));
                    }

                    if let Some(walls) = walls {
                        out = BlendMode::SourceOver.combine(out, walls.sample_bilinear(sx, sy));
                    }
                }
                *px = out;
            }
        });
    view
}

/// Composite every layer at the cache's native resolution
pub fn render_export(entry: &WorldCacheEntry, style: &Style) -> Raster {
    let (w, h) = entry.dimensions();
    render_view(entry, style, &Camera::native(entry), w, h)
}

/// Draw world-space contours over a view
pub fn stroke_contours(
    target: &mut Raster,
    contours: &[Polyline],
    camera: &Camera,
    color: Color,
    line_width: f64,
) {
    for contour in contours {
        let screen: Vec<Point> = contour.points.iter().map(|&p| camera.world_to_screen(p)).collect();
        let Some(cov) = stroke_coverage(&screen, contour.closed, line_width, target.width, target.height)
        else {
            continue;
        };
        for (x, y, &c) in cov.grid.iter() {
            if c <= 0.0 {
                continue;
            }
            let cell = target.get_mut(cov.x0 + x, cov.y0 + y);
            *cell = BlendMode::SourceOver.combine(*cell, Rgba::from_color(color, c));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{rect_polygon, Dungeon, Mode};
    use crate::world_cache::{CompileConfig, WorldCache};

    fn compiled() -> (Dungeon, WorldCache) {
        let mut d = Dungeon::new();
        d.add_space(rect_polygon(0.0, 0.0, 60.0, 40.0), Mode::Add);
        let mut cache = WorldCache::new(CompileConfig {
            desired_ppu: 1.0,
            ..CompileConfig::default()
        });
        cache.compile(&d).unwrap();
        (d, cache)
    }

    #[test]
    fn test_camera_round_trip() {
        let cam = Camera::new(Point::new(12.0, -4.0), 2.5);
        let p = Point::new(3.0, 9.0);
        let s = cam.world_to_screen(p);
        assert_eq!(s, Point::new(37.5, 12.5));
        let back = cam.screen_to_world(s);
        assert!((back.x - p.x).abs() < 1e-12 && (back.y - p.y).abs() < 1e-12);
    }

    #[test]
    fn test_export_matches_cache_size_and_floor() {
        let (d, cache) = compiled();
        let entry = cache.entry().unwrap();
        let img = render_export(entry, &d.style);
        assert_eq!((img.width, img.height), entry.dimensions());

        // Room center is plain floor
        let center = Camera::native(entry).world_to_screen(Point::new(30.0, 20.0));
        let px = img.get(center.x as usize, center.y as usize).to_color();
        let floor = d.style.floor_color;
        assert!((px.r - floor.r).abs() < 0.02);
        assert!((px.g - floor.g).abs() < 0.02);

        // Corner of the padded frame is paper
        let corner = img.get(0, 0).to_color();
        assert!((corner.r - d.style.paper_color.r).abs() < 0.02);
    }

    #[test]
    fn test_view_outside_world_is_paper() {
        let (d, cache) = compiled();
        let entry = cache.entry().unwrap();
        let cam = Camera::new(Point::new(-10_000.0, -10_000.0), 1.0);
        let view = render_view(entry, &d.style, &cam, 8, 8);
        let paper = Rgba::from_color(d.style.paper_color, 1.0);
        assert!(view.data().iter().all(|p| *p == paper));
    }

    #[test]
    fn test_stroke_contours_marks_outline() {
        let (_, cache) = compiled();
        let entry = cache.entry().unwrap();
        let (w, h) = entry.dimensions();
        let mut target = Raster::new(w, h);
        stroke_contours(&mut target, entry.contours_world(), &Camera::native(entry), Color::CYAN, 2.0);
        assert!(target.data().iter().any(|p| p.a > 0.5));
    }
}
