//! Water edge: shoreline outline plus the ripple mosaic.
//!
//! The mosaic is a Voronoi partition of the water computed at a bounded
//! working resolution, then upscaled. Every random draw comes from a stream
//! seeded by the mask itself (fill count and raster size), so the same water at
//! the same resolution always ripples the same way.

use rand::Rng;
use tracing::debug;

use crate::color::Color;
use crate::composite::{clip_to_mask, composite, tint, BlendMode, Raster, Rgba};
use crate::decorations::{check_frame, union_into};
use crate::error::LayerError;
use crate::geometry::Point;
use crate::grid::Grid;
use crate::model::WaterStyle;
use crate::paint::{max_coverage, radial_dot};
use crate::seeds::{mask_seed, rng_from_seed, SeededRng, WaterSeeds};

/// Rotated copies used to approximate the outline dilation
const OUTLINE_TAPS: usize = 16;
/// Longest side of the mosaic working raster
const MOSAIC_MAX_SIDE: usize = 256;
/// Placement attempts per lattice cell before giving up on it
const SEED_RETRIES: usize = 6;
const SEAM_DROPOUT: f64 = 0.25;
const MAX_SPARKLES: usize = 400;
const SPARKLE_RETRIES: usize = 8;

pub fn water_edge_enabled(style: &WaterStyle) -> bool {
    style.enabled && (style.outline_enabled || style.ripples_enabled)
}

// =============================================================================
// OUTLINE
// =============================================================================

/// Ring just outside the water: union of rotated offsets minus the water itself
pub fn outline_mask(water: &Grid<f32>, radius_px: f64) -> Grid<f32> {
    let radius = radius_px.max(1.0);
    let mut dilated = water.clone();
    for k in 0..OUTLINE_TAPS {
        let angle = std::f64::consts::TAU * k as f64 / OUTLINE_TAPS as f64;
        let dx = (angle.cos() * radius).round() as i64;
        let dy = (angle.sin() * radius).round() as i64;
        union_into(&mut dilated, &water.shifted(dx, dy, 0.0));
    }
    dilated.zip_map(water, |d, w| (d - w).clamp(0.0, 1.0)).unwrap_or(dilated)
}

// =============================================================================
// VORONOI MOSAIC
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RippleSeed {
    pub position: Point,
    /// Per-cell tone offset in `[-0.5, 0.5]`
    pub tone: f32,
    /// Per-cell opacity bias in `[0, 1]`
    pub bias: f32,
}

/// Seeds on a jittered lattice, bucketed by lattice cell
#[derive(Clone, Debug)]
pub struct SeedField {
    pub cell: f64,
    pub cols: usize,
    pub rows: usize,
    pub seeds: Vec<RippleSeed>,
    buckets: Vec<Vec<usize>>,
}

impl SeedField {
    /// Place at most one seed per lattice cell, only on inside pixels
    pub fn place(mask: &Grid<f32>, cell: f64, rng: &mut SeededRng) -> SeedField {
        let cell = cell.max(2.0);
        let cols = ((mask.width as f64 / cell).ceil() as usize).max(1);
        let rows = ((mask.height as f64 / cell).ceil() as usize).max(1);
        let mut seeds = Vec::new();
        let mut buckets = vec![Vec::new(); cols * rows];

        for gy in 0..rows {
            for gx in 0..cols {
                for _ in 0..SEED_RETRIES {
                    let x = (gx as f64 + rng.gen::<f64>()) * cell;
                    let y = (gy as f64 + rng.gen::<f64>()) * cell;
                    let inside = mask
                        .try_get(x.floor() as i64, y.floor() as i64)
                        .is_some_and(|&v| v > 0.5);
                    if inside {
                        buckets[gy * cols + gx].push(seeds.len());
                        seeds.push(RippleSeed {
                            position: Point::new(x, y),
                            tone: rng.gen::<f32>() - 0.5,
                            bias: rng.gen::<f32>(),
                        });
                        break;
                    }
                }
            }
        }

        SeedField {
            cell,
            cols,
            rows,
            seeds,
            buckets,
        }
    }

    /// Nearest and second-nearest seed distances from `p`, with the nearest index.
    /// Only the 3x3 bucket neighborhood is searched; every seed is scanned when
    /// that neighborhood is empty.
    pub fn nearest(&self, p: Point) -> Option<(usize, f64, f64)> {
        let bx = (p.x / self.cell).floor() as i64;
        let by = (p.y / self.cell).floor() as i64;
        let mut best: Option<(usize, f64, f64)> = None;

        let consider = |idx: usize, best: &mut Option<(usize, f64, f64)>| {
            let d = self.seeds[idx].position.distance(p);
            *best = Some(match *best {
                None => (idx, d, f64::INFINITY),
                Some((_, d1, _)) if d < d1 => (idx, d, d1),
                Some((bi, d1, d2)) => (bi, d1, d2.min(d)),
            });
        };

        for gy in (by - 1)..=(by + 1) {
            for gx in (bx - 1)..=(bx + 1) {
                if gx < 0 || gy < 0 || gx >= self.cols as i64 || gy >= self.rows as i64 {
                    continue;
                }
                for &idx in &self.buckets[gy as usize * self.cols + gx as usize] {
                    consider(idx, &mut best);
                }
            }
        }

        if best.is_none() {
            for idx in 0..self.seeds.len() {
                consider(idx, &mut best);
            }
        }
        best
    }
}

/// Nearest-seed assignment of every inside pixel (`-1` outside)
#[derive(Clone, Debug)]
struct Assignment {
    owner: Grid<i64>,
    d1: Grid<f32>,
    d2: Grid<f32>,
}

fn assign(mask: &Grid<f32>, field: &SeedField) -> Assignment {
    let (w, h) = (mask.width, mask.height);
    let mut owner = Grid::new_with(w, h, -1i64);
    let mut d1 = Grid::new_with(w, h, 0.0f32);
    let mut d2 = Grid::new_with(w, h, 0.0f32);

    for y in 0..h {
        for x in 0..w {
            if *mask.get(x, y) <= 0.5 {
                continue;
            }
            let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
            if let Some((idx, a, b)) = field.nearest(p) {
                owner.set(x, y, idx as i64);
                d1.set(x, y, a as f32);
                d2.set(x, y, if b.is_finite() { b as f32 } else { a as f32 + field.cell as f32 });
            }
        }
    }
    Assignment { owner, d1, d2 }
}

/// Inside pixels whose right, down or diagonal neighbor belongs to another cell
fn seam_pixels(owner: &Grid<i64>) -> Grid<f32> {
    let mut seams = Grid::new_with(owner.width, owner.height, 0.0f32);
    for y in 0..owner.height {
        for x in 0..owner.width {
            let center = *owner.get(x, y);
            if center < 0 {
                continue;
            }
            let differs = [(1, 0), (0, 1), (1, 1)].iter().any(|&(dx, dy)| {
                owner
                    .try_get(x as i64 + dx, y as i64 + dy)
                    .is_some_and(|&o| o >= 0 && o != center)
            });
            if differs {
                seams.set(x, y, 1.0);
            }
        }
    }
    seams
}

/// Per-pixel mosaic color from the distance field
fn mosaic_raster(
    mask: &Grid<f32>,
    field: &SeedField,
    assignment: &Assignment,
    style: &WaterStyle,
) -> Raster {
    let cell = field.cell as f32;
    let shading = style.depth_shading.clamp(0.0, 1.0) as f32;
    let mut out = Raster::new(mask.width, mask.height);

    for (x, y, px) in out.iter_mut() {
        let idx = *assignment.owner.get(x, y);
        if idx < 0 {
            continue;
        }
        let seed = field.seeds[idx as usize];
        let d1 = *assignment.d1.get(x, y);
        let d2 = *assignment.d2.get(x, y);

        let nd = (d1 / cell).clamp(0.0, 1.0);
        let near = (1.0 - nd / 0.35).max(0.0).powi(2);
        let contour = 1.0 - ((d2 - d1) / (cell * 0.5)).clamp(0.0, 1.0);

        let tone = (0.25 + seed.tone * 0.3 + near * 0.25 - nd * shading * 0.3 + contour * 0.2)
            .clamp(0.0, 1.0);
        let color = style.color.mix(style.ripple_color, tone).with_alpha(1.0);
        let alpha = (0.2 + 0.35 * contour + 0.2 * near + 0.1 * seed.bias).clamp(0.0, 1.0);
        *px = Rgba::from_color(color, alpha * mask.get(x, y).clamp(0.0, 1.0));
    }
    out
}

/// Seam mask with random per-pixel dropout and strength jitter
fn seam_glow(seams: &Grid<f32>, strength: f32, rng: &mut SeededRng) -> Grid<f32> {
    let mut glow = seams.clone();
    for v in glow.data_mut() {
        // Draw for every pixel so the stream layout does not depend on the seams
        let keep = rng.gen::<f64>() >= SEAM_DROPOUT;
        let jitter = 0.6 + 0.4 * rng.gen::<f32>();
        *v = if *v > 0.0 && keep { strength * jitter } else { 0.0 };
    }
    glow
}

fn ripple_layer(water: &Grid<f32>, style: &WaterStyle, ppu: f64, seeds: &WaterSeeds) -> Raster {
    let (w, h) = (water.width, water.height);
    let (small, scale) = water.downsample_to(MOSAIC_MAX_SIDE);
    let cell = style.ripple_scale * ppu * scale as f64;

    let mut mosaic_rng = rng_from_seed(seeds.mosaic);
    let field = SeedField::place(&small, cell, &mut mosaic_rng);
    if field.seeds.is_empty() {
        return Raster::new(w, h);
    }

    let assignment = assign(&small, &field);
    let mosaic = mosaic_raster(&small, &field, &assignment, style);
    let mut layer = mosaic.resize_bilinear(w, h).box_blur(1);

    let mut seam_rng = rng_from_seed(seeds.seams);
    let seams = seam_glow(&seam_pixels(&assignment.owner), style.seam_strength as f32, &mut seam_rng);
    let seams_full = seams.resize_bilinear(w, h).box_blur(1);
    let seam_color = style.ripple_color.mix(Color::WHITE, 0.35);
    composite(&mut layer, &tint(&seams_full, seam_color, 1.0), BlendMode::Lighter);

    let sparkles = sparkle_mask(water, style, ppu, &mut rng_from_seed(seeds.sparkles));
    let sparkle_color = Color::WHITE.mix(style.ripple_color, 0.3);
    composite(&mut layer, &tint(&sparkles, sparkle_color, 0.8), BlendMode::SourceOver);

    clip_to_mask(&mut layer, water);
    layer
}

/// Small radial highlights scattered over the water
fn sparkle_mask(water: &Grid<f32>, style: &WaterStyle, ppu: f64, rng: &mut SeededRng) -> Grid<f32> {
    let mut mask = Grid::new_with(water.width, water.height, 0.0f32);
    let density = style.sparkle_density.max(0.0);
    let Some((x0, y0, x1, y1)) = water.occupied_bounds(0.5) else {
        return mask;
    };
    if density <= 0.0 {
        return mask;
    }

    let cell_px = (style.ripple_scale * ppu).max(1.0);
    let area = water.count_above(0.5) as f64;
    let count = ((density * 2.0 * area / (cell_px * cell_px)).round() as usize).min(MAX_SPARKLES);
    let base_radius = ppu.max(1.0);

    for _ in 0..count {
        for _ in 0..SPARKLE_RETRIES {
            let x = x0 as f64 + rng.gen::<f64>() * (x1 + 1 - x0) as f64;
            let y = y0 as f64 + rng.gen::<f64>() * (y1 + 1 - y0) as f64;
            let inside = water
                .try_get(x.floor() as i64, y.floor() as i64)
                .is_some_and(|&v| v > 0.5);
            if !inside {
                continue;
            }
            let radius = base_radius * (0.6 + rng.gen::<f64>());
            if let Some(dot) = radial_dot(Point::new(x, y), radius, water.width, water.height) {
                max_coverage(&mut mask, &dot);
            }
            break;
        }
    }
    mask
}

// =============================================================================
// LAYER
// =============================================================================

/// Build the water edge layer, or `None` when neither outline nor ripples are on.
/// Ripples are clipped to the raw water mask; the outline sits just outside it.
pub fn build_water_edge(
    water: &Grid<f32>,
    style: &WaterStyle,
    ppu: f64,
) -> Result<Option<Raster>, LayerError> {
    if !water_edge_enabled(style) {
        return Ok(None);
    }
    check_frame("water_edge", water)?;

    let mut layer = Raster::new(water.width, water.height);
    if water.count_above(0.5) == 0 {
        return Ok(Some(layer));
    }

    if style.ripples_enabled {
        let seeds = WaterSeeds::from_master(mask_seed(water.count_above(0.5), water.width, water.height));
        debug!(%seeds, "building ripple mosaic");
        layer = ripple_layer(water, style, ppu, &seeds);
    }

    if style.outline_enabled {
        let ring = outline_mask(water, style.outline_width * ppu);
        let color = style.outline_color.mix(style.color, 0.25);
        composite(&mut layer, &tint(&ring, color, 1.0), BlendMode::SourceOver);
    }

    Ok(Some(layer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lake(w: usize, h: usize) -> Grid<f32> {
        let mut g = Grid::new_with(w, h, 0.0f32);
        let c = Point::new(w as f64 * 0.5, h as f64 * 0.5);
        let r = w.min(h) as f64 * 0.35;
        for (x, y, v) in g.iter_mut() {
            if Point::new(x as f64 + 0.5, y as f64 + 0.5).distance(c) < r {
                *v = 1.0;
            }
        }
        g
    }

    #[test]
    fn test_outline_is_outside_water() {
        let water = lake(40, 40);
        let ring = outline_mask(&water, 2.0);
        assert_eq!(*ring.get(20, 20), 0.0);
        // Just beyond the shore on the left
        assert!(*ring.get(5, 20) > 0.0);
        assert_eq!(*ring.get(0, 0), 0.0);
    }

    #[test]
    fn test_seeds_only_inside() {
        let water = lake(64, 64);
        let mut rng = rng_from_seed(3);
        let field = SeedField::place(&water, 8.0, &mut rng);
        assert!(!field.seeds.is_empty());
        for s in &field.seeds {
            let v = water.get(s.position.x.floor() as usize, s.position.y.floor() as usize);
            assert!(*v > 0.5);
        }
    }

    #[test]
    fn test_nearest_searches_neighborhood() {
        let water = lake(64, 64);
        let field = SeedField::place(&water, 8.0, &mut rng_from_seed(11));
        let p = Point::new(30.5, 33.5);
        let (idx, d1, d2) = field.nearest(p).unwrap();

        // Seeds in the 3x3 buckets around (3, 4)
        let mut local: Vec<f64> = field
            .seeds
            .iter()
            .filter(|s| {
                let gx = (s.position.x / field.cell).floor() as i64;
                let gy = (s.position.y / field.cell).floor() as i64;
                (gx - 3).abs() <= 1 && (gy - 4).abs() <= 1
            })
            .map(|s| s.position.distance(p))
            .collect();
        local.sort_by(|a, b| a.total_cmp(b));
        assert!(local.len() >= 2);
        assert!((d1 - local[0]).abs() < 1e-9);
        assert!((d2 - local[1]).abs() < 1e-9);
        assert!((field.seeds[idx].position.distance(p) - d1).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_falls_back_to_all_seeds() {
        let mut water = Grid::new_with(64, 64, 0.0f32);
        for y in 0..8 {
            for x in 0..8 {
                water.set(x, y, 1.0);
            }
        }
        let field = SeedField::place(&water, 8.0, &mut rng_from_seed(3));
        assert_eq!(field.seeds.len(), 1);
        let (idx, d1, d2) = field.nearest(Point::new(60.0, 60.0)).unwrap();
        assert_eq!(idx, 0);
        assert!((d1 - field.seeds[0].position.distance(Point::new(60.0, 60.0))).abs() < 1e-9);
        assert!(d2.is_infinite());

        let empty = SeedField::place(&Grid::new_with(16, 16, 0.0f32), 8.0, &mut rng_from_seed(3));
        assert!(empty.nearest(Point::new(4.0, 4.0)).is_none());
    }

    #[test]
    fn test_ripples_deterministic_and_clipped() {
        let water = lake(80, 60);
        let style = WaterStyle::default();
        let a = build_water_edge(&water, &style, 1.0).unwrap().unwrap();
        let b = build_water_edge(&water, &style, 1.0).unwrap().unwrap();
        assert_eq!(a, b);
        // Center of the lake carries mosaic, far corner nothing
        assert!(a.get(40, 30).a > 0.0);
        assert_eq!(a.get(0, 0).a, 0.0);
    }

    #[test]
    fn test_edge_disabled_is_none() {
        let style = WaterStyle {
            outline_enabled: false,
            ripples_enabled: false,
            ..WaterStyle::default()
        };
        assert!(build_water_edge(&lake(20, 20), &style, 1.0).unwrap().is_none());
    }
}
