//! Water body fill.
//!
//! A radial gradient centered on the visible water, darkened in a band along
//! the shore, broken up with low-frequency Perlin noise and lifted by a soft
//! core glow. Water outside the interior is never drawn.

use noise::{NoiseFn, Perlin, Seedable};

use crate::color::Color;
use crate::composite::{BlendMode, Raster, Rgba};
use crate::error::LayerError;
use crate::geometry::Point;
use crate::grid::Grid;
use crate::model::WaterStyle;
use crate::seeds::{derive_seed, mask_seed};

use super::gradient;
use crate::decorations::{check_frame, check_same_size, intersect};

/// Shore band blur radius as a fraction of the water's bounding size
const SHORE_BAND: f64 = 0.04;
/// Noise frequency in cycles per pixel
const TONE_FREQUENCY: f64 = 0.02;
const TONE_STRENGTH: f32 = 0.15;
/// Fraction of the gradient radius covered by the core glow
const GLOW_RADIUS: f32 = 0.45;

/// Gradient stops from the darkest rim to the bright core
fn fill_stops(base: Color) -> [(f32, Color); 5] {
    let core = base.mix(Color::WHITE, 0.45);
    let bright = base.mix(Color::CYAN, 0.25).mix(Color::WHITE, 0.1);
    let mid = base;
    let deep = base.mix(Color::BLACK, 0.3);
    let dark = base.mix(Color::BLACK, 0.55);
    [(0.0, core), (0.25, bright), (0.5, mid), (0.8, deep), (1.0, dark)]
}

/// Build the water fill, or `None` when water is disabled or nothing is visible.
pub fn build_water_fill(
    water: &Grid<f32>,
    interior: &Grid<f32>,
    style: &WaterStyle,
) -> Result<Option<Raster>, LayerError> {
    if !style.enabled || style.opacity <= 0.0 {
        return Ok(None);
    }
    check_frame("water_fill", water)?;
    check_same_size("water_fill", water, interior)?;

    let visible = intersect(water, interior);
    let Some((x0, y0, x1, y1)) = visible.occupied_bounds(0.01) else {
        return Ok(None);
    };
    let center = Point::new((x0 + x1 + 1) as f64 * 0.5, (y0 + y1 + 1) as f64 * 0.5);
    let radius = (Point::new((x1 + 1 - x0) as f64, (y1 + 1 - y0) as f64).length() * 0.5).max(1.0);

    let stops = fill_stops(style.color);
    let dark = stops[4].1;
    let (deep, bright, core) = (stops[3].1, stops[1].1, stops[0].1);

    let band_radius = ((x1 - x0).max(y1 - y0) as f64 * SHORE_BAND).round().max(2.0) as usize;
    let shore = visible.box_blur(band_radius);

    let seed = mask_seed(water.count_above(0.5), water.width, water.height);
    let noise = Perlin::new(1).set_seed(derive_seed(seed, "water-tone") as u32);

    let opacity = style.opacity.clamp(0.0, 1.0) as f32;
    let shading = style.depth_shading.clamp(0.0, 1.0) as f32;
    let glow = style.glow.clamp(0.0, 1.0) as f32;

    let mut layer = Raster::new(water.width, water.height);
    let mut glow_layer = Raster::new(water.width, water.height);

    for (x, y, cell) in layer.iter_mut() {
        let coverage = *visible.get(x, y);
        if coverage <= 0.0 {
            continue;
        }
        let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
        let t = (p.distance(center) / radius).clamp(0.0, 1.0) as f32;
        let mut color = gradient(&stops, t);

        // Darken toward the shore
        let inner = (1.0 - *shore.get(x, y)).clamp(0.0, 1.0);
        color = color.mix(dark, shading * inner * 2.0);

        let n = noise.get([p.x * TONE_FREQUENCY, p.y * TONE_FREQUENCY]) as f32;
        let toward = if n > 0.0 { bright } else { deep };
        color = color.mix(toward, n.abs() * TONE_STRENGTH);

        *cell = Rgba::from_color(color.with_alpha(1.0), coverage * opacity);

        let g = (1.0 - t / GLOW_RADIUS).max(0.0);
        if g > 0.0 && glow > 0.0 {
            glow_layer.set(x, y, Rgba::from_color(core.with_alpha(1.0), g * g * glow * coverage));
        }
    }

    for (d, s) in layer.data_mut().iter_mut().zip(glow_layer.data()) {
        *d = BlendMode::Screen.combine(*d, *s);
    }

    Ok(Some(layer))
}
