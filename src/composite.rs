//! Pixel compositing over explicit buffer pairs.
//!
//! Every decorative layer is a `Raster` of premultiplied RGBA. Combining two
//! buffers is a pure function of the destination, the source and a
//! `BlendMode`; there is no shared canvas state.

use crate::color::Color;
use crate::grid::Grid;
use image::{Rgba as ImageRgba, RgbaImage};
use std::ops::{Add, Mul};

/// Premultiplied RGBA pixel
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };

    /// Premultiply a straight color at the given coverage
    pub fn from_color(color: Color, coverage: f32) -> Rgba {
        let a = (color.a * coverage).clamp(0.0, 1.0);
        Rgba {
            r: color.r * a,
            g: color.g * a,
            b: color.b * a,
            a,
        }
    }

    /// Straight (unpremultiplied) color
    pub fn to_color(&self) -> Color {
        if self.a <= 1e-6 {
            return Color::rgba(0.0, 0.0, 0.0, 0.0);
        }
        Color::rgba(self.r / self.a, self.g / self.a, self.b / self.a, self.a)
    }

    fn clamped(self) -> Rgba {
        let a = self.a.clamp(0.0, 1.0);
        Rgba {
            r: self.r.clamp(0.0, a),
            g: self.g.clamp(0.0, a),
            b: self.b.clamp(0.0, a),
            a,
        }
    }
}

impl Add for Rgba {
    type Output = Rgba;

    fn add(self, o: Rgba) -> Rgba {
        Rgba {
            r: self.r + o.r,
            g: self.g + o.g,
            b: self.b + o.b,
            a: self.a + o.a,
        }
    }
}

impl Mul<f32> for Rgba {
    type Output = Rgba;

    fn mul(self, s: f32) -> Rgba {
        Rgba {
            r: self.r * s,
            g: self.g * s,
            b: self.b * s,
            a: self.a * s,
        }
    }
}

/// A colored layer buffer
pub type Raster = Grid<Rgba>;

/// Porter-Duff and separable blend operators used by the builders
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Normal painting
    SourceOver,
    /// Erase the destination where the source is opaque
    DestinationOut,
    /// Keep the destination only where the source is opaque
    DestinationIn,
    /// Lightening blend, `s + d - s*d`
    Screen,
    /// Additive, saturating at 1
    Lighter,
}

impl BlendMode {
    pub fn combine(self, dst: Rgba, src: Rgba) -> Rgba {
        match self {
            BlendMode::SourceOver => src + dst * (1.0 - src.a),
            BlendMode::DestinationOut => dst * (1.0 - src.a),
            BlendMode::DestinationIn => dst * src.a,
            BlendMode::Screen => Rgba {
                r: src.r + dst.r - src.r * dst.r,
                g: src.g + dst.g - src.g * dst.g,
                b: src.b + dst.b - src.b * dst.b,
                a: src.a + dst.a - src.a * dst.a,
            },
            BlendMode::Lighter => (src + dst).clamped(),
        }
    }

    /// The same operator applied to bare coverage values
    pub fn combine_alpha(self, dst: f32, src: f32) -> f32 {
        match self {
            BlendMode::SourceOver | BlendMode::Screen => src + dst * (1.0 - src),
            BlendMode::DestinationOut => dst * (1.0 - src),
            BlendMode::DestinationIn => dst * src,
            BlendMode::Lighter => (src + dst).min(1.0),
        }
    }
}

/// Composite `src` onto `dst` in place. Sizes must match; extra cells are ignored.
pub fn composite(dst: &mut Raster, src: &Raster, mode: BlendMode) {
    debug_assert!(dst.same_size(src));
    for (d, s) in dst.data_mut().iter_mut().zip(src.data().iter()) {
        *d = mode.combine(*d, *s);
    }
}

/// Multiply every pixel by the matching mask coverage (`destination-in` with a mask)
pub fn clip_to_mask(layer: &mut Raster, mask: &Grid<f32>) {
    debug_assert!(layer.same_size(mask));
    for (p, &m) in layer.data_mut().iter_mut().zip(mask.data().iter()) {
        *p = *p * m.clamp(0.0, 1.0);
    }
}

/// Fill a coverage mask with a solid color
pub fn tint(mask: &Grid<f32>, color: Color, opacity: f32) -> Raster {
    let opacity = opacity.clamp(0.0, 1.0);
    mask.map(|&coverage| Rgba::from_color(color, coverage.clamp(0.0, 1.0) * opacity))
}

/// Convert to an 8-bit straight-alpha image for export
pub fn to_rgba_image(layer: &Raster) -> RgbaImage {
    let to8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let mut img = RgbaImage::new(layer.width as u32, layer.height as u32);
    for (x, y, p) in layer.iter() {
        let c = p.to_color();
        img.put_pixel(
            x as u32,
            y as u32,
            ImageRgba([to8(c.r), to8(c.g), to8(c.b), to8(c.a)]),
        );
    }
    img
}
