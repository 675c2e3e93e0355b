//! Decorative layers derived from the interior mask and its contours
//!
//! Each builder is a pure function from explicit inputs to a fresh `Raster`.
//! Builders never read each other's output, so one failing leaves the others
//! intact.

pub mod hatch;
pub mod shadow;
pub mod walls;

pub use hatch::build_hatch;
pub use shadow::build_shadow;
pub use walls::build_walls;

use crate::error::LayerError;
use crate::grid::Grid;

/// Reject masks with no pixels
pub(crate) fn check_frame(layer: &'static str, mask: &Grid<f32>) -> Result<(), LayerError> {
    if mask.width == 0 || mask.height == 0 {
        return Err(LayerError::EmptyFrame { layer });
    }
    Ok(())
}

/// Reject a secondary input whose size differs from the frame mask
pub(crate) fn check_same_size(
    layer: &'static str,
    frame: &Grid<f32>,
    other: &Grid<f32>,
) -> Result<(), LayerError> {
    if !frame.same_size(other) {
        return Err(LayerError::SizeMismatch {
            layer,
            width: frame.width,
            height: frame.height,
            got_width: other.width,
            got_height: other.height,
        });
    }
    Ok(())
}

/// Pointwise product of two same-sized masks (intersection)
pub(crate) fn intersect(a: &Grid<f32>, b: &Grid<f32>) -> Grid<f32> {
    let mut out = a.clone();
    for (o, &m) in out.data_mut().iter_mut().zip(b.data()) {
        *o *= m.clamp(0.0, 1.0);
    }
    out
}

/// Pointwise maximum (union) of `src` into `dst`
pub(crate) fn union_into(dst: &mut Grid<f32>, src: &Grid<f32>) {
    for (d, &s) in dst.data_mut().iter_mut().zip(src.data()) {
        if s > *d {
            *d = s;
        }
    }
}

/// Uniform draw in `[lo, hi]` that tolerates `lo > hi` or an empty range
pub(crate) fn draw_between(rng: &mut impl rand::Rng, lo: f64, hi: f64) -> f64 {
    lo + (hi - lo) * rng.gen::<f64>()
}
