//! Error types for the compile pipeline.
//!
//! Geometry and style problems never surface here: they are sanitized away at
//! the entry points. What remains are collaborator precondition violations
//! (`CompileError`) and isolated per-layer failures (`LayerError`).

use thiserror::Error;

/// Fatal precondition violations raised by `WorldCache::compile`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("max_dimension must be at least 1 pixel")]
    ZeroMaxDimension,
    #[error("desired ppu must be finite and positive, got {0}")]
    InvalidPpu(f64),
    #[error("min ppu must be finite and positive, got {0}")]
    InvalidMinPpu(f64),
    #[error("contour step must be at least 1 pixel")]
    ZeroContourStep,
    #[error("alpha threshold must lie in [0, 1), got {0}")]
    InvalidAlphaThreshold(f32),
}

/// A single derived layer could not be built; other layers are unaffected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayerError {
    #[error("{layer}: input size {got_width}x{got_height} does not match frame {width}x{height}")]
    SizeMismatch {
        layer: &'static str,
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },
    #[error("{layer}: raster frame is empty")]
    EmptyFrame { layer: &'static str },
}

/// Invalid color literal in model input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("color must start with '#': {0:?}")]
    MissingHash(String),
    #[error("color must have 3, 6 or 8 hex digits: {0:?}")]
    BadLength(String),
    #[error("invalid hex digit in color {0:?}")]
    BadDigit(String),
}
