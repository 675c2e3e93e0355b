//! Dungeon map compilation library
//!
//! Turns a vector floor plan (rooms, corridors, freeform shapes, water) into a
//! stack of stylized raster layers plus world-space contours. Re-exports
//! modules for use by binaries and tools.

pub mod color;
pub mod composite;
pub mod contour;
pub mod decorations;
pub mod draw;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod mask;
pub mod model;
pub mod paint;
pub mod path_geometry;
pub mod seeds;
pub mod water;
pub mod world_cache;

pub use error::{ColorParseError, CompileError, LayerError};
pub use model::Dungeon;
pub use world_cache::{CompileConfig, WorldCache, WorldCacheEntry};
