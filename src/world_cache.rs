//! World compilation and per-layer caching.
//!
//! `WorldCache::compile` turns the current `Dungeon` into a `WorldCacheEntry`:
//! a fixed world-space raster frame plus every derived layer. Each layer lives
//! in its own slot guarded by a fingerprint holding exactly the inputs that
//! layer reads, so a change to the wall color rebuilds the walls and nothing
//! else.
//!
//! ## Usage
//!
//! ```ignore
//! let mut cache = WorldCache::new(CompileConfig::default());
//! if let Some(entry) = cache.compile(&dungeon)? {
//!     let png = draw::render_export(entry, &dungeon.style);
//! }
//! ```

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::contour::contours_from_alpha;
use crate::composite::Raster;
use crate::decorations::{build_hatch, build_shadow, build_walls};
use crate::error::{CompileError, LayerError};
use crate::geometry::{simplify_polyline, simplify_ring, Bounds, Polyline};
use crate::grid::Grid;
use crate::mask::{rasterize, RasterFrame};
use crate::model::{
    Dungeon, HatchStyle, ShadowStyle, Style, WallStyle, WaterStyle, INTERIOR_DOMAIN, WATER_DOMAIN,
};
use crate::water::{build_water_edge, build_water_fill};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Resolution and extraction settings for a compile
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Pixels per world unit when the map is small enough
    pub desired_ppu: f64,
    /// Lowest density used before the dimension cap takes over
    pub min_ppu: f64,
    /// Hard cap on either raster side, in pixels
    pub max_dimension: usize,
    /// Contour sample spacing in pixels
    pub contour_step: usize,
    pub alpha_threshold: f32,
    /// Cheaper path geometry (fewer stations, smaller point budgets)
    pub preview: bool,
    /// Douglas-Peucker tolerance for world contours, in pixels
    pub simplify_tolerance: f64,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            desired_ppu: 4.0,
            min_ppu: 0.25,
            max_dimension: 4096,
            contour_step: 2,
            alpha_threshold: 0.5,
            preview: false,
            simplify_tolerance: 1.0,
        }
    }
}

impl CompileConfig {
    pub fn validate(&self) -> Result<(), CompileError> {
        if !(self.desired_ppu.is_finite() && self.desired_ppu > 0.0) {
            return Err(CompileError::InvalidPpu(self.desired_ppu));
        }
        if !(self.min_ppu.is_finite() && self.min_ppu > 0.0) {
            return Err(CompileError::InvalidMinPpu(self.min_ppu));
        }
        if self.max_dimension == 0 {
            return Err(CompileError::ZeroMaxDimension);
        }
        if self.contour_step == 0 {
            return Err(CompileError::ZeroContourStep);
        }
        if !(0.0..1.0).contains(&self.alpha_threshold) {
            return Err(CompileError::InvalidAlphaThreshold(self.alpha_threshold));
        }
        Ok(())
    }
}

// =============================================================================
// FRAME PLANNING
// =============================================================================

/// World-space margin around content so strokes, teeth, shadows and hatching
/// never clip at the raster edge
pub fn frame_padding(style: &Style) -> f64 {
    let corridor = style.corridor_width * 0.5;
    let wall = style.wall.width * 2.0 + 2.0;
    let shadow = if style.shadow.enabled { style.shadow.length } else { 0.0 };
    let hatch = if style.hatch.enabled {
        style.hatch.depth + style.hatch.inset.abs() + style.hatch.max_length
    } else {
        0.0
    };
    corridor.max(wall).max(shadow).max(hatch).ceil()
}

/// Pixels per unit for a padded world of `world_w x world_h`.
/// The dimension cap wins over the minimum density, so `min_ppu` only takes
/// effect when the cap leaves room for it.
pub fn choose_ppu(config: &CompileConfig, world_w: f64, world_h: f64) -> f64 {
    let longest = world_w.max(world_h).max(1e-9);
    let cap = config.max_dimension as f64 / longest;
    config.desired_ppu.max(config.min_ppu).min(cap)
}

/// Padded bounds, resolution and raster size for the given content
pub fn plan_frame(content: Bounds, style: &Style, config: &CompileConfig) -> RasterFrame {
    let bounds = content.pad(frame_padding(style));
    let ppu = choose_ppu(config, bounds.width(), bounds.height());
    let side = |extent: f64| ((extent * ppu).ceil() as usize).clamp(1, config.max_dimension);
    RasterFrame::new(bounds, ppu, side(bounds.width()), side(bounds.height()))
}

// =============================================================================
// FINGERPRINTS
// =============================================================================

#[derive(Clone, Debug, PartialEq)]
struct InteriorKey {
    frame: RasterFrame,
    version: u64,
    corridor_width: f64,
    preview: bool,
}

#[derive(Clone, Debug, PartialEq)]
struct WaterMaskKey {
    frame: RasterFrame,
    version: u64,
    corridor_width: f64,
    preview: bool,
}

#[derive(Clone, Debug, PartialEq)]
struct ContourKey {
    interior: InteriorKey,
    step: usize,
    threshold: f32,
    simplify_tolerance: f64,
}

#[derive(Clone, Debug, PartialEq)]
struct WallKey {
    contours: ContourKey,
    wall: WallStyle,
}

#[derive(Clone, Debug, PartialEq)]
struct HatchKey {
    contours: ContourKey,
    hatch: HatchStyle,
}

#[derive(Clone, Debug, PartialEq)]
struct ShadowKey {
    interior: InteriorKey,
    shadow: ShadowStyle,
}

#[derive(Clone, Debug, PartialEq)]
struct WaterFillKey {
    water_mask: WaterMaskKey,
    interior: InteriorKey,
    water: WaterStyle,
}

#[derive(Clone, Debug, PartialEq)]
struct WaterEdgeKey {
    water_mask: WaterMaskKey,
    water: WaterStyle,
}

/// One cached `(fingerprint, value)` pair
#[derive(Debug)]
struct LayerSlot<K, V> {
    cached: Option<(K, V)>,
}

impl<K, V> Default for LayerSlot<K, V> {
    fn default() -> Self {
        Self { cached: None }
    }
}

impl<K: PartialEq, V: Clone> LayerSlot<K, V> {
    fn lookup(&self, key: &K) -> Option<V> {
        match &self.cached {
            Some((cached_key, value)) if cached_key == key => Some(value.clone()),
            _ => None,
        }
    }

    fn get_or_build(&mut self, layer: &'static str, key: K, build: impl FnOnce() -> V) -> V {
        if let Some(value) = self.lookup(&key) {
            debug!(layer, "reusing cached layer");
            return value;
        }
        let start = Instant::now();
        let value = build();
        debug!(layer, elapsed_ms = start.elapsed().as_millis() as u64, "rebuilt layer");
        self.cached = Some((key, value.clone()));
        value
    }

    /// Failed builds are logged, not cached, and published as absent
    fn try_get_or_build(
        &mut self,
        layer: &'static str,
        key: K,
        build: impl FnOnce() -> Result<V, LayerError>,
    ) -> Option<V> {
        if let Some(value) = self.lookup(&key) {
            debug!(layer, "reusing cached layer");
            return Some(value);
        }
        let start = Instant::now();
        match build() {
            Ok(value) => {
                debug!(layer, elapsed_ms = start.elapsed().as_millis() as u64, "rebuilt layer");
                self.cached = Some((key, value.clone()));
                Some(value)
            }
            Err(err) => {
                warn!(layer, error = %err, "layer build failed");
                self.cached = None;
                None
            }
        }
    }

    fn is_cached(&self) -> bool {
        self.cached.is_some()
    }
}

type MaskSlot<K> = LayerSlot<K, Arc<Grid<f32>>>;
type RasterSlot<K> = LayerSlot<K, Option<Arc<Raster>>>;

#[derive(Debug, Default)]
struct Slots {
    interior: MaskSlot<InteriorKey>,
    water_mask: MaskSlot<WaterMaskKey>,
    contours: LayerSlot<ContourKey, Arc<Contours>>,
    walls: RasterSlot<WallKey>,
    hatch: RasterSlot<HatchKey>,
    shadow: RasterSlot<ShadowKey>,
    water_fill: RasterSlot<WaterFillKey>,
    water_edge: RasterSlot<WaterEdgeKey>,
}

// =============================================================================
// CACHE ENTRY
// =============================================================================

/// Interior boundaries in both coordinate systems
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contours {
    /// Raster pixel space, as extracted
    pub px: Vec<Polyline>,
    /// World space, simplified
    pub world: Vec<Polyline>,
}

/// Everything the draw layer needs for one compiled world.
/// Layers that are disabled or failed to build are `None`.
#[derive(Clone, Debug)]
pub struct WorldCacheEntry {
    pub frame: RasterFrame,
    pub interior: Arc<Grid<f32>>,
    pub water_mask: Arc<Grid<f32>>,
    pub contours: Arc<Contours>,
    pub walls: Option<Arc<Raster>>,
    pub hatch: Option<Arc<Raster>>,
    pub shadow: Option<Arc<Raster>>,
    pub water_fill: Option<Arc<Raster>>,
    pub water_edge: Option<Arc<Raster>>,
}

impl WorldCacheEntry {
    pub fn bounds(&self) -> Bounds {
        self.frame.bounds
    }

    pub fn ppu(&self) -> f64 {
        self.frame.ppu
    }

    /// Raster size in pixels
    pub fn dimensions(&self) -> (usize, usize) {
        (self.frame.width, self.frame.height)
    }

    pub fn contours_world(&self) -> &[Polyline] {
        &self.contours.world
    }
}

fn world_contours(px: &[Polyline], frame: &RasterFrame, tolerance_px: f64) -> Vec<Polyline> {
    let epsilon = tolerance_px.max(0.0) / frame.ppu;
    px.iter()
        .map(|c| {
            let world = c.map(|p| frame.to_world(p));
            let simplified = if c.closed {
                simplify_ring(&world.points, epsilon)
            } else {
                simplify_polyline(&world.points, epsilon)
            };
            Polyline::new(simplified, c.closed)
        })
        .collect()
}

// =============================================================================
// WORLD CACHE
// =============================================================================

/// Owns the derived layers of one dungeon. Compiles are serialized by `&mut self`.
#[derive(Debug, Default)]
pub struct WorldCache {
    config: CompileConfig,
    slots: Slots,
    entry: Option<WorldCacheEntry>,
}

impl WorldCache {
    pub fn new(config: CompileConfig) -> Self {
        Self {
            config,
            slots: Slots::default(),
            entry: None,
        }
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Layers keyed on the changed settings rebuild on the next compile
    pub fn set_config(&mut self, config: CompileConfig) {
        self.config = config;
    }

    /// Most recently published entry
    pub fn entry(&self) -> Option<&WorldCacheEntry> {
        self.entry.as_ref()
    }

    /// Drop the entry and every cached layer
    pub fn clear(&mut self) {
        self.slots = Slots::default();
        self.entry = None;
    }

    /// Number of layer slots currently holding a value
    pub fn cached_layer_count(&self) -> usize {
        let s = &self.slots;
        [
            s.interior.is_cached(),
            s.water_mask.is_cached(),
            s.contours.is_cached(),
            s.walls.is_cached(),
            s.hatch.is_cached(),
            s.shadow.is_cached(),
            s.water_fill.is_cached(),
            s.water_edge.is_cached(),
        ]
        .iter()
        .filter(|&&c| c)
        .count()
    }

    /// Compile `dungeon`, reusing every layer whose fingerprint is unchanged.
    ///
    /// Returns `Ok(None)` and discards the cache when the dungeon has no
    /// geometry. A layer that fails to build is published as `None`; the
    /// remaining layers are still produced.
    pub fn compile(&mut self, dungeon: &Dungeon) -> Result<Option<&WorldCacheEntry>, CompileError> {
        self.config.validate()?;
        let start = Instant::now();

        let Some(content) = dungeon.content_bounds() else {
            debug!("dungeon has no geometry, dropping world cache");
            self.clear();
            return Ok(None);
        };

        let config = self.config.clone();
        let style = dungeon.style.sanitized();
        let frame = plan_frame(content, &style, &config);
        let slots = &mut self.slots;

        let interior_key = InteriorKey {
            frame,
            version: dungeon.version(INTERIOR_DOMAIN),
            corridor_width: style.corridor_width,
            preview: config.preview,
        };
        let interior = slots.interior.get_or_build("interior", interior_key.clone(), || {
            Arc::new(rasterize(
                &dungeon.interior_primitives(),
                &frame,
                style.corridor_width,
                config.preview,
            ))
        });

        let water_key = WaterMaskKey {
            frame,
            version: dungeon.version(WATER_DOMAIN),
            corridor_width: style.corridor_width,
            preview: config.preview,
        };
        let water_mask = slots.water_mask.get_or_build("water_mask", water_key.clone(), || {
            Arc::new(rasterize(
                &dungeon.water_primitives(),
                &frame,
                style.corridor_width,
                config.preview,
            ))
        });

        let contour_key = ContourKey {
            interior: interior_key.clone(),
            step: config.contour_step,
            threshold: config.alpha_threshold,
            simplify_tolerance: config.simplify_tolerance,
        };
        let contours = slots.contours.get_or_build("contours", contour_key.clone(), || {
            let px = contours_from_alpha(&interior, config.contour_step, config.alpha_threshold);
            let world = world_contours(&px, &frame, config.simplify_tolerance);
            Arc::new(Contours { px, world })
        });

        let walls = slots
            .walls
            .try_get_or_build(
                "walls",
                WallKey {
                    contours: contour_key.clone(),
                    wall: style.wall.clone(),
                },
                || build_walls(&contours.px, &interior, &style.wall, frame.ppu).map(|r| Some(Arc::new(r))),
            )
            .flatten();

        let hatch = slots
            .hatch
            .try_get_or_build(
                "hatch",
                HatchKey {
                    contours: contour_key,
                    hatch: style.hatch.clone(),
                },
                || Ok(build_hatch(&contours.px, &interior, &style.hatch, frame.ppu)?.map(Arc::new)),
            )
            .flatten();

        let shadow = slots
            .shadow
            .try_get_or_build(
                "shadow",
                ShadowKey {
                    interior: interior_key.clone(),
                    shadow: style.shadow.clone(),
                },
                || Ok(build_shadow(&interior, &style.shadow, frame.ppu)?.map(Arc::new)),
            )
            .flatten();

        let water_fill = slots
            .water_fill
            .try_get_or_build(
                "water_fill",
                WaterFillKey {
                    water_mask: water_key.clone(),
                    interior: interior_key,
                    water: style.water.clone(),
                },
                || Ok(build_water_fill(&water_mask, &interior, &style.water)?.map(Arc::new)),
            )
            .flatten();

        let water_edge = slots
            .water_edge
            .try_get_or_build(
                "water_edge",
                WaterEdgeKey {
                    water_mask: water_key,
                    water: style.water.clone(),
                },
                || Ok(build_water_edge(&water_mask, &style.water, frame.ppu)?.map(Arc::new)),
            )
            .flatten();

        info!(
            width = frame.width,
            height = frame.height,
            ppu = frame.ppu,
            contours = contours.world.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "compiled world"
        );

        self.entry = Some(WorldCacheEntry {
            frame,
            interior,
            water_mask,
            contours,
            walls,
            hatch,
            shadow,
            water_fill,
            water_edge,
        });
        Ok(self.entry.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::model::{rect_polygon, Mode, PathPrimitive, RawShapeSettings};

    fn room_dungeon() -> Dungeon {
        let mut d = Dungeon::new();
        d.add_space(rect_polygon(0.0, 0.0, 100.0, 100.0), Mode::Add);
        d
    }

    fn small_config() -> CompileConfig {
        CompileConfig {
            desired_ppu: 1.0,
            ..CompileConfig::default()
        }
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let bad = CompileConfig {
            max_dimension: 0,
            ..CompileConfig::default()
        };
        assert_eq!(bad.validate(), Err(CompileError::ZeroMaxDimension));
        let bad = CompileConfig {
            desired_ppu: f64::NAN,
            ..CompileConfig::default()
        };
        assert!(matches!(bad.validate(), Err(CompileError::InvalidPpu(_))));
        assert!(CompileConfig::default().validate().is_ok());
    }

    #[test]
    fn test_choose_ppu_respects_cap_over_minimum() {
        let config = CompileConfig {
            desired_ppu: 4.0,
            min_ppu: 0.5,
            max_dimension: 100,
            ..CompileConfig::default()
        };
        // 1000 world units into 100 px: cap (0.1) beats the minimum (0.5)
        assert!((choose_ppu(&config, 1000.0, 10.0) - 0.1).abs() < 1e-12);
        assert_eq!(choose_ppu(&config, 10.0, 10.0), 4.0);
    }

    #[test]
    fn test_empty_dungeon_returns_none_and_clears() {
        let mut cache = WorldCache::new(small_config());
        assert!(cache.compile(&room_dungeon()).unwrap().is_some());
        assert!(cache.cached_layer_count() > 0);

        let empty = Dungeon::new();
        assert!(cache.compile(&empty).unwrap().is_none());
        assert!(cache.entry().is_none());
        assert_eq!(cache.cached_layer_count(), 0);
    }

    #[test]
    fn test_invalid_config_is_error() {
        let mut cache = WorldCache::new(CompileConfig {
            contour_step: 0,
            ..CompileConfig::default()
        });
        assert_eq!(cache.compile(&room_dungeon()).unwrap_err(), CompileError::ZeroContourStep);
    }

    #[test]
    fn test_unrelated_style_change_reuses_water_fill() {
        let mut d = room_dungeon();
        d.add_water_path(PathPrimitive {
            seq: None,
            mode: Mode::Add,
            points: vec![Point::new(20.0, 50.0), Point::new(80.0, 50.0)],
            width: Some(20.0),
            seed: None,
            shape: RawShapeSettings::default(),
        });
        let mut cache = WorldCache::new(small_config());
        let first = cache.compile(&d).unwrap().unwrap().clone();
        let fill_a = first.water_fill.clone().unwrap();
        let walls_a = first.walls.clone().unwrap();

        d.style.wall.width = 3.0;
        let second = cache.compile(&d).unwrap().unwrap();
        let fill_b = second.water_fill.clone().unwrap();
        let walls_b = second.walls.clone().unwrap();

        assert!(Arc::ptr_eq(&fill_a, &fill_b));
        assert!(!Arc::ptr_eq(&walls_a, &walls_b));
        assert!(Arc::ptr_eq(&first.interior, &second.interior));
    }

    #[test]
    fn test_version_bump_rebuilds_interior() {
        let mut d = room_dungeon();
        let mut cache = WorldCache::new(small_config());
        let a = cache.compile(&d).unwrap().unwrap().interior.clone();
        d.bump_version(INTERIOR_DOMAIN);
        let b = cache.compile(&d).unwrap().unwrap().interior.clone();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(*a, *b);
    }

    #[test]
    fn test_contour_step_change_keeps_masks() {
        let d = room_dungeon();
        let mut cache = WorldCache::new(small_config());
        let first = cache.compile(&d).unwrap().unwrap().clone();

        cache.set_config(CompileConfig {
            contour_step: 4,
            ..small_config()
        });
        assert_eq!(cache.config().contour_step, 4);
        let second = cache.compile(&d).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first.interior, &second.interior));
        assert!(!Arc::ptr_eq(&first.contours, &second.contours));
        // Shadow reads only the interior mask
        assert!(Arc::ptr_eq(
            first.shadow.as_ref().unwrap(),
            second.shadow.as_ref().unwrap()
        ));
    }

    #[test]
    fn test_disabled_layers_are_absent() {
        let mut d = room_dungeon();
        d.style.hatch.enabled = false;
        d.style.shadow.enabled = false;
        let mut cache = WorldCache::new(small_config());
        let entry = cache.compile(&d).unwrap().unwrap();
        assert!(entry.hatch.is_none());
        assert!(entry.shadow.is_none());
        assert!(entry.walls.is_some());
        // No water paths: nothing visible to fill
        assert!(entry.water_fill.is_none());
    }

    #[test]
    fn test_frame_padding_uses_largest_reach() {
        let mut style = Style::default();
        style.corridor_width = 10.0;
        style.wall.width = 1.0;
        style.hatch.enabled = false;
        style.shadow.length = 33.2;
        assert_eq!(frame_padding(&style), 34.0);
    }
}
