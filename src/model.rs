//! Dungeon model read by the compile pipeline
//!
//! Collaborators own and mutate the `Dungeon`; the pipeline only reads it.
//! Each primitive carries a `seq` that decides paint order across all
//! collections, and collaborators bump `versions` whenever the primitives of a
//! domain change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::geometry::{Bounds, Point};

/// Version domain bumped when spaces, shapes or corridor paths change
pub const INTERIOR_DOMAIN: &str = "interior";
/// Version domain bumped when water paths change
pub const WATER_DOMAIN: &str = "water";

// =============================================================================
// PRIMITIVES
// =============================================================================

/// How a primitive combines with everything painted before it
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Add,
    Subtract,
}

/// Closed polygon region. Used for both rooms (`Space`) and freeform `Shape`s.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionPrimitive {
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default)]
    pub mode: Mode,
    pub polygon: Vec<Point>,
}

pub type Space = RegionPrimitive;
pub type Shape = RegionPrimitive;

/// Shape parameters exactly as collaborators stored them, including the legacy
/// field names older maps still carry. Normalized by `ShapeSettings::normalize`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawShapeSettings {
    /// `"smooth"` or `"jagged"`
    pub shape_mode: Option<String>,
    /// Legacy mode name (`"jagged"`, `"rough"`, `"smooth"`, ...)
    pub style: Option<String>,
    pub smoothness: Option<f64>,
    /// Legacy name for `smoothness`
    pub smoothing: Option<f64>,
    pub amplitude: Option<f64>,
    /// Legacy 0..1 amplitude
    pub roughness: Option<f64>,
    pub frequency: Option<f64>,
    /// Legacy name for `frequency`
    pub jag_frequency: Option<f64>,
    /// Legacy tooth spacing; frequency is derived from it when nothing else is set
    pub tooth_spacing: Option<f64>,
}

/// Open polyline stroked into a corridor. Used for `Path` and `WaterPath`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathPrimitive {
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default)]
    pub mode: Mode,
    pub points: Vec<Point>,
    /// Corridor width; falls back to `Style::corridor_width` when absent or not positive
    #[serde(default)]
    pub width: Option<f64>,
    /// Explicit seed for procedural walls; hashed from `points` when absent
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(flatten)]
    pub shape: RawShapeSettings,
}

pub type Path = PathPrimitive;
pub type WaterPath = PathPrimitive;

impl PathPrimitive {
    /// Effective stroke width after fallback
    pub fn effective_width(&self, default_width: f64) -> f64 {
        match self.width {
            Some(w) if w.is_finite() && w > 0.0 => w,
            _ => default_width,
        }
    }
}

/// Borrowed view over any primitive variant
#[derive(Clone, Copy, Debug)]
pub enum Primitive<'a> {
    Space(&'a Space),
    Shape(&'a Shape),
    Path(&'a Path),
    WaterPath(&'a WaterPath),
}

impl<'a> Primitive<'a> {
    pub fn seq(&self) -> Option<u64> {
        match self {
            Primitive::Space(p) | Primitive::Shape(p) => p.seq,
            Primitive::Path(p) | Primitive::WaterPath(p) => p.seq,
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Primitive::Space(p) | Primitive::Shape(p) => p.mode,
            Primitive::Path(p) | Primitive::WaterPath(p) => p.mode,
        }
    }

    /// Polygons need 3 finite vertices, paths need 2
    pub fn is_degenerate(&self) -> bool {
        let finite = |pts: &[Point]| pts.iter().filter(|p| p.is_finite()).count();
        match self {
            Primitive::Space(p) | Primitive::Shape(p) => finite(&p.polygon) < 3,
            Primitive::Path(p) | Primitive::WaterPath(p) => finite(&p.points) < 2,
        }
    }

    /// World extent including stroke half-width (and jagged tooth reach) for paths
    pub fn extent(&self, default_width: f64) -> Option<Bounds> {
        match self {
            Primitive::Space(p) | Primitive::Shape(p) => Bounds::from_points(&p.polygon),
            Primitive::Path(p) | Primitive::WaterPath(p) => {
                let width = p.effective_width(default_width);
                // Teeth can push a rail out by roughly one more half width
                let reach = width * 0.5 * 2.2;
                Bounds::from_points(&p.points).map(|b| b.pad(reach))
            }
        }
    }
}

// =============================================================================
// STYLE
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallStyle {
    pub color: Color,
    /// World units
    pub width: f64,
}

impl Default for WallStyle {
    fn default() -> Self {
        Self {
            color: Color::from_rgb8(0x1f, 0x1a, 0x17),
            width: 6.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowStyle {
    pub enabled: bool,
    /// Direction the shadow falls, any length
    pub direction: Point,
    /// World units
    pub length: f64,
    pub opacity: f64,
    pub color: Color,
}

impl Default for ShadowStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            direction: Point::new(1.0, 1.0),
            length: 10.0,
            opacity: 0.3,
            color: Color::BLACK,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HatchStyle {
    pub enabled: bool,
    /// Strokes per world unit of wall
    pub density: f64,
    pub opacity: f64,
    pub color: Color,
    /// Maximum offset from the wall to either side (world units)
    pub depth: f64,
    /// Constant outward offset added to every stroke (world units)
    pub inset: f64,
    pub min_length: f64,
    pub max_length: f64,
    /// Maximum deviation from the wall direction, degrees
    pub angle_range: f64,
}

impl Default for HatchStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            density: 0.6,
            opacity: 0.6,
            color: Color::from_rgb8(0x2b, 0x25, 0x22),
            depth: 10.0,
            inset: 0.0,
            min_length: 3.0,
            max_length: 8.0,
            angle_range: 20.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterStyle {
    pub enabled: bool,
    pub color: Color,
    pub opacity: f64,
    pub outline_enabled: bool,
    pub outline_color: Color,
    /// World units
    pub outline_width: f64,
    pub ripples_enabled: bool,
    pub ripple_color: Color,
    /// Voronoi cell size, world units
    pub ripple_scale: f64,
    pub seam_strength: f64,
    pub sparkle_density: f64,
    /// Darkening strength of the band along the water edge
    pub depth_shading: f64,
    /// Strength of the soft core glow
    pub glow: f64,
}

impl Default for WaterStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            color: Color::from_rgb8(0x3a, 0x7b, 0xd5),
            opacity: 0.9,
            outline_enabled: true,
            outline_color: Color::from_rgb8(0x1d, 0x3f, 0x6e),
            outline_width: 2.0,
            ripples_enabled: true,
            ripple_color: Color::from_rgb8(0xbf, 0xe9, 0xff),
            ripple_scale: 14.0,
            seam_strength: 0.55,
            sparkle_density: 0.6,
            depth_shading: 0.35,
            glow: 0.35,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridStyle {
    pub enabled: bool,
    /// World units between grid lines
    pub size: f64,
    pub opacity: f64,
    pub color: Color,
}

impl Default for GridStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            size: 50.0,
            opacity: 0.12,
            color: Color::from_rgb8(0x6b, 0x5e, 0x4f),
        }
    }
}

/// Global drawing configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    pub wall: WallStyle,
    pub shadow: ShadowStyle,
    pub hatch: HatchStyle,
    pub water: WaterStyle,
    /// Default corridor width for paths without their own
    pub corridor_width: f64,
    pub floor_color: Color,
    pub paper_color: Color,
    pub grid: GridStyle,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            wall: WallStyle::default(),
            shadow: ShadowStyle::default(),
            hatch: HatchStyle::default(),
            water: WaterStyle::default(),
            corridor_width: 40.0,
            floor_color: Color::from_rgb8(0xf3, 0xea, 0xd7),
            paper_color: Color::from_rgb8(0xd9, 0xcd, 0xb4),
            grid: GridStyle::default(),
        }
    }
}

/// Finite value clamped into `[lo, hi]`, or `fallback` when not finite
fn sane(value: f64, fallback: f64, lo: f64, hi: f64) -> f64 {
    if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        fallback
    }
}

impl Style {
    /// Copy with every numeric field finite and inside its documented range
    pub fn sanitized(&self) -> Style {
        let d = Style::default();
        let mut s = self.clone();

        s.corridor_width = sane(s.corridor_width, d.corridor_width, 0.5, 1.0e4);
        s.wall.width = sane(s.wall.width, d.wall.width, 0.0, 1.0e3);

        s.shadow.length = sane(s.shadow.length, d.shadow.length, 0.0, 1.0e3);
        s.shadow.opacity = sane(s.shadow.opacity, d.shadow.opacity, 0.0, 1.0);
        if !s.shadow.direction.is_finite() {
            s.shadow.direction = d.shadow.direction;
        }

        let h = &mut s.hatch;
        h.density = sane(h.density, d.hatch.density, 0.0, 10.0);
        h.opacity = sane(h.opacity, d.hatch.opacity, 0.0, 1.0);
        h.depth = sane(h.depth, d.hatch.depth, 0.0, 1.0e3);
        h.inset = sane(h.inset, d.hatch.inset, -1.0e3, 1.0e3);
        h.min_length = sane(h.min_length, d.hatch.min_length, 0.0, 1.0e3);
        h.max_length = sane(h.max_length, d.hatch.max_length, 0.0, 1.0e3);
        if h.min_length > h.max_length {
            std::mem::swap(&mut h.min_length, &mut h.max_length);
        }
        h.angle_range = sane(h.angle_range, d.hatch.angle_range, 0.0, 180.0);

        let w = &mut s.water;
        w.opacity = sane(w.opacity, d.water.opacity, 0.0, 1.0);
        w.outline_width = sane(w.outline_width, d.water.outline_width, 0.0, 100.0);
        w.ripple_scale = sane(w.ripple_scale, d.water.ripple_scale, 1.0, 1.0e3);
        w.seam_strength = sane(w.seam_strength, d.water.seam_strength, 0.0, 1.0);
        w.sparkle_density = sane(w.sparkle_density, d.water.sparkle_density, 0.0, 10.0);
        w.depth_shading = sane(w.depth_shading, d.water.depth_shading, 0.0, 1.0);
        w.glow = sane(w.glow, d.water.glow, 0.0, 1.0);

        s.grid.size = sane(s.grid.size, d.grid.size, 1.0, 1.0e4);
        s.grid.opacity = sane(s.grid.opacity, d.grid.opacity, 0.0, 1.0);
        s
    }
}

// =============================================================================
// DUNGEON
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dungeon {
    pub spaces: Vec<Space>,
    pub shapes: Vec<Shape>,
    pub paths: Vec<Path>,
    pub water_paths: Vec<WaterPath>,
    pub style: Style,
    /// Monotonic change counters per domain (`interior`, `water`, ...)
    pub versions: BTreeMap<String, u64>,
    /// Next `seq` handed out by the `add_*` helpers
    pub next_seq: u64,
}

impl Dungeon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self, domain: &str) -> u64 {
        self.versions.get(domain).copied().unwrap_or(0)
    }

    pub fn bump_version(&mut self, domain: &str) -> u64 {
        let v = self.versions.entry(domain.to_string()).or_insert(0);
        *v += 1;
        *v
    }

    fn take_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Add a room polygon, returning its `seq`
    pub fn add_space(&mut self, polygon: Vec<Point>, mode: Mode) -> u64 {
        let seq = self.take_seq();
        self.spaces.push(RegionPrimitive { seq: Some(seq), mode, polygon });
        self.bump_version(INTERIOR_DOMAIN);
        seq
    }

    /// Add a freeform shape polygon, returning its `seq`
    pub fn add_shape(&mut self, polygon: Vec<Point>, mode: Mode) -> u64 {
        let seq = self.take_seq();
        self.shapes.push(RegionPrimitive { seq: Some(seq), mode, polygon });
        self.bump_version(INTERIOR_DOMAIN);
        seq
    }

    /// Add a corridor path, returning its `seq`
    pub fn add_path(&mut self, mut path: Path) -> u64 {
        let seq = self.take_seq();
        path.seq = Some(seq);
        self.paths.push(path);
        self.bump_version(INTERIOR_DOMAIN);
        seq
    }

    /// Add a water path, returning its `seq`
    pub fn add_water_path(&mut self, mut path: WaterPath) -> u64 {
        let seq = self.take_seq();
        path.seq = Some(seq);
        self.water_paths.push(path);
        self.bump_version(WATER_DOMAIN);
        seq
    }

    /// Primitives that shape the interior mask, in stream order (spaces, shapes, paths)
    pub fn interior_primitives(&self) -> Vec<Primitive<'_>> {
        self.spaces
            .iter()
            .map(Primitive::Space)
            .chain(self.shapes.iter().map(Primitive::Shape))
            .chain(self.paths.iter().map(Primitive::Path))
            .collect()
    }

    pub fn water_primitives(&self) -> Vec<Primitive<'_>> {
        self.water_paths.iter().map(Primitive::WaterPath).collect()
    }

    /// Union extent of every non-degenerate primitive, `None` when there is no geometry
    pub fn content_bounds(&self) -> Option<Bounds> {
        let default_width = self.style.sanitized().corridor_width;
        self.interior_primitives()
            .into_iter()
            .chain(self.water_primitives())
            .filter(|p| !p.is_degenerate())
            .filter_map(|p| p.extent(default_width))
            .reduce(|a, b| a.union(b))
    }
}

/// Axis-aligned rectangle polygon helper
pub fn rect_polygon(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
    vec![
        Point::new(x0, y0),
        Point::new(x1, y0),
        Point::new(x1, y1),
        Point::new(x0, y1),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_assignment_is_monotonic_across_collections() {
        let mut d = Dungeon::new();
        let a = d.add_space(rect_polygon(0.0, 0.0, 10.0, 10.0), Mode::Add);
        let b = d.add_shape(rect_polygon(0.0, 0.0, 5.0, 5.0), Mode::Subtract);
        assert!(b > a);
        assert_eq!(d.version(INTERIOR_DOMAIN), 2);
        assert_eq!(d.version(WATER_DOMAIN), 0);
    }

    #[test]
    fn test_empty_dungeon_has_no_bounds() {
        let mut d = Dungeon::new();
        assert!(d.content_bounds().is_none());
        d.spaces.push(RegionPrimitive {
            seq: None,
            mode: Mode::Add,
            polygon: vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)],
        });
        assert!(d.content_bounds().is_none());
    }

    #[test]
    fn test_path_bounds_include_half_width() {
        let mut d = Dungeon::new();
        d.add_path(PathPrimitive {
            seq: None,
            mode: Mode::Add,
            points: vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)],
            width: Some(20.0),
            seed: None,
            shape: RawShapeSettings::default(),
        });
        let b = d.content_bounds().unwrap();
        assert!(b.min_y <= -10.0 && b.max_y >= 10.0);
        assert!(b.min_x <= -10.0);
    }

    #[test]
    fn test_style_deserializes_with_defaults() {
        let style: Style =
            serde_json::from_str(r##"{"wall": {"width": 3.5}, "hatch": {"color": "#ff0000"}}"##)
                .unwrap();
        assert_eq!(style.wall.width, 3.5);
        assert_eq!(style.wall.color, WallStyle::default().color);
        assert_eq!(style.hatch.color.to_hex(), "#ff0000");
        assert_eq!(style.corridor_width, 40.0);
    }

    #[test]
    fn test_sanitize_replaces_non_finite() {
        let mut style = Style::default();
        style.corridor_width = f64::NAN;
        style.hatch.min_length = 9.0;
        style.hatch.max_length = 2.0;
        style.shadow.opacity = 4.0;
        let s = style.sanitized();
        assert_eq!(s.corridor_width, 40.0);
        assert_eq!((s.hatch.min_length, s.hatch.max_length), (2.0, 9.0));
        assert_eq!(s.shadow.opacity, 1.0);
    }

    #[test]
    fn test_path_width_fallback() {
        let mut p = PathPrimitive {
            seq: None,
            mode: Mode::Add,
            points: vec![],
            width: Some(-3.0),
            seed: None,
            shape: RawShapeSettings::default(),
        };
        assert_eq!(p.effective_width(40.0), 40.0);
        p.width = Some(f64::INFINITY);
        assert_eq!(p.effective_width(40.0), 40.0);
        p.width = Some(12.0);
        assert_eq!(p.effective_width(40.0), 12.0);
    }

    #[test]
    fn test_legacy_shape_fields_flatten() {
        let path: PathPrimitive = serde_json::from_str(
            r#"{"points": [{"x": 0, "y": 0}, {"x": 1, "y": 0}], "style": "rough", "roughness": 0.5}"#,
        )
        .unwrap();
        assert_eq!(path.shape.style.as_deref(), Some("rough"));
        assert_eq!(path.shape.roughness, Some(0.5));
        assert_eq!(path.mode, Mode::Add);
    }
}
