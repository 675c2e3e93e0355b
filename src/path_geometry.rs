//! Corridor geometry from raw polylines
//!
//! Turns an author's polyline plus shape parameters into either a smoothed
//! centerline (stroked later with round caps) or a closed polygon whose two
//! rails carry procedural "teeth" for a rough-hewn corridor.
//!
//! Jagged corridors are built in five steps:
//! 1. resample the smoothed centerline into evenly spaced stations
//! 2. generate an independent stream of tooth events for each rail
//! 3. evaluate each rail's displacement per station (max of overlapping teeth,
//!    damped on tight turns, faded to zero at both ends)
//! 4. offset stations along their normals and stitch left + reversed right
//! 5. strip short edges and needle spikes, then cap the vertex count
//!
//! Output is a pure function of `(points, settings, width, seed)`.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geometry::{polyline_length, Point};
use crate::model::RawShapeSettings;
use crate::seeds::{derive_seed, derive_seed_indexed, hash_points, rng_from_seed};

/// Consecutive input points closer than this are collapsed
pub const MIN_POINT_SPACING: f64 = 1e-3;

const SMOOTH_POINT_BUDGET: usize = 1200;
const SMOOTH_PREVIEW_BUDGET: usize = 300;
const JAGGED_POINT_BUDGET: usize = 2400;
const JAGGED_PREVIEW_BUDGET: usize = 600;

/// Station spacing as a fraction of corridor width
const STATION_STEP: f64 = 0.12;
const STATION_STEP_PREVIEW: f64 = 0.24;
const MAX_STATIONS: usize = 4000;

/// Upper bound on tooth events per rail
const MAX_TEETH: usize = 20_000;
/// How strongly centerline curvature suppresses teeth
const CURVATURE_DAMPING: f64 = 0.8;
const MIN_DAMPING: f64 = 0.2;

// =============================================================================
// SHAPE SETTINGS
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeMode {
    #[default]
    Smooth,
    Jagged,
}

/// Normalized, clamped shape parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeSettings {
    pub shape_mode: ShapeMode,
    /// `[0, 1]`
    pub smoothness: f64,
    /// `[0, 3.5]`
    pub amplitude: f64,
    /// `[0.4, 2.4]`
    pub frequency: f64,
}

impl Default for ShapeSettings {
    fn default() -> Self {
        Self {
            shape_mode: ShapeMode::Smooth,
            smoothness: 0.5,
            amplitude: 1.0,
            frequency: 1.0,
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn parse_mode(text: &str) -> Option<ShapeMode> {
    match text.trim().to_ascii_lowercase().as_str() {
        "smooth" => Some(ShapeMode::Smooth),
        "jagged" => Some(ShapeMode::Jagged),
        _ => None,
    }
}

fn parse_legacy_mode(text: &str) -> Option<ShapeMode> {
    match text.trim().to_ascii_lowercase().as_str() {
        "jagged" | "rough" | "cave" | "natural" => Some(ShapeMode::Jagged),
        "smooth" | "straight" | "clean" => Some(ShapeMode::Smooth),
        _ => None,
    }
}

impl ShapeSettings {
    /// Resolve stored fields with precedence explicit → legacy name →
    /// derived-from-legacy-spacing → default, then clamp.
    pub fn normalize(raw: &RawShapeSettings) -> ShapeSettings {
        let d = ShapeSettings::default();

        let shape_mode = raw
            .shape_mode
            .as_deref()
            .and_then(parse_mode)
            .or_else(|| raw.style.as_deref().and_then(parse_legacy_mode))
            .unwrap_or(d.shape_mode);

        let smoothness = finite(raw.smoothness)
            .or(finite(raw.smoothing))
            .unwrap_or(d.smoothness)
            .clamp(0.0, 1.0);

        let amplitude = finite(raw.amplitude)
            .or(finite(raw.roughness).map(|r| r * 3.5))
            .unwrap_or(d.amplitude)
            .clamp(0.0, 3.5);

        let frequency = finite(raw.frequency)
            .or(finite(raw.jag_frequency))
            .or(finite(raw.tooth_spacing).filter(|s| *s > 0.0).map(|s| 1.2 / s))
            .unwrap_or(d.frequency)
            .clamp(0.4, 2.4);

        ShapeSettings {
            shape_mode,
            smoothness,
            amplitude,
            frequency,
        }
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    /// Open centerline, to be stroked at the corridor width
    Stroke,
    /// Closed corridor outline, to be filled
    Polygon,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderedGeometry {
    pub kind: GeometryKind,
    pub points: Vec<Point>,
    /// Smoothed centerline the polygon was built around
    pub centerline: Option<Vec<Point>>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOptions {
    pub width: f64,
    pub seed: Option<u64>,
    pub preview: bool,
    pub point_budget: Option<usize>,
}

impl RenderOptions {
    pub fn new(width: f64) -> Self {
        Self {
            width,
            seed: None,
            preview: false,
            point_budget: None,
        }
    }
}

/// Build renderable geometry for a path. Never fails: fewer than two usable
/// points come back as a stroke of whatever survived sanitization.
pub fn render_geometry(
    points: &[Point],
    settings: &ShapeSettings,
    options: &RenderOptions,
) -> RenderedGeometry {
    let pts = sanitize_points(points);
    if pts.len() < 2 {
        return RenderedGeometry {
            kind: GeometryKind::Stroke,
            points: pts,
            centerline: None,
        };
    }

    let width = if options.width.is_finite() && options.width > 0.0 {
        options.width
    } else {
        1.0
    };
    let seed = options.seed.unwrap_or_else(|| hash_points(&pts));

    match settings.shape_mode {
        ShapeMode::Smooth => {
            let budget = options.point_budget.unwrap_or(if options.preview {
                SMOOTH_PREVIEW_BUDGET
            } else {
                SMOOTH_POINT_BUDGET
            });
            RenderedGeometry {
                kind: GeometryKind::Stroke,
                points: smooth_centerline(&pts, width, settings.smoothness, budget),
                centerline: None,
            }
        }
        ShapeMode::Jagged => {
            let budget = options.point_budget.unwrap_or(if options.preview {
                JAGGED_PREVIEW_BUDGET
            } else {
                JAGGED_POINT_BUDGET
            });
            let centerline = smooth_centerline(&pts, width, settings.smoothness, usize::MAX);
            let rails = jagged_rails(&centerline, settings, width, seed, options.preview);
            let thresholds = CleanupThresholds::for_width(width, options.preview);
            let cleaned = cleanup_polygon(rails.polygon(), &thresholds);
            RenderedGeometry {
                kind: GeometryKind::Polygon,
                points: limit_point_count(&cleaned, budget),
                centerline: Some(centerline),
            }
        }
    }
}

// =============================================================================
// SANITIZING AND SMOOTHING
// =============================================================================

/// Drop non-finite points and collapse near-duplicates
pub fn sanitize_points(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for p in points.iter().filter(|p| p.is_finite()) {
        match out.last() {
            Some(last) if last.distance(*p) < MIN_POINT_SPACING => {}
            _ => out.push(*p),
        }
    }
    out
}

/// Centerline smoothing. Zero smoothness returns the input untouched (apart
/// from the point budget); endpoints are always preserved exactly.
pub fn smooth_centerline(points: &[Point], width: f64, smoothness: f64, budget: usize) -> Vec<Point> {
    if smoothness <= 0.0 || points.len() < 3 {
        return limit_point_count(points, budget);
    }

    let min_dist = width * smoothness * 0.35;
    let mut out = simplify_by_distance(points, min_dist);

    let passes = if smoothness > 0.5 { 2 } else { 1 };
    for _ in 0..passes {
        out = chaikin_open(&out);
    }

    limit_point_count(&out, budget)
}

/// Keep points at least `min_dist` apart. First and last are always kept.
pub fn simplify_by_distance(points: &[Point], min_dist: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let last = points[points.len() - 1];
    let mut out = vec![points[0]];

    for &p in &points[1..points.len() - 1] {
        if let Some(prev) = out.last() {
            if prev.distance(p) >= min_dist && p.distance(last) >= min_dist * 0.5 {
                out.push(p);
            }
        }
    }
    out.push(last);
    out
}

/// One pass of Chaikin corner cutting on an open polyline
pub fn chaikin_open(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut out = Vec::with_capacity(points.len() * 2);
    out.push(points[0]);
    for w in points.windows(2) {
        out.push(w[0].lerp(w[1], 0.25));
        out.push(w[0].lerp(w[1], 0.75));
    }
    out.push(points[points.len() - 1]);
    out
}

/// Cap the number of points by uniform index resampling.
/// First and last points are kept exactly.
pub fn limit_point_count(points: &[Point], max_points: usize) -> Vec<Point> {
    let len = points.len();
    if max_points < 2 || len <= max_points {
        return points.to_vec();
    }
    let span = max_points - 1;
    (0..max_points)
        .map(|i| points[(i * (len - 1) + span / 2) / span])
        .collect()
}

// =============================================================================
// STATIONS
// =============================================================================

/// A sample along the resampled centerline
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Station {
    pub position: Point,
    pub tangent: Point,
    pub normal: Point,
    /// Arc length from the start of the centerline
    pub arc: f64,
}

/// Resample at (approximately) uniform arc-length spacing. The last station
/// sits exactly at the end of the centerline with `arc == total length`.
pub fn resample_stations(centerline: &[Point], step: f64) -> Vec<Station> {
    if centerline.len() < 2 {
        return Vec::new();
    }
    let total = polyline_length(centerline);
    let step = if step.is_finite() && step > 0.0 { step } else { total.max(1e-9) };
    let count = ((total / step).ceil() as usize + 1).clamp(2, MAX_STATIONS);

    let mut positions = Vec::with_capacity(count);
    let mut arcs = Vec::with_capacity(count);
    let mut seg = 0usize;
    let mut seg_start_arc = 0.0;

    for i in 0..count {
        let s = if i == count - 1 {
            total
        } else {
            total * i as f64 / (count - 1) as f64
        };

        while seg < centerline.len() - 2 {
            let seg_len = centerline[seg].distance(centerline[seg + 1]);
            if seg_start_arc + seg_len >= s {
                break;
            }
            seg_start_arc += seg_len;
            seg += 1;
        }

        let a = centerline[seg];
        let b = centerline[seg + 1];
        let seg_len = a.distance(b);
        let t = if seg_len > 1e-12 {
            ((s - seg_start_arc) / seg_len).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let position = if i == 0 {
            centerline[0]
        } else if i == count - 1 {
            centerline[centerline.len() - 1]
        } else {
            a.lerp(b, t)
        };
        positions.push(position);
        arcs.push(s);
    }

    let fallback = centerline[1]
        .sub(centerline[0])
        .normalized()
        .unwrap_or(Point::new(1.0, 0.0));

    (0..count)
        .map(|i| {
            let prev = if i > 0 { positions[i - 1] } else { positions[i] };
            let next = if i + 1 < count { positions[i + 1] } else { positions[i] };
            let tangent = next.sub(prev).normalized().unwrap_or(fallback);
            Station {
                position: positions[i],
                tangent,
                normal: tangent.perp(),
                arc: arcs[i],
            }
        })
        .collect()
}

// =============================================================================
// TOOTH EVENTS
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToothProfile {
    /// Sharp triangular point
    Peak,
    /// Flat top with soft shoulders
    Plateau,
    /// Rounded, slightly shallower bump
    Blunt,
}

impl ToothProfile {
    /// Height at normalized distance `u` from the tooth center (`u` in `[0, 1]`)
    pub fn height(self, u: f64) -> f64 {
        let u = u.clamp(0.0, 1.0);
        match self {
            ToothProfile::Peak => 1.0 - u,
            ToothProfile::Plateau => {
                if u < 0.45 {
                    1.0
                } else {
                    1.0 - smoothstep(0.45, 1.0, u)
                }
            }
            ToothProfile::Blunt => 0.8 * 0.5 * (1.0 + (std::f64::consts::PI * u).cos()),
        }
    }
}

/// A localized displacement pulse along one rail
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToothEvent {
    /// Arc position of the tooth center
    pub center: f64,
    pub half_width: f64,
    pub depth: f64,
    pub profile: ToothProfile,
}

#[derive(Clone, Copy, Debug)]
struct ClusterParams {
    density: f64,
    width: f64,
    depth: f64,
}

fn cluster_params(stream_seed: u64, cluster: i64) -> ClusterParams {
    let mut rng = rng_from_seed(derive_seed_indexed(&[stream_seed, cluster as u64]));
    ClusterParams {
        density: rng.gen_range(0.6..1.6),
        width: rng.gen_range(0.7..1.3),
        depth: rng.gen_range(0.5..1.4),
    }
}

/// Generate the tooth stream of one rail. Events come out sorted by `center`.
pub fn tooth_events(
    length: f64,
    rail_half_width: f64,
    settings: &ShapeSettings,
    stream_seed: u64,
) -> Vec<ToothEvent> {
    if settings.amplitude <= 0.0 || !(length > 0.0) || !(rail_half_width > 0.0) {
        return Vec::new();
    }

    let mut rng = rng_from_seed(stream_seed);
    let base_spacing = (rail_half_width * 0.9 / settings.frequency.max(0.4)).max(0.5);
    let cluster_span = base_spacing * 5.0;

    let mut events = Vec::new();
    let mut pos = rng.gen_range(0.0..base_spacing) * 0.5;
    let mut current: Option<(i64, ClusterParams)> = None;

    while pos <= length + base_spacing && events.len() < MAX_TEETH {
        let cluster = (pos / cluster_span).floor() as i64;
        let params = match current {
            Some((idx, p)) if idx == cluster => p,
            _ => {
                let p = cluster_params(stream_seed, cluster);
                current = Some((cluster, p));
                p
            }
        };

        let half_width = base_spacing * 0.55 * params.width * rng.gen_range(0.6..1.25);
        let depth = rail_half_width * 0.22 * settings.amplitude * params.depth * rng.gen_range(0.4..1.0);
        let roll: f64 = rng.gen();
        let profile = if roll < 0.45 {
            ToothProfile::Peak
        } else if roll < 0.8 {
            ToothProfile::Plateau
        } else {
            ToothProfile::Blunt
        };

        events.push(ToothEvent {
            center: pos,
            half_width,
            depth,
            profile,
        });

        pos += base_spacing * rng.gen_range(0.6..1.4) / params.density;
    }

    events
}

/// Rail displacement at arc position `s`: the largest tooth reaching it.
/// Overlapping teeth do not stack.
pub fn displacement_at(events: &[ToothEvent], max_half_width: f64, s: f64) -> f64 {
    let start = events.partition_point(|e| e.center < s - max_half_width);
    let mut best = 0.0f64;
    for e in &events[start..] {
        if e.center > s + max_half_width {
            break;
        }
        let dist = (s - e.center).abs();
        if dist < e.half_width {
            best = best.max(e.depth * e.profile.height(dist / e.half_width));
        }
    }
    best
}

fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    if edge1 <= edge0 {
        return if x >= edge1 { 1.0 } else { 0.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// 0 at either end of the path, ramping to 1 over `fade_len`
pub fn end_fade(s: f64, total: f64, fade_len: f64) -> f64 {
    let d = s.min(total - s);
    if d <= 0.0 {
        return 0.0;
    }
    smoothstep(0.0, fade_len, d)
}

/// Per-station damping factor in `[MIN_DAMPING, 1]`, lower on tight turns
pub fn curvature_damping(stations: &[Station], rail_half_width: f64) -> Vec<f64> {
    let n = stations.len();
    (0..n)
        .map(|i| {
            let a = &stations[i.saturating_sub(1)];
            let b = &stations[(i + 1).min(n - 1)];
            let ds = b.arc - a.arc;
            if ds <= 1e-9 {
                return 1.0;
            }
            let angle = a.tangent.dot(b.tangent).clamp(-1.0, 1.0).acos();
            let curvature = angle / ds;
            (1.0 - curvature * rail_half_width * CURVATURE_DAMPING).clamp(MIN_DAMPING, 1.0)
        })
        .collect()
}

// =============================================================================
// RAILS
// =============================================================================

/// Offsets of both corridor walls at every station
#[derive(Clone, Debug, PartialEq)]
pub struct JaggedRails {
    pub stations: Vec<Station>,
    pub half_width: f64,
    /// Distance of the left wall from the centerline (half width + teeth)
    pub left: Vec<f64>,
    /// Distance of the right wall from the centerline (half width + teeth)
    pub right: Vec<f64>,
}

impl JaggedRails {
    /// Left rail forward, then right rail backward
    pub fn polygon(&self) -> Vec<Point> {
        let left = self
            .stations
            .iter()
            .zip(&self.left)
            .map(|(st, &off)| st.position.add(st.normal.scale(off)));
        let right = self
            .stations
            .iter()
            .zip(&self.right)
            .rev()
            .map(|(st, &off)| st.position.sub(st.normal.scale(off)));
        left.chain(right).collect()
    }
}

pub fn jagged_rails(
    centerline: &[Point],
    settings: &ShapeSettings,
    width: f64,
    seed: u64,
    preview: bool,
) -> JaggedRails {
    let half_width = width * 0.5;
    let step_fraction = if preview { STATION_STEP_PREVIEW } else { STATION_STEP };
    let stations = resample_stations(centerline, (width * step_fraction).max(0.25));
    let total = stations.last().map(|s| s.arc).unwrap_or(0.0);

    let left_events = tooth_events(total, half_width, settings, derive_seed(seed, "left-rail"));
    let right_events = tooth_events(total, half_width, settings, derive_seed(seed, "right-rail"));
    let reach = |events: &[ToothEvent]| events.iter().map(|e| e.half_width).fold(0.0, f64::max);
    let (left_reach, right_reach) = (reach(&left_events), reach(&right_events));

    let damping = curvature_damping(&stations, half_width);

    let mut left = Vec::with_capacity(stations.len());
    let mut right = Vec::with_capacity(stations.len());
    for (st, &damp) in stations.iter().zip(&damping) {
        let fade = end_fade(st.arc, total, half_width);
        if fade <= 0.0 {
            left.push(half_width);
            right.push(half_width);
            continue;
        }
        let dl = displacement_at(&left_events, left_reach, st.arc);
        let dr = displacement_at(&right_events, right_reach, st.arc);
        left.push(half_width + dl * damp * fade);
        right.push(half_width + dr * damp * fade);
    }

    JaggedRails {
        stations,
        half_width,
        left,
        right,
    }
}

// =============================================================================
// CLEANUP
// =============================================================================

/// Thresholds for polygon cleanup; tuned separately for preview and full quality
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CleanupThresholds {
    pub min_segment: f64,
    pub spike_area: f64,
    pub max_passes: usize,
}

impl CleanupThresholds {
    pub fn for_width(width: f64, preview: bool) -> Self {
        if preview {
            Self {
                min_segment: width * 0.06,
                spike_area: width * width * 0.004,
                max_passes: 2,
            }
        } else {
            Self {
                min_segment: width * 0.03,
                spike_area: width * width * 0.0015,
                max_passes: 4,
            }
        }
    }
}

/// Remove short edges and needle spikes from a closed ring, never going below 4 vertices
pub fn cleanup_polygon(mut ring: Vec<Point>, thresholds: &CleanupThresholds) -> Vec<Point> {
    for _ in 0..thresholds.max_passes {
        let before = ring.len();
        ring = remove_short_segments(&ring, thresholds.min_segment);
        ring = remove_needles(&ring, thresholds.spike_area, thresholds.min_segment);
        if ring.len() == before {
            break;
        }
    }
    ring
}

fn remove_short_segments(ring: &[Point], min_segment: f64) -> Vec<Point> {
    if ring.len() <= 4 {
        return ring.to_vec();
    }
    let mut budget = ring.len() - 4;
    let mut out: Vec<Point> = Vec::with_capacity(ring.len());
    for &p in ring {
        match out.last() {
            Some(last) if budget > 0 && last.distance(p) < min_segment => budget -= 1,
            _ => out.push(p),
        }
    }
    // Closing edge
    if out.len() > 4 && out[out.len() - 1].distance(out[0]) < min_segment {
        out.pop();
    }
    out
}

fn remove_needles(ring: &[Point], spike_area: f64, min_segment: f64) -> Vec<Point> {
    let n = ring.len();
    if n <= 4 {
        return ring.to_vec();
    }
    let mut keep = vec![true; n];
    let mut kept = n;
    let mut prev = n - 1;

    for i in 0..n {
        if kept <= 4 {
            break;
        }
        let a = ring[prev];
        let b = ring[i];
        let c = ring[(i + 1) % n];

        let ab = a.distance(b);
        let bc = b.distance(c);
        let ac = a.distance(c);
        let area = b.sub(a).cross(c.sub(a)).abs() * 0.5;
        let height = if ac > 1e-12 { 2.0 * area / ac } else { ab.max(bc) };

        let needle = ac < 0.3 * (ab + bc);
        if area < spike_area && (needle || height < min_segment) {
            keep[i] = false;
            kept -= 1;
        } else {
            prev = i;
        }
    }

    ring.iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jagged(amplitude: f64, frequency: f64) -> ShapeSettings {
        ShapeSettings {
            shape_mode: ShapeMode::Jagged,
            smoothness: 0.4,
            amplitude,
            frequency,
        }
    }

    fn zigzag() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(120.0, 10.0),
            Point::new(200.0, 90.0),
            Point::new(260.0, 60.0),
        ]
    }

    #[test]
    fn test_sanitize_drops_nan_and_duplicates() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0005),
            Point::new(f64::NAN, 1.0),
            Point::new(5.0, 0.0),
        ];
        assert_eq!(sanitize_points(&pts), vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0)]);
    }

    #[test]
    fn test_malformed_input_is_degenerate_stroke() {
        let out = render_geometry(
            &[Point::new(3.0, 4.0)],
            &jagged(1.0, 1.0),
            &RenderOptions::new(20.0),
        );
        assert_eq!(out.kind, GeometryKind::Stroke);
        assert_eq!(out.points, vec![Point::new(3.0, 4.0)]);
    }

    #[test]
    fn test_zero_smoothness_keeps_points() {
        let pts = zigzag();
        let settings = ShapeSettings {
            smoothness: 0.0,
            ..ShapeSettings::default()
        };
        let out = render_geometry(&pts, &settings, &RenderOptions::new(30.0));
        assert_eq!(out.kind, GeometryKind::Stroke);
        assert_eq!(out.points, pts);
    }

    #[test]
    fn test_smoothing_keeps_endpoints() {
        let pts = zigzag();
        let out = smooth_centerline(&pts, 30.0, 1.0, 1000);
        assert_eq!(out.first(), pts.first());
        assert_eq!(out.last(), pts.last());
        assert!(out.len() > pts.len());
    }

    #[test]
    fn test_limit_point_count() {
        let pts: Vec<Point> = (0..100).map(|i| Point::new(i as f64, 0.0)).collect();
        let limited = limit_point_count(&pts, 7);
        assert_eq!(limited.len(), 7);
        assert_eq!(limited[0], pts[0]);
        assert_eq!(limited[6], pts[99]);
        assert_eq!(limit_point_count(&pts, 500).len(), 100);
    }

    #[test]
    fn test_normalize_precedence_and_clamping() {
        let raw = RawShapeSettings {
            style: Some("rough".into()),
            smoothing: Some(0.2),
            roughness: Some(0.5),
            tooth_spacing: Some(0.1),
            ..RawShapeSettings::default()
        };
        let s = ShapeSettings::normalize(&raw);
        assert_eq!(s.shape_mode, ShapeMode::Jagged);
        assert_eq!(s.smoothness, 0.2);
        assert_eq!(s.amplitude, 1.75);
        // 1.2 / 0.1 = 12 → clamped
        assert_eq!(s.frequency, 2.4);

        let explicit = RawShapeSettings {
            shape_mode: Some("smooth".into()),
            style: Some("jagged".into()),
            amplitude: Some(f64::NAN),
            roughness: Some(0.2),
            frequency: Some(0.1),
            ..RawShapeSettings::default()
        };
        let s = ShapeSettings::normalize(&explicit);
        assert_eq!(s.shape_mode, ShapeMode::Smooth);
        assert!((s.amplitude - 0.7).abs() < 1e-12);
        assert_eq!(s.frequency, 0.4);
        assert_eq!(s.smoothness, 0.5);
    }

    #[test]
    fn test_stations_span_full_length() {
        let line = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        let stations = resample_stations(&line, 1.0);
        assert_eq!(stations.first().unwrap().position, line[0]);
        assert_eq!(stations.last().unwrap().position, line[2]);
        assert_eq!(stations.last().unwrap().arc, 20.0);
        assert!((stations[2].tangent.x - 1.0).abs() < 1e-9);
        assert!((stations[2].normal.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rail_ends_are_nominal_half_width() {
        let settings = jagged(3.5, 2.4);
        let centerline = smooth_centerline(&zigzag(), 30.0, settings.smoothness, usize::MAX);
        let rails = jagged_rails(&centerline, &settings, 30.0, 99, false);
        let n = rails.left.len();
        assert_eq!(rails.left[0], 15.0);
        assert_eq!(rails.right[0], 15.0);
        assert_eq!(rails.left[n - 1], 15.0);
        assert_eq!(rails.right[n - 1], 15.0);
        // Somewhere in the middle the walls are displaced
        assert!(rails.left.iter().any(|&o| o > 15.0 + 1e-6));
        assert!(rails.left.iter().chain(&rails.right).all(|&o| o >= 15.0));
    }

    #[test]
    fn test_zero_amplitude_is_plain_corridor() {
        let centerline = vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)];
        let rails = jagged_rails(&centerline, &jagged(0.0, 1.0), 20.0, 1, false);
        assert!(rails.left.iter().chain(&rails.right).all(|&o| o == 10.0));
    }

    #[test]
    fn test_jagged_polygon_closed_and_deterministic() {
        let opts = RenderOptions {
            seed: Some(7),
            ..RenderOptions::new(24.0)
        };
        let a = render_geometry(&zigzag(), &jagged(2.0, 1.2), &opts);
        let b = render_geometry(&zigzag(), &jagged(2.0, 1.2), &opts);
        assert_eq!(a.kind, GeometryKind::Polygon);
        assert!(a.points.len() >= 3);
        assert_eq!(a, b);

        let other = render_geometry(
            &zigzag(),
            &jagged(2.0, 1.2),
            &RenderOptions {
                seed: Some(8),
                ..opts
            },
        );
        assert_ne!(a.points, other.points);
    }

    #[test]
    fn test_preview_polygon_within_budget() {
        let opts = RenderOptions {
            seed: Some(7),
            preview: true,
            ..RenderOptions::new(24.0)
        };
        let a = render_geometry(&zigzag(), &jagged(3.5, 2.4), &opts);
        let b = render_geometry(&zigzag(), &jagged(3.5, 2.4), &opts);
        assert_eq!(a.kind, GeometryKind::Polygon);
        assert_eq!(a, b);
        assert!(a.points.len() >= 3 && a.points.len() <= JAGGED_PREVIEW_BUDGET);
        assert_ne!(a.points.first(), a.points.last());


        let coarse = CleanupThresholds::for_width(24.0, true);
        let fine = CleanupThresholds::for_width(24.0, false);
        assert!(coarse.min_segment > fine.min_segment);
        assert!(coarse.spike_area > fine.spike_area);
        assert!(coarse.max_passes < fine.max_passes);
    }

    #[test]
    fn test_curvature_damping_lower_on_turns() {
        let corner = [Point::new(0.0, 0.0), Point::new(100.0, 0.0), Point::new(100.0, 100.0)];
        let stations = resample_stations(&corner, 2.0);
        let damping = curvature_damping(&stations, 10.0);
        assert_eq!(damping.len(), stations.len());

        assert!((damping[0] - 1.0).abs() < 1e-9);
        assert!((damping[damping.len() - 1] - 1.0).abs() < 1e-9);
        let turn = damping.iter().cloned().fold(f64::INFINITY, f64::min);
        assert!((turn - MIN_DAMPING).abs() < 1e-9);
        assert!(damping.iter().all(|&d| (MIN_DAMPING..=1.0).contains(&d)));

        let straight = resample_stations(&[Point::new(0.0, 0.0), Point::new(100.0, 0.0)], 2.0);
        assert!(curvature_damping(&straight, 10.0).iter().all(|&d| (d - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_short_jagged_path_still_polygon() {
        let pts = [Point::new(0.0, 0.0), Point::new(0.01, 0.0)];
        let out = render_geometry(&pts, &jagged(3.0, 2.0), &RenderOptions::new(40.0));
        assert_eq!(out.kind, GeometryKind::Polygon);
        assert!(out.points.len() >= 3);
    }

    #[test]
    fn test_teeth_do_not_stack() {
        let events = [
            ToothEvent { center: 10.0, half_width: 5.0, depth: 2.0, profile: ToothProfile::Plateau },
            ToothEvent { center: 10.5, half_width: 5.0, depth: 3.0, profile: ToothProfile::Plateau },
        ];
        assert_eq!(displacement_at(&events, 5.0, 10.2), 3.0);
        assert_eq!(displacement_at(&events, 5.0, 30.0), 0.0);
    }

    #[test]
    fn test_end_fade_zero_at_ends() {
        assert_eq!(end_fade(0.0, 50.0, 10.0), 0.0);
        assert_eq!(end_fade(50.0, 50.0, 10.0), 0.0);
        assert_eq!(end_fade(25.0, 50.0, 10.0), 1.0);
    }

    #[test]
    fn test_cleanup_removes_needle() {
        let mut ring = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(20.05, 8.0),
            Point::new(20.1, 0.0),
            Point::new(30.0, 0.0),
            Point::new(30.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        let thresholds = CleanupThresholds {
            min_segment: 0.5,
            spike_area: 1.0,
            max_passes: 4,
        };
        ring = cleanup_polygon(ring, &thresholds);
        assert!(!ring.contains(&Point::new(20.05, 8.0)));
        assert!(ring.len() >= 4);
    }
}
