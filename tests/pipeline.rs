//! End-to-end checks of the compile pipeline: dungeon in, cached layers and
//! world contours out.

use dungeon_mapper::contour::contours_from_alpha;
use dungeon_mapper::geometry::{Bounds, Point};
use dungeon_mapper::mask::{rasterize, RasterFrame};
use dungeon_mapper::model::{rect_polygon, Dungeon, Mode, PathPrimitive, RawShapeSettings, RegionPrimitive};
use dungeon_mapper::path_geometry::{
    jagged_rails, render_geometry, smooth_centerline, GeometryKind, RenderOptions, ShapeSettings,
};
use dungeon_mapper::world_cache::{CompileConfig, WorldCache};

fn config(ppu: f64) -> CompileConfig {
    CompileConfig {
        desired_ppu: ppu,
        ..CompileConfig::default()
    }
}

fn jagged(amplitude: f64, frequency: f64) -> RawShapeSettings {
    RawShapeSettings {
        shape_mode: Some("jagged".into()),
        amplitude: Some(amplitude),
        frequency: Some(frequency),
        ..RawShapeSettings::default()
    }
}

fn cave_dungeon() -> Dungeon {
    let mut d = Dungeon::new();
    d.add_space(rect_polygon(0.0, 0.0, 80.0, 60.0), Mode::Add);
    d.add_path(PathPrimitive {
        seq: None,
        mode: Mode::Add,
        points: vec![Point::new(80.0, 30.0), Point::new(140.0, 10.0), Point::new(200.0, 45.0)],
        width: Some(24.0),
        seed: Some(7),
        shape: jagged(2.0, 1.2),
    });
    d.add_water_path(PathPrimitive {
        seq: None,
        mode: Mode::Add,
        points: vec![Point::new(10.0, 30.0), Point::new(70.0, 35.0)],
        width: Some(16.0),
        seed: None,
        shape: RawShapeSettings::default(),
    });
    d
}

#[test]
fn test_repeated_compiles_are_identical() {
    let d = cave_dungeon();
    let mut a = WorldCache::new(config(1.5));
    let mut b = WorldCache::new(config(1.5));
    let ea = a.compile(&d).unwrap().unwrap();
    let eb = b.compile(&d).unwrap().unwrap();

    assert_eq!(ea.frame, eb.frame);
    assert_eq!(*ea.interior, *eb.interior);
    assert_eq!(*ea.water_mask, *eb.water_mask);
    assert_eq!(ea.contours_world(), eb.contours_world());
    assert_eq!(ea.walls, eb.walls);
    assert_eq!(ea.hatch, eb.hatch);
    assert_eq!(ea.shadow, eb.shadow);
    assert_eq!(ea.water_fill, eb.water_fill);
    assert_eq!(ea.water_edge, eb.water_edge);
    assert!(ea.water_fill.is_some());
}

#[test]
fn test_later_subtract_wins_regardless_of_collection() {
    let square = rect_polygon(10.0, 10.0, 50.0, 50.0);
    let anchor = rect_polygon(60.0, 60.0, 70.0, 70.0);
    let frame = RasterFrame::new(Bounds::new(0.0, 0.0, 80.0, 80.0), 1.0, 80, 80);

    for (add_in_spaces, subtract_first_in_vec) in [(true, false), (false, true), (true, true)] {
        let mut d = Dungeon::new();
        let add = RegionPrimitive { seq: Some(1), mode: Mode::Add, polygon: square.clone() };
        let sub = RegionPrimitive { seq: Some(2), mode: Mode::Subtract, polygon: square.clone() };
        d.spaces.push(RegionPrimitive { seq: Some(0), mode: Mode::Add, polygon: anchor.clone() });
        let (first, second) = if add_in_spaces {
            (&mut d.spaces, &mut d.shapes)
        } else {
            (&mut d.shapes, &mut d.spaces)
        };
        if subtract_first_in_vec {
            second.push(sub);
            first.push(add);
        } else {
            first.push(add);
            second.push(sub);
        }

        let mask = rasterize(&d.interior_primitives(), &frame, 10.0, false);
        assert_eq!(*mask.get(30, 30), 0.0);
        assert_eq!(*mask.get(65, 65), 1.0);
    }
}

#[test]
fn test_jagged_corridor_closes_with_nominal_ends() {
    let points = [Point::new(0.0, 0.0), Point::new(60.0, 25.0), Point::new(120.0, -10.0)];
    for (amplitude, frequency) in [(0.5, 0.4), (2.0, 1.0), (3.5, 2.4)] {
        let settings = ShapeSettings::normalize(&jagged(amplitude, frequency));
        let mut options = RenderOptions::new(20.0);
        options.seed = Some(99);
        let geometry = render_geometry(&points, &settings, &options);
        assert_eq!(geometry.kind, GeometryKind::Polygon);
        assert!(geometry.points.len() >= 3);

        let centerline = geometry.centerline.unwrap();
        let rails = jagged_rails(&centerline, &settings, 20.0, 99, false);
        assert_eq!(rails.left[0], 10.0);
        assert_eq!(rails.right[0], 10.0);
        assert_eq!(*rails.left.last().unwrap(), 10.0);
        assert_eq!(*rails.right.last().unwrap(), 10.0);
    }
}

#[test]
fn test_zero_smoothness_returns_input() {
    let points = vec![
        Point::new(0.0, 0.0),
        Point::new(3.0, 8.0),
        Point::new(9.0, 2.0),
        Point::new(15.0, 11.0),
    ];
    assert_eq!(smooth_centerline(&points, 12.0, 0.0, 1200), points);

    let raw = RawShapeSettings {
        smoothness: Some(0.0),
        ..RawShapeSettings::default()
    };
    let geometry = render_geometry(&points, &ShapeSettings::normalize(&raw), &RenderOptions::new(12.0));
    assert_eq!(geometry.kind, GeometryKind::Stroke);
    assert_eq!(geometry.points, points);
}

#[test]
fn test_rectangle_contour_within_step() {
    let mut d = Dungeon::new();
    d.add_space(rect_polygon(12.0, 9.0, 47.0, 31.0), Mode::Add);
    let frame = RasterFrame::new(Bounds::new(0.0, 0.0, 64.0, 40.0), 1.0, 64, 40);
    let mask = rasterize(&d.interior_primitives(), &frame, 10.0, false);

    for step in [1, 2, 3] {
        let contours = contours_from_alpha(&mask, step, 0.5);
        assert_eq!(contours.len(), 1);
        assert!(contours[0].closed);
        let b = contours[0].bounds().unwrap();
        let tol = step as f64;
        assert!((b.min_x - 12.0).abs() <= tol);
        assert!((b.max_x - 47.0).abs() <= tol);
        assert!((b.min_y - 9.0).abs() <= tol);
        assert!((b.max_y - 31.0).abs() <= tol);
    }
}

#[test]
fn test_huge_world_stays_within_max_dimension() {
    let mut d = Dungeon::new();
    d.add_space(rect_polygon(0.0, 0.0, 100_000.0, 2_500.0), Mode::Add);
    let mut cache = WorldCache::new(CompileConfig {
        desired_ppu: 4.0,
        max_dimension: 512,
        ..CompileConfig::default()
    });
    let entry = cache.compile(&d).unwrap().unwrap();
    let (w, h) = entry.dimensions();
    assert!(w <= 512 && h <= 512);
    assert_eq!(w, 512);
    assert!(entry.ppu() < 4.0);
}

#[test]
fn test_single_room_scenario() {
    let mut d = Dungeon::new();
    d.spaces.push(RegionPrimitive {
        seq: Some(1),
        mode: Mode::Add,
        polygon: rect_polygon(0.0, 0.0, 100.0, 100.0),
    });
    let mut cache = WorldCache::new(config(3.0));
    let entry = cache.compile(&d).unwrap().unwrap();

    // Default style pads by half the default corridor width (20 units)
    assert_eq!(entry.dimensions(), (420, 420));
    assert_eq!(entry.ppu(), 3.0);
    assert_eq!(entry.interior.occupied_bounds(0.5), Some((60, 60, 359, 359)));

    let contours = entry.contours_world();
    assert_eq!(contours.len(), 1);
    let room = &contours[0];
    assert!(room.closed);
    assert!((4..=8).contains(&room.points.len()), "got {} vertices", room.points.len());
    let b = room.bounds().unwrap();
    assert!(b.min_x.abs() <= 1.0 && b.min_y.abs() <= 1.0);
    assert!((b.max_x - 100.0).abs() <= 1.0 && (b.max_y - 100.0).abs() <= 1.0);
}

#[test]
fn test_preview_compile_is_deterministic() {
    let d = cave_dungeon();
    let preview = CompileConfig {
        preview: true,
        ..config(1.5)
    };
    let a = WorldCache::new(preview.clone()).compile(&d).unwrap().unwrap().clone();
    let b = WorldCache::new(preview).compile(&d).unwrap().unwrap().clone();
    assert_eq!(*a.interior, *b.interior);
    assert_eq!(a.contours_world(), b.contours_world());
    assert!(a.interior.count_above(0.5) > 0);
    assert!(a.contours_world().iter().all(|c| c.closed));
}
