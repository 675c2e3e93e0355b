//! Debug tool for comparing corridor shape parameters visually
//! Renders one winding corridor per cell: a smoothness row on top, then an
//! amplitude x frequency sweep of jagged corridors.

use std::error::Error;

use image::{Rgba, RgbaImage};

use dungeon_mapper::composite::to_rgba_image;
use dungeon_mapper::draw;
use dungeon_mapper::geometry::Point;
use dungeon_mapper::model::{Dungeon, Mode, PathPrimitive, RawShapeSettings};
use dungeon_mapper::world_cache::{CompileConfig, WorldCache};

const PPU: f64 = 2.0;
const SEED: u64 = 42;
const GUTTER: u32 = 8;

const SMOOTHNESS: [f64; 4] = [0.0, 0.33, 0.66, 1.0];
const AMPLITUDES: [f64; 4] = [0.5, 1.5, 2.5, 3.5];
const FREQUENCIES: [f64; 4] = [0.4, 1.0, 1.7, 2.4];

fn winding_path() -> Vec<Point> {
    vec![
        Point::new(0.0, 40.0),
        Point::new(50.0, 10.0),
        Point::new(110.0, 60.0),
        Point::new(170.0, 20.0),
        Point::new(220.0, 50.0),
    ]
}

fn corridor_cell(shape: RawShapeSettings) -> Result<RgbaImage, Box<dyn Error>> {
    let mut dungeon = Dungeon::new();
    dungeon.add_path(PathPrimitive {
        seq: None,
        mode: Mode::Add,
        points: winding_path(),
        width: Some(28.0),
        seed: Some(SEED),
        shape,
    });

    let mut cache = WorldCache::new(CompileConfig {
        desired_ppu: PPU,
        ..CompileConfig::default()
    });
    let entry = cache
        .compile(&dungeon)?
        .ok_or("corridor produced no geometry")?;
    Ok(to_rgba_image(&draw::render_export(entry, &dungeon.style)))
}

fn create_grid(cells: &[(String, RgbaImage)], cols: usize) -> RgbaImage {
    let Some((_, first)) = cells.first() else {
        return RgbaImage::new(1, 1);
    };
    let (cw, ch) = (first.width(), first.height());
    let rows = cells.len().div_ceil(cols);
    let mut grid = RgbaImage::from_pixel(
        cols as u32 * (cw + GUTTER) + GUTTER,
        rows as u32 * (ch + GUTTER) + GUTTER,
        Rgba([40, 40, 40, 255]),
    );

    for (idx, (_, img)) in cells.iter().enumerate() {
        let x_offset = GUTTER + (idx % cols) as u32 * (cw + GUTTER);
        let y_offset = GUTTER + (idx / cols) as u32 * (ch + GUTTER);
        for y in 0..ch.min(img.height()) {
            for x in 0..cw.min(img.width()) {
                grid.put_pixel(x_offset + x, y_offset + y, *img.get_pixel(x, y));
            }
        }
    }
    grid
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("Generating corridor comparison grid...");
    let mut cells: Vec<(String, RgbaImage)> = Vec::new();

    for smoothness in SMOOTHNESS {
        let name = format!("smooth s={:.2}", smoothness);
        println!("  Processing: {}", name);
        let shape = RawShapeSettings {
            shape_mode: Some("smooth".into()),
            smoothness: Some(smoothness),
            ..RawShapeSettings::default()
        };
        cells.push((name, corridor_cell(shape)?));
    }

    for amplitude in AMPLITUDES {
        for frequency in FREQUENCIES {
            let name = format!("jagged a={:.1} f={:.1}", amplitude, frequency);
            println!("  Processing: {}", name);
            let shape = RawShapeSettings {
                shape_mode: Some("jagged".into()),
                smoothness: Some(0.4),
                amplitude: Some(amplitude),
                frequency: Some(frequency),
                ..RawShapeSettings::default()
            };
            cells.push((name, corridor_cell(shape)?));
        }
    }

    let grid = create_grid(&cells, 4);
    grid.save("corridor_sweep.png")?;

    println!("Layout (row-major, 4 per row):");
    for (idx, (name, _)) in cells.iter().enumerate() {
        println!("  [{}, {}] {}", idx / 4, idx % 4, name);
    }
    println!("Saved corridor_sweep.png");
    Ok(())
}
