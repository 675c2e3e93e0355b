use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;

use dungeon_mapper::color::Color;
use dungeon_mapper::composite::{tint, to_rgba_image, Raster};
use dungeon_mapper::draw;
use dungeon_mapper::model::Dungeon;
use dungeon_mapper::world_cache::{CompileConfig, WorldCache};

#[derive(Parser, Debug)]
#[command(name = "dungeon_mapper")]
#[command(about = "Compile a dungeon floor plan into stylized map layers")]
struct Args {
    /// Dungeon description (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for the rendered PNGs
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// Compile settings (JSON); the flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Desired pixels per world unit
    #[arg(long)]
    ppu: Option<f64>,

    /// Maximum raster side in pixels
    #[arg(long)]
    max_dim: Option<usize>,

    /// Contour sample spacing in pixels
    #[arg(long)]
    step: Option<usize>,

    /// Use cheaper corridor geometry
    #[arg(long)]
    preview: bool,

    /// Also write every cached layer as its own PNG
    #[arg(long)]
    layers: bool,

    /// Write world-space contours to this JSON file
    #[arg(long)]
    contours: Option<PathBuf>,
}

fn save_layer(layer: &Raster, path: &Path) -> Result<(), Box<dyn Error>> {
    to_rgba_image(layer).save(path)?;
    println!("  Saved {}", path.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    println!("Loading dungeon from {}", args.input.display());
    let dungeon: Dungeon = serde_json::from_str(&fs::read_to_string(&args.input)?)?;
    println!(
        "  {} spaces, {} shapes, {} paths, {} water paths",
        dungeon.spaces.len(),
        dungeon.shapes.len(),
        dungeon.paths.len(),
        dungeon.water_paths.len()
    );

    let mut config: CompileConfig = match &args.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => CompileConfig::default(),
    };
    if let Some(ppu) = args.ppu {
        config.desired_ppu = ppu;
    }
    if let Some(max_dim) = args.max_dim {
        config.max_dimension = max_dim;
    }
    if let Some(step) = args.step {
        config.contour_step = step;
    }
    if args.preview {
        config.preview = true;
    }

    println!("Compiling world...");
    let start = Instant::now();
    let mut cache = WorldCache::new(config);
    let Some(entry) = cache.compile(&dungeon)? else {
        println!("Dungeon has no geometry, nothing to render");
        return Ok(());
    };
    let (width, height) = entry.dimensions();
    println!(
        "Raster {}x{} at {:.3} px/unit, {} contours ({:.2?})",
        width,
        height,
        entry.ppu(),
        entry.contours_world().len(),
        start.elapsed()
    );

    fs::create_dir_all(&args.output)?;
    let style = dungeon.style.sanitized();

    println!("Compositing...");
    save_layer(&draw::render_export(entry, &style), &args.output.join("composite.png"))?;

    if args.layers {
        println!("Writing layers...");
        save_layer(&tint(&entry.interior, Color::WHITE, 1.0), &args.output.join("interior.png"))?;
        save_layer(&tint(&entry.water_mask, Color::WHITE, 1.0), &args.output.join("water_mask.png"))?;

        let layers = [
            ("walls", &entry.walls),
            ("hatch", &entry.hatch),
            ("shadow", &entry.shadow),
            ("water_fill", &entry.water_fill),
            ("water_edge", &entry.water_edge),
        ];
        for (name, layer) in layers {
            match layer {
                Some(layer) => save_layer(layer, &args.output.join(format!("{}.png", name)))?,
                None => println!("  {} skipped (disabled or empty)", name),
            }
        }
    }

    if let Some(path) = &args.contours {
        fs::write(path, serde_json::to_string_pretty(entry.contours_world())?)?;
        println!("Saved contours to {}", path.display());
    }

    Ok(())
}
