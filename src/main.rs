use clap::Parser;
use noise::{NoiseFn, Perlin, Seedable};

mod backend;
mod erosion;
mod grid;
mod heightfield;
mod params;
mod task;
mod terrain;

use heightfield::{HeightField, MAX_SAMPLE};
use terrain::TerrainManager;

#[derive(Parser, Debug)]
#[command(name = "erosim")]
#[command(about = "Run terrain erosion simulations on generated or loaded heightmaps")]
struct Args {
    /// Width of the terrain in cells (ignored when --input is given)
    #[arg(short = 'W', long, default_value = "512")]
    width: usize,

    /// Height of the terrain in cells (ignored when --input is given)
    #[arg(short = 'H', long, default_value = "512")]
    height: usize,

    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Erosion model to run: pipe, ecosystem or ecosystem_gpu
    #[arg(short, long, default_value = "ecosystem")]
    model: String,

    /// Load the starting heightmap from a grayscale PNG
    #[arg(short, long)]
    input: Option<String>,

    /// Output PNG path for the eroded heightmap
    #[arg(short, long, default_value = "eroded.png")]
    output: String,

    /// Number of erosion iterations (model default if not specified)
    #[arg(long)]
    iterations: Option<u32>,

    /// Override a model parameter, e.g. --set rainfall=0.2 (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    set_params: Vec<String>,

    /// List the chosen model's parameters and exit
    #[arg(long)]
    list_params: bool,
}

/// Fractal noise heightmap used when no input image is given.
fn generate_heightfield(width: usize, height: usize, seed: u64) -> HeightField {
    let perlin = Perlin::new(1).set_seed(seed as u32);
    let octaves = 6;
    let persistence = 0.5f64;
    let lacunarity = 2.0f64;
    let base_frequency = 0.004f64;

    let mut hf = HeightField::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut amplitude = 1.0f64;
            let mut frequency = base_frequency;
            let mut total = 0.0f64;
            let mut max_amplitude = 0.0f64;
            for _ in 0..octaves {
                total += amplitude * perlin.get([x as f64 * frequency, y as f64 * frequency]);
                max_amplitude += amplitude;
                amplitude *= persistence;
                frequency *= lacunarity;
            }
            // [-1, 1] -> [0, max_sample]
            let normalized = (total / max_amplitude * 0.5 + 0.5) as f32;
            hf.set(x, y, normalized * MAX_SAMPLE);
        }
    }
    hf
}

fn apply_param_overrides(model: &mut dyn erosion::Erosion, overrides: &[String]) {
    for entry in overrides {
        let Some((name, value)) = entry.split_once('=') else {
            eprintln!("Ignoring malformed --set '{}': expected NAME=VALUE", entry);
            continue;
        };
        let Ok(value) = value.parse::<f32>() else {
            eprintln!("Ignoring --set '{}': value is not a number", entry);
            continue;
        };
        if !model.set_param(name, value) {
            eprintln!(
                "Rejected --set {}={}: unknown parameter or value out of range",
                name, value
            );
        }
    }
}

fn main() {
    let args = Args::parse();

    let seed = args.seed.unwrap_or_else(rand::random);

    let manager = TerrainManager::new(args.width, args.height);
    let terrain = manager.terrain();

    if let Some(ref path) = args.input {
        println!("Loading heightmap from {}", path);
        if let Err(e) = terrain.load_terrain(path) {
            eprintln!("Failed to load heightmap: {}", e);
            std::process::exit(1);
        }
    } else {
        println!("Generating {}x{} heightmap with seed {}", args.width, args.height, seed);
        terrain.set_terrain_data(generate_heightfield(args.width, args.height, seed));
    }
    let (width, height) = terrain.size();
    println!("Terrain size: {}x{}", width, height);

    let Some(mut model) = manager.create_erosion(&args.model) else {
        eprintln!(
            "Unknown or unavailable erosion model '{}' (available: {})",
            args.model,
            TerrainManager::erosion_model_names().join(", ")
        );
        std::process::exit(1);
    };

    if args.list_params {
        println!("Parameters for model '{}':", model.name());
        for p in model.get_params() {
            println!("  {:<34} = {:<10} range [{}, {}]", p.name, p.value, p.min, p.max);
        }
        return;
    }

    if let Some(iterations) = args.iterations {
        model.set_param("iterations", iterations as f32);
    }
    apply_param_overrides(model.as_mut(), &args.set_params);

    println!("Running '{}' erosion...", model.name());
    if let Err(e) = model.start_erosion_task() {
        eprintln!("Failed to start erosion: {}", e);
        std::process::exit(1);
    }

    let mut last_reported = -1i32;
    while model.is_running() {
        model.update();

        let percent = (model.progress() * 100.0) as i32;
        if percent / 10 > last_reported / 10 {
            println!("  {}%", percent);
            last_reported = percent;
        }

        // Thread-backed models do their work off this loop; don't spin.
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    model.join();
    println!("Erosion complete");

    if let Err(e) = terrain.save_terrain(&args.output) {
        eprintln!("Failed to save heightmap: {}", e);
        std::process::exit(1);
    }
    println!("Saved eroded heightmap to {}", args.output);
}
