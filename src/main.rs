use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use glitchgif::clock::{Clock, WallClock};
use glitchgif::params::EffectParams;
use glitchgif::rng::XorShift64;
use glitchgif::{GlitchEngine, SourceImage};

#[derive(Debug, Parser)]
#[command(name = "glitchgif")]
#[command(about = "Procedural glitch-animation GIF generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Animate two or three images and write a looping glitch GIF.
    Render {
        /// Two or three source images (jpeg/png/webp).
        #[arg(num_args = 2..=3, required = true)]
        images: Vec<PathBuf>,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        /// How much animation to capture, in milliseconds.
        #[arg(long, default_value_t = glitchgif::capture::DEFAULT_DURATION_MS)]
        duration_ms: f64,
        /// Glitch intensity override, 0-100.
        #[arg(long)]
        intensity: Option<u32>,
        /// Minimum time between rendered frames, in milliseconds.
        #[arg(long)]
        frame_delay_ms: Option<f64>,
        /// Seed for the random source; omitted means entropy-seeded.
        #[arg(long)]
        seed: Option<u64>,
        /// Optional YAML parameter file; flags override its fields.
        #[arg(long)]
        params: Option<PathBuf>,
    },
    /// Validate a YAML parameter file.
    Check { params: PathBuf },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            images,
            output,
            duration_ms,
            intensity,
            frame_delay_ms,
            seed,
            params,
        } => run_render(
            &images,
            &output,
            duration_ms,
            intensity,
            frame_delay_ms,
            seed,
            params.as_deref(),
        ),
        Commands::Check { params } => run_check(&params),
    }
}

fn run_check(params_path: &Path) -> Result<()> {
    let params = EffectParams::from_yaml_file(params_path)?;
    println!(
        "OK: {} (intensity {}, frame delay {}ms, swap p={} for {}ms, {} artifacts)",
        params_path.display(),
        params.glitch_intensity,
        params.frame_delay_ms,
        params.swap_probability,
        params.swap_duration_ms,
        params.artifact_target_count
    );
    Ok(())
}

fn run_render(
    image_paths: &[PathBuf],
    output_path: &Path,
    duration_ms: f64,
    intensity: Option<u32>,
    frame_delay_ms: Option<f64>,
    seed: Option<u64>,
    params_path: Option<&Path>,
) -> Result<()> {
    let mut params = match params_path {
        Some(path) => EffectParams::from_yaml_file(path)?,
        None => EffectParams::default(),
    };
    if let Some(intensity) = intensity {
        params.glitch_intensity = intensity;
    }
    if let Some(frame_delay_ms) = frame_delay_ms {
        params.frame_delay_ms = frame_delay_ms;
    }
    params.validate()?;

    let rng = match seed {
        Some(seed) => XorShift64::from_seed(seed),
        None => XorShift64::from_entropy(),
    };

    let mut images = Vec::with_capacity(image_paths.len());
    for path in image_paths {
        images.push(SourceImage::load(path)?);
    }

    let mut engine = GlitchEngine::new(params, rng)?;
    let mut clock = WallClock::new();
    engine.start(images, clock.now_ms())?;

    let mut last_decile = 0u32;
    let mut on_progress = |fraction: f64| {
        let decile = (fraction * 10.0).floor() as u32;
        if decile > last_decile || fraction >= 1.0 {
            last_decile = decile;
            eprintln!("encoding {:3.0}%", fraction * 100.0);
        }
    };
    let gif = engine.record(&mut clock, duration_ms, &mut on_progress)?;
    engine.stop();

    std::fs::write(output_path, &gif)
        .with_context(|| format!("failed to write {}", output_path.display()))?;
    println!("Wrote {} ({} bytes)", output_path.display(), gif.len());
    Ok(())
}
