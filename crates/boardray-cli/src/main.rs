//! boardray CLI - build and inspect board scenes
//!
//! Loads a board description, assembles the traceable scene and reports
//! what went into it.

use anyhow::{Context, Result};
use boardray_math::{Point3, Vec3};
use boardray_model_cache::ModelCache;
use boardray_raytrace::Ray;
use boardray_scene::{Board, LogReporter, Scene, SceneAssembler, SceneSettings};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "boardray")]
#[command(about = "Circuit-board scene builder for ray tracing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SceneArgs {
    /// Board description (JSON)
    board: PathBuf,
    /// Render settings (TOML). Defaults to render.toml in the config directory
    #[arg(short, long)]
    settings: Option<PathBuf>,
    /// Directory relative model filenames are resolved against
    #[arg(short, long)]
    models: Option<PathBuf>,
    /// Load only copper, plated pads and flat-shaded models
    #[arg(long)]
    reduced: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the scene and print its statistics
    Build {
        #[command(flatten)]
        scene: SceneArgs,
    },
    /// Cast a ray straight down at a board position
    Probe {
        #[command(flatten)]
        scene: SceneArgs,
        /// Board X
        x: f64,
        /// Board Y
        y: f64,
    },
    /// Print the default render settings as TOML
    Settings,
    /// Manage the model cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete cache files older than the given age
    Clean {
        /// Maximum age in days
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Print the cache directory
    Path,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boardray=info,boardray_scene=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { scene } => {
            let built = build_scene(&scene)?;
            print_stats(&built);
        }
        Commands::Probe { scene, x, y } => {
            let built = build_scene(&scene)?;
            probe(&built, x, y);
        }
        Commands::Settings => {
            print!("{}", SceneSettings::default().to_toml_string()?);
        }
        Commands::Cache { action } => match action {
            CacheAction::Clean { days } => {
                let cache = model_cache()?;
                let removed = cache.clean_cache_dir(days)?;
                println!("Removed {removed} cache file(s) older than {days} day(s)");
            }
            CacheAction::Path => match cache_dir() {
                Some(dir) => println!("{}", dir.display()),
                None => anyhow::bail!("No cache directory on this platform"),
            },
        },
    }

    Ok(())
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "boardray", "boardray")
}

fn cache_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.cache_dir().join("models"))
}

fn model_cache() -> Result<ModelCache> {
    let cache = ModelCache::default();
    match cache_dir() {
        Some(dir) => cache
            .set_cache_dir(&dir)
            .with_context(|| format!("Failed to use cache directory {}", dir.display()))?,
        None => warn!("no cache directory on this platform, models will not be cached on disk"),
    }
    Ok(cache)
}

fn load_settings(explicit: Option<&Path>) -> Result<SceneSettings> {
    if let Some(path) = explicit {
        return SceneSettings::load(path).with_context(|| format!("Failed to read settings {}", path.display()));
    }
    if let Some(dirs) = project_dirs() {
        let path = dirs.config_dir().join("render.toml");
        if path.exists() {
            info!(path = %path.display(), "using render settings from config directory");
            return SceneSettings::load(&path).with_context(|| format!("Failed to read settings {}", path.display()));
        }
    }
    Ok(SceneSettings::default())
}

fn build_scene(args: &SceneArgs) -> Result<Arc<Scene>> {
    let board = Board::load(&args.board).with_context(|| format!("Failed to load board {}", args.board.display()))?;
    let settings = load_settings(args.settings.as_deref())?;

    let assembler = SceneAssembler::new(Arc::new(model_cache()?));
    assembler.set_board(board);
    assembler.set_settings(settings)?;
    let model_dir = args
        .models
        .clone()
        .or_else(|| args.board.parent().map(Path::to_path_buf));
    assembler.set_model_dir(model_dir);

    assembler
        .reload(Some(&LogReporter), args.reduced)
        .context("Reload was superseded")
}

fn print_stats(scene: &Scene) {
    let stats = scene.stats();
    println!("Scene generation {}", scene.generation());
    println!("  objects:        {}", scene.len());
    for (kind, count) in &stats.by_kind {
        println!("    {kind:?}: {count}");
    }
    println!("  composites:     {}", stats.composites);
    println!("  skipped:        {}", stats.skipped);
    println!("  models placed:  {}", stats.models_placed);
    println!("  models missing: {}", stats.models_missing);
    println!("  lights:         {}", stats.lights);
    let bbox = scene.bbox();
    if !bbox.is_empty() {
        println!(
            "  bounds:         ({:.3}, {:.3}, {:.3}) - ({:.3}, {:.3}, {:.3})",
            bbox.min.x, bbox.min.y, bbox.min.z, bbox.max.x, bbox.max.y, bbox.max.z
        );
    }
    println!("  reload time:    {:.3} s", stats.elapsed.as_secs_f64());
}

fn probe(scene: &Scene, x: f64, y: f64) {
    let top = scene.bbox().max.z.max(0.0) + 1.0;
    let ray = Ray::new(Point3::new(x, y, top), Vec3::new(0.0, 0.0, -1.0));
    match scene.intersect(&ray, 0.0, f64::INFINITY) {
        Some(hit) => {
            println!("Hit at z = {:.4}", hit.point.z);
            println!("  normal:       ({:.3}, {:.3}, {:.3})", hit.normal.x, hit.normal.y, hit.normal.z);
            println!("  color:        ({:.3}, {:.3}, {:.3})", hit.color.r, hit.color.g, hit.color.b);
            println!("  transparency: {:.3}", hit.transparency);
            match hit.item {
                Some(item) => println!("  board item:   {}", item.0),
                None => println!("  board item:   none"),
            }
        }
        None => println!("No hit at ({x}, {y})"),
    }
}
