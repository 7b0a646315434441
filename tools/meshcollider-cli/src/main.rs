//! meshcollider - generate collision geometry from visual meshes
//!
//! # Commands
//!
//! - `meshcollider static` - Convex decomposition through the external decomposer
//! - `meshcollider skeletal` - Per-bone colliders for a skinned mesh
//! - `meshcollider inspect` - Summarize an asset (meshes, bones, animations)
//! - `meshcollider pose` - Sample an animation and print bone placements
//!
//! # Usage
//!
//! ```bash
//! # Decompose a static prop with the accurate preset
//! meshcollider static props/crate.obj --preset accurate
//!
//! # Box colliders for every bone of a character
//! meshcollider skeletal characters/hero.glb --all --box
//!
//! # Where is the hand half a second into "wave"?
//! meshcollider pose characters/hero.glb --animation wave --time 0.5 --bone LeftHand
//! ```
//!
//! # Configuration (meshcollider.toml)
//!
//! ```toml
//! [decomposer]
//! program = "python3"
//! args = ["scripts/coacd_preprocess.py"]
//!
//! [static]
//! preset = "balanced"
//! box_mode = false
//!
//! [skeletal]
//! mode = "important"
//! box_mode = false
//! ```

mod config;
mod inspect;
mod pose;
mod skeletal;
mod static_mesh;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Config;

/// meshcollider - generate collision geometry from visual meshes
#[derive(Parser)]
#[command(name = "meshcollider")]
#[command(about = "Generate collision geometry from visual meshes")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./meshcollider.toml, then the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompose a static mesh into convex parts with the external decomposer
    Static(static_mesh::StaticArgs),

    /// Build one collider piece per bone of a skinned mesh
    Skeletal(skeletal::SkeletalArgs),

    /// Print meshes, bones and animations of an asset
    Inspect(inspect::InspectArgs),

    /// Sample an animation and print bone placements
    Pose(pose::PoseArgs),
}

fn main() -> Result<()> {
    // Logs go to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Static(args) => static_mesh::execute(args, &config),
        Commands::Skeletal(args) => skeletal::execute(args, &config),
        Commands::Inspect(args) => inspect::execute(args),
        Commands::Pose(args) => pose::execute(args),
    }
}
