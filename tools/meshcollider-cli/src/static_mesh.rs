//! Static command - convex decomposition through the external decomposer

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use meshcollider_core::decomp::{
    ApproximationMode, CancelToken, DecompParameters, HullLimit, Preset, collider_output_path,
    decompose_with, threshold_from_quality,
};

use crate::config::Config;

/// Arguments for the static command
#[derive(Args)]
pub struct StaticArgs {
    /// Mesh to decompose (.obj, .stl or .ply)
    pub input: PathBuf,

    /// Parameter preset: fast, balanced or accurate
    #[arg(long)]
    pub preset: Option<Preset>,

    /// Quality in [0, 1]; sets the concavity threshold to 1 - quality
    #[arg(long, conflicts_with = "threshold")]
    pub quality: Option<f32>,

    /// Concavity threshold (0.01 - 1.0)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Voxel resolution (100 - 10000)
    #[arg(long)]
    pub resolution: Option<u32>,

    /// Maximum number of convex parts (1 - 100, or -1 for unlimited)
    #[arg(long, allow_negative_numbers = true)]
    pub max_hulls: Option<i32>,

    /// Extrusion margin (-0.5 - 0.5)
    #[arg(long, allow_negative_numbers = true)]
    pub extrude: Option<f32>,

    /// Approximate each part by its bounding box instead of a hull
    #[arg(long = "box")]
    pub box_mode: bool,

    /// Also copy the collider OBJ here
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl StaticArgs {
    /// Command-line values layered over the config file.
    fn parameters(&self, config: &Config) -> DecompParameters {
        let mut params = match self.preset {
            Some(preset) => preset.parameters(),
            None => config.static_mesh.parameters(),
        };
        if let Some(quality) = self.quality {
            params.threshold = threshold_from_quality(quality);
        }
        if let Some(threshold) = self.threshold {
            params.threshold = threshold;
        }
        if let Some(resolution) = self.resolution {
            params.resolution = resolution;
        }
        if let Some(limit) = self.max_hulls {
            params.max_convex_hulls = HullLimit::from(limit);
        }
        if let Some(extrude) = self.extrude {
            params.extrude = extrude;
        }
        if self.box_mode || config.static_mesh.box_mode {
            params.mode = ApproximationMode::Box;
        }
        params.clamped()
    }
}

/// Execute the static command
pub fn execute(args: StaticArgs, config: &Config) -> Result<()> {
    let params = args.parameters(config);

    println!("=== Static Decomposition ===");
    println!("  Input:      {}", args.input.display());
    println!("  Decomposer: {} {}", config.decomposer.program, config.decomposer.args.join(" "));
    println!(
        "  Parameters: threshold {}, resolution {}, max hulls {}, extrude {}, mode {}",
        params.threshold,
        params.resolution,
        params.max_convex_hulls,
        params.extrude,
        params.mode.as_flag()
    );

    let mesh = decompose_with(&config.decomposer, &args.input, &params, &CancelToken::new())
        .with_context(|| format!("Failed to decompose {}", args.input.display()))?;

    let collider = collider_output_path(&args.input);
    println!(
        "  Collider:   {} ({} parts, {} triangles)",
        collider.display(),
        mesh.len(),
        mesh.triangle_count()
    );

    if let Some(output) = &args.output {
        if let Some(dir) = output.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        fs::copy(&collider, output)
            .with_context(|| format!("Failed to copy collider to {}", output.display()))?;
        println!("  Copied to:  {}", output.display());
    }

    Ok(())
}
