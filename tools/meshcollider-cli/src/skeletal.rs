//! Skeletal command - per-bone colliders for skinned meshes

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use meshcollider_core::decomp::{
    ApproximationMode, COLLIDER_DIR, decompose_skeleton_with, write_collider_obj,
    write_collider_rig,
};
use meshcollider_core::load_skinned_mesh;

use crate::config::{BoneMode, Config, bone_selection};

/// Arguments for the skeletal command
#[derive(Args)]
pub struct SkeletalArgs {
    /// Skinned mesh (.gltf or .glb)
    pub input: PathBuf,

    /// Which bones get a collider piece
    #[arg(long, value_enum)]
    pub mode: Option<BoneMode>,

    /// Explicit bone names (comma separated); overrides --mode
    #[arg(long, value_delimiter = ',')]
    pub bones: Vec<String>,

    /// Use each cluster's bounding box instead of its convex hull
    #[arg(long = "box")]
    pub box_mode: bool,

    /// Output directory (defaults to Colliders/ next to the input)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

fn output_paths(input: &Path, out_dir: Option<&Path>) -> (PathBuf, PathBuf) {
    let dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => input.parent().unwrap_or_else(|| Path::new("")).join(COLLIDER_DIR),
    };
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mesh".to_string());
    (
        dir.join(format!("{stem}_collider.obj")),
        dir.join(format!("{stem}_collider.json")),
    )
}

/// Execute the skeletal command
pub fn execute(args: SkeletalArgs, config: &Config) -> Result<()> {
    let skinned = load_skinned_mesh(&args.input)
        .with_context(|| format!("Failed to load skinned mesh {}", args.input.display()))?;
    let skeleton = &skinned.skeleton;

    let mode = args.mode.unwrap_or(config.skeletal.mode);
    let bones = if args.bones.is_empty() {
        &config.skeletal.bones
    } else {
        &args.bones
    };
    let selection = bone_selection(mode, bones, skeleton)?;
    let approximation = if args.box_mode {
        ApproximationMode::Box
    } else {
        config.skeletal.approximation()
    };

    println!("=== Skeletal Decomposition ===");
    println!("  Input: {}", args.input.display());
    println!("  Bones: {} in skeleton", skeleton.bone_count());

    let result = decompose_skeleton_with(skeleton, &selection, approximation);
    for (bone, reason) in &result.skipped {
        let name = skeleton.bone(*bone).map_or("?", |b| b.name.as_str());
        println!("  Skipped {}: {}", name, reason);
    }
    if result.mesh.is_empty() {
        anyhow::bail!("No collider pieces were produced for {}", args.input.display());
    }

    let (obj_path, rig_path) = output_paths(&args.input, args.out_dir.as_deref());
    if let Some(dir) = obj_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    write_collider_obj(&result.mesh, &obj_path)
        .with_context(|| format!("Failed to write {}", obj_path.display()))?;
    write_collider_rig(&result.mesh, skeleton, &rig_path)
        .with_context(|| format!("Failed to write {}", rig_path.display()))?;

    for object in result.mesh.objects() {
        println!(
            "  {:<16} {} triangles",
            object.name,
            object.shape.attributes.triangle_count()
        );
    }
    println!("  Collider: {}", obj_path.display());
    println!("  Rig:      {}", rig_path.display());

    Ok(())
}
