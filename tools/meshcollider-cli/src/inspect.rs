//! Inspect command - summarize an asset

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use meshcollider_core::build_skeleton;
use meshcollider_core::import::load_scene;
use meshcollider_core::mesh::static_mesh_from_scene;
use meshcollider_core::skeleton::Skeleton;

/// Arguments for the inspect command
#[derive(Args)]
pub struct InspectArgs {
    /// Asset to inspect (.gltf, .glb, .obj or .json)
    pub input: PathBuf,
}

/// Execute the inspect command
pub fn execute(args: InspectArgs) -> Result<()> {
    let scene = load_scene(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;
    let mesh = static_mesh_from_scene(&scene);
    let bounds = mesh.bounds();

    println!("=== {} ===", args.input.display());
    println!(
        "  {} meshes, {} vertices, {} triangles, {} materials",
        scene.meshes.len(),
        scene.vertex_count(),
        scene.triangle_count(),
        scene.materials.len()
    );
    if !bounds.is_empty() {
        println!(
            "  Bounds: min {:?} max {:?} size {:?}",
            bounds.min.to_array(),
            bounds.max.to_array(),
            bounds.size().to_array()
        );
    }

    println!("\nMeshes:");
    for scene_mesh in &scene.meshes {
        println!(
            "  {:<24} {:>6} vertices {:>6} triangles {:>3} bones",
            scene_mesh.name,
            scene_mesh.positions.len(),
            scene_mesh.faces.len(),
            scene_mesh.bones.len()
        );
    }

    if !scene.is_skinned() {
        return Ok(());
    }

    match build_skeleton(&scene) {
        Ok(skeleton) => print_skeleton(&skeleton),
        Err(e) => println!("\nSkeleton: unusable ({})", e),
    }
    Ok(())
}

fn print_skeleton(skeleton: &Skeleton) {
    println!("\nSkeleton ({} bones):", skeleton.bone_count());

    let mut stack: Vec<(usize, usize)> = skeleton.root().map(|root| (root.id, 0)).into_iter().collect();
    while let Some((id, depth)) = stack.pop() {
        let Some(bone) = skeleton.bone(id) else {
            continue;
        };
        println!(
            "  {}{} [{}] {} vertices",
            "  ".repeat(depth),
            bone.name,
            bone.id,
            bone.vertex_weights.len()
        );
        stack.extend(bone.children.iter().rev().map(|&child| (child, depth + 1)));
    }

    if skeleton.animation_names().is_empty() {
        return;
    }
    println!("\nAnimations:");
    for name in skeleton.animation_names() {
        if let Some(animation) = skeleton.animation(name) {
            println!(
                "  {:<24} {:.2}s ({} ticks at {} ticks/s, {} channels)",
                name,
                animation.duration_seconds(),
                animation.duration,
                animation.ticks_per_second,
                animation.channels().count()
            );
        }
    }
}
