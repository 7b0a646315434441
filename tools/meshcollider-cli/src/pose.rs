//! Pose command - sample an animation and print bone placements

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use meshcollider_core::{Bounds, load_skinned_mesh};

/// Arguments for the pose command
#[derive(Args)]
pub struct PoseArgs {
    /// Skinned mesh (.gltf or .glb)
    pub input: PathBuf,

    /// Animation to sample (bind pose when omitted)
    #[arg(short, long)]
    pub animation: Option<String>,

    /// Playback time in seconds; wraps around the animation length
    #[arg(short, long, default_value_t = 0.0)]
    pub time: f64,

    /// Only print this bone
    #[arg(short, long)]
    pub bone: Option<String>,
}

/// Execute the pose command
pub fn execute(args: PoseArgs) -> Result<()> {
    let mut skinned = load_skinned_mesh(&args.input)
        .with_context(|| format!("Failed to load skinned mesh {}", args.input.display()))?;
    let skeleton = &mut skinned.skeleton;

    if let Some(bone) = &args.bone {
        if skeleton.bone_id(bone).is_none() {
            bail!("Unknown bone '{}'", bone);
        }
    }

    match &args.animation {
        Some(name) => {
            skeleton.set_current_animation(name).with_context(|| {
                format!("Available animations: {}", skeleton.animation_names().join(", "))
            })?;
            let ticks = skeleton.play_current_animation(args.time).unwrap_or_default();
            println!("=== {} at {:.3}s (tick {:.2}) ===", name, args.time, ticks);
        }
        None => println!("=== Bind pose ==="),
    }

    for bone in skeleton.bones() {
        if args.bone.as_ref().is_some_and(|name| *name != bone.name) {
            continue;
        }
        let Some(global) = skeleton.global_transform(bone.id) else {
            continue;
        };
        let (_, rotation, translation) = global.to_scale_rotation_translation();
        println!(
            "  {:<20} position [{:.4}, {:.4}, {:.4}] rotation [{:.4}, {:.4}, {:.4}, {:.4}]",
            bone.name, translation.x, translation.y, translation.z, rotation.x, rotation.y,
            rotation.z, rotation.w
        );
    }

    let skinned_bounds = Bounds::from_points(
        &(0..skeleton.vertices().len() as u32)
            .filter_map(|vertex| skeleton.skin_point(vertex))
            .collect::<Vec<_>>(),
    );
    if !skinned_bounds.is_empty() {
        let [x, y, z] = skinned_bounds.size().to_array();
        println!("  Skinned bounds size [{:.4}, {:.4}, {:.4}]", x, y, z);
    }

    Ok(())
}
