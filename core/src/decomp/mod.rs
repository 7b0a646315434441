//! Collider decomposition
//!
//! - [`external`] - static meshes via an external decomposer process
//! - [`skeletal`] - per-bone hulls for skinned meshes
//! - [`export`] - collider OBJ and rig document writers

pub mod export;
pub mod external;
pub mod params;
pub mod skeletal;

pub use export::{write_collider_obj, write_collider_rig};
pub use external::{
    COLLIDER_DIR, CancelToken, Decomposer, DecompositionJob, SUPPORTED_INPUTS,
    collider_output_path, decompose, decompose_with, load_collider_mesh,
};
pub use params::{ApproximationMode, DecompParameters, HullLimit, Preset, threshold_from_quality};
pub use skeletal::{
    BoneSelection, SkeletalDecomposition, decompose_skeleton, decompose_skeleton_with,
    important_bones,
};
