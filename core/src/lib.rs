//! meshcollider core - mesh-to-collider decomposition engine
//!
//! Converts visual meshes into simplified collision geometry. Static meshes are
//! handed to an external concavity-aware decomposer; skinned meshes are split
//! per bone and wrapped in convex hulls rigged to the source skeleton.
//!
//! # Architecture
//!
//! - [`import`] - Scene importer adapters (glTF, OBJ, JSON exchange parts)
//! - [`skeleton`] - Bone hierarchy, animation sampling, bone palette, weights
//! - [`hull`] - Exact 3D convex hulls
//! - [`decomp`] - Static (external process) and skeletal decomposition
//! - [`draw`] - Collider/visual geometry handed to a render backend
//! - [`session`] - Per-asset controller driving load, playback and decomposition

pub mod decomp;
pub mod draw;
pub mod error;
pub mod hull;
pub mod import;
pub mod math;
pub mod mesh;
pub mod scene;
pub mod session;
pub mod skeleton;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export error taxonomy
pub use error::{ColliderError, DecompositionError, GeometryError, ImportError, SkeletonError};

// Re-export geometry types
pub use draw::{DrawMesh, DrawObject, DrawShape, HeadlessBackend, Material, RenderBackend, VertexAttributes};
pub use hull::ConvexHull;
pub use math::{Bounds, hue, rainbow};
pub use mesh::{SkinnedMesh, load_skinned_mesh, load_static_mesh};
pub use scene::SceneGraph;

// Re-export skeleton types
pub use skeleton::{Animation, AnimationChannel, Bone, BoneId, Keyframe, Skeleton, build_skeleton};

// Re-export decomposition entry points
pub use decomp::{
    ApproximationMode, BoneSelection, CancelToken, DecompParameters, Decomposer, DecompositionJob,
    HullLimit, Preset, decompose_skeleton, decompose_skeleton_with, threshold_from_quality,
};
pub use session::{LoadedAsset, RenderOptions, Session};
