//! Error taxonomy for the decomposition engine
//!
//! Each stage reports its own error type. [`ColliderError`] wraps them for
//! callers that drive the whole pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Asset could not be read into a scene graph.
///
/// Fatal for that load attempt only; previously loaded state is kept.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to load glTF {path}: {source}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[error("Failed to parse collider parts: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Malformed {format} at line {line}: {message}")]
    Parse {
        format: &'static str,
        line: usize,
        message: String,
    },
    #[error("Invalid mesh '{name}': {message}")]
    InvalidMesh { name: String, message: String },
    #[error("Unsupported asset format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("Asset contains no usable geometry: {0}")]
    Empty(String),
}

/// Bone hierarchy could not be reconstructed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkeletonError {
    #[error("Scene has no skinned meshes")]
    NoBones,
    #[error("Failed to find root bone")]
    RootNotFound,
    #[error("Multiple root bones found ('{first}' and '{second}')")]
    AmbiguousRoot { first: String, second: String },
    #[error("Bone '{0}' is referenced by skinning data but missing from the hierarchy")]
    MissingBone(String),
    #[error("Bone '{bone}' weights vertex {vertex} but the mesh has {vertex_count} vertices")]
    VertexOutOfRange {
        bone: String,
        vertex: u32,
        vertex_count: usize,
    },
    #[error("Animation '{0}' not found in skeleton")]
    UnknownAnimation(String),
}

/// The external decomposer failed or its output could not be used.
#[derive(Error, Debug)]
pub enum DecompositionError {
    #[error("Input must be a mesh file ({expected}) for decomposition: {path}")]
    UnsupportedInput { path: PathBuf, expected: String },
    #[error("Decomposer '{program}' not found: {reason}")]
    ToolNotFound { program: String, reason: String },
    #[error("Failed to launch decomposer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Decomposer failed with exit code {code}: {stderr}")]
    ToolFailed { code: String, stderr: String },
    #[error("Decomposition was cancelled")]
    Cancelled,
    #[error("Decomposer exited successfully but wrote no output at {0}")]
    MissingOutput(PathBuf),
    #[error("Failed to load decomposer output: {0}")]
    Output(#[from] ImportError),
    #[error("Skeletal decomposition requires a skinned mesh")]
    NotSkinned,
    #[error("No mesh loaded")]
    NothingLoaded,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Degenerate input to hull construction. Only the affected cluster is skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Convex hull needs at least 4 points, got {0}")]
    TooFewPoints(usize),
    #[error("Points are coincident")]
    Coincident,
    #[error("Points are collinear")]
    Collinear,
    #[error("Points are coplanar")]
    Coplanar,
}

/// Any failure in the load -> skeleton -> decompose pipeline.
#[derive(Error, Debug)]
pub enum ColliderError {
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Skeleton(#[from] SkeletonError),
    #[error(transparent)]
    Decomposition(#[from] DecompositionError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}
