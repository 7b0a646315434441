//! Scene importer adapters
//!
//! Each format lowers into a [`SceneGraph`]:
//!
//! - `gltf`/`glb` - full scenes with skins and animations
//! - `obj` - static triangle meshes, one mesh per `o`/`g` group
//! - `json` - collider exchange documents (a list of convex parts)

pub mod gltf;
pub mod obj;
pub mod parts;

use std::path::Path;

use tracing::info;

use crate::error::ImportError;
use crate::scene::SceneGraph;

/// Extensions [`load_scene`] understands
pub const SUPPORTED_EXTENSIONS: &[&str] = &["gltf", "glb", "obj", "json"];

/// Lowercased file extension, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Load any supported asset into a scene graph.
pub fn load_scene(path: &Path) -> Result<SceneGraph, ImportError> {
    let scene = match extension_of(path).as_deref() {
        Some("gltf" | "glb") => gltf::load(path)?,
        Some("obj") => obj::load(path)?,
        Some("json") => parts::load(path)?,
        _ => return Err(ImportError::UnsupportedFormat(path.to_path_buf())),
    };

    if scene.meshes.iter().all(|mesh| mesh.faces.is_empty()) {
        return Err(ImportError::Empty(path.display().to_string()));
    }

    info!(
        "Loaded {}: {} meshes, {} vertices, {} triangles, {} animations",
        path.display(),
        scene.meshes.len(),
        scene.vertex_count(),
        scene.triangle_count(),
        scene.animations.len()
    );

    Ok(scene)
}
