//! Visual meshes assembled from imported scenes
//!
//! Static meshes are baked into world space through the node hierarchy.
//! Skinned meshes stay in bind space and carry per-vertex bone influences; the
//! GPU applies the skeleton's palette.

use std::path::Path;

use glam::{Mat3, Mat4, Vec2};
use tracing::info;

use crate::draw::{DrawMesh, DrawObject, Material, VertexAttributes};
use crate::error::{ColliderError, ImportError, SkeletonError};
use crate::import::load_scene;
use crate::scene::{SceneGraph, SceneMesh};
use crate::skeleton::{Skeleton, VertexInfluences, WeightCapPolicy, build_skeleton_with};

/// Load any supported asset as a static mesh.
pub fn load_static_mesh(path: &Path) -> Result<DrawMesh, ImportError> {
    let scene = load_scene(path)?;
    Ok(static_mesh_from_scene(&scene))
}

fn material_for(scene: &SceneGraph, mesh: &SceneMesh) -> Material {
    mesh.material
        .and_then(|index| scene.materials.get(index))
        .map(|m| Material::from_diffuse(m.diffuse, m.opacity))
        .unwrap_or_default()
}

/// Expand a mesh into a triangle list, transforming positions and normals.
fn triangle_list(
    mesh: &SceneMesh,
    transform: Mat4,
    influences: impl Fn(u32) -> VertexInfluences,
) -> VertexAttributes {
    let normals = mesh.normals_or_computed();
    let normal_matrix = Mat3::from_mat4(transform).inverse().transpose();

    let mut attributes = VertexAttributes::with_capacity(mesh.faces.len() * 3);
    for face in &mesh.faces {
        for &index in face {
            let i = index as usize;
            attributes.push(
                transform.transform_point3(mesh.positions[i]),
                (normal_matrix * normals[i]).normalize_or_zero(),
                mesh.uvs.get(i).copied().unwrap_or(Vec2::ZERO),
                influences(index),
            );
        }
    }
    attributes
}

/// One draw object per mesh instance, baked with its node's global transform.
///
/// Skinned meshes ignore node placement; their bind pose is already in mesh
/// space.
pub fn static_mesh_from_scene(scene: &SceneGraph) -> DrawMesh {
    let mut draw_mesh = DrawMesh::new();

    let mut stack = vec![(&scene.root, Mat4::IDENTITY)];
    while let Some((node, parent_global)) = stack.pop() {
        let global = parent_global * node.transform;

        for &index in &node.meshes {
            let Some(mesh) = scene.meshes.get(index) else {
                continue;
            };
            let transform = if mesh.has_bones() { Mat4::IDENTITY } else { global };
            draw_mesh.push(DrawObject::new(
                mesh.name.clone(),
                triangle_list(mesh, transform, |_| VertexInfluences::default()),
                material_for(scene, mesh),
            ));
        }

        stack.extend(node.children.iter().rev().map(|child| (child, global)));
    }

    draw_mesh
}

/// A skinned visual mesh and the skeleton that drives it
#[derive(Debug)]
pub struct SkinnedMesh {
    pub mesh: DrawMesh,
    pub skeleton: Skeleton,
}

impl SkinnedMesh {
    pub fn from_scene(scene: &SceneGraph) -> Result<Self, SkeletonError> {
        Self::from_scene_with(scene, WeightCapPolicy::default())
    }

    pub fn from_scene_with(scene: &SceneGraph, policy: WeightCapPolicy) -> Result<Self, SkeletonError> {
        let skeleton = build_skeleton_with(scene, policy)?;
        let influences = skeleton.influences();

        // Vertex ids are global across meshes in scene order
        let mut mesh = DrawMesh::new();
        let mut offset = 0u32;
        for scene_mesh in &scene.meshes {
            let attributes = triangle_list(scene_mesh, Mat4::IDENTITY, |index| {
                influences
                    .get((offset + index) as usize)
                    .copied()
                    .unwrap_or_default()
            });
            mesh.push(DrawObject::new(
                scene_mesh.name.clone(),
                attributes,
                material_for(scene, scene_mesh),
            ));
            offset += scene_mesh.positions.len() as u32;
        }

        info!(
            "Skinned mesh: {} objects, {} bones",
            mesh.len(),
            skeleton.bone_count()
        );

        Ok(Self { mesh, skeleton })
    }
}

/// Load an asset and build its skinned mesh.
pub fn load_skinned_mesh(path: &Path) -> Result<SkinnedMesh, ColliderError> {
    let scene = load_scene(path)?;
    Ok(SkinnedMesh::from_scene(&scene)?)
}
