//! Skeletal decomposition: one rigid convex piece per selected bone
//!
//! Bind-pose vertices are clustered by the bones that influence them (a vertex
//! can land in several clusters). Each non-empty cluster becomes a hull, or
//! an axis-aligned box, bound 100% to its bone so it follows that bone when
//! animated.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec3;
use tracing::{debug, info, warn};

use super::params::ApproximationMode;
use crate::draw::{DrawMesh, DrawObject, Material, VertexAttributes};
use crate::error::GeometryError;
use crate::hull::ConvexHull;
use crate::math::rainbow;
use crate::skeleton::{BoneId, Skeleton, VertexInfluences};

/// Which bones get a collider piece
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BoneSelection {
    /// Branch points of the hierarchy (bones with more than one child)
    #[default]
    Important,
    All,
    Custom(BTreeSet<BoneId>),
}

impl BoneSelection {
    /// Selected bone ids in ascending order.
    pub fn resolve(&self, skeleton: &Skeleton) -> Vec<BoneId> {
        match self {
            BoneSelection::Important => important_bones(skeleton),
            BoneSelection::All => (0..skeleton.bone_count()).collect(),
            BoneSelection::Custom(bones) => bones
                .iter()
                .copied()
                .filter(|&id| {
                    let known = id < skeleton.bone_count();
                    if !known {
                        warn!("Ignoring unknown bone id {} in custom selection", id);
                    }
                    known
                })
                .collect(),
        }
    }

    /// Custom selection from bone names; unknown names are returned as errors.
    pub fn from_names<'a>(
        skeleton: &Skeleton,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, String> {
        names
            .into_iter()
            .map(|name| skeleton.bone_id(name).ok_or_else(|| name.to_string()))
            .collect::<Result<BTreeSet<_>, _>>()
            .map(BoneSelection::Custom)
    }
}

/// Bones with more than one child.
pub fn important_bones(skeleton: &Skeleton) -> Vec<BoneId> {
    skeleton
        .bones()
        .iter()
        .filter(|bone| bone.children.len() > 1)
        .map(|bone| bone.id)
        .collect()
}

/// Result of a skeletal decomposition
#[derive(Debug, Default)]
pub struct SkeletalDecomposition {
    /// One object per bone that produced a piece, tagged with its bone
    pub mesh: DrawMesh,
    /// Selected bones whose clusters were degenerate
    pub skipped: Vec<(BoneId, GeometryError)>,
}

/// Convex hull per important bone.
pub fn decompose_skeleton(skeleton: &Skeleton) -> DrawMesh {
    decompose_skeleton_with(skeleton, &BoneSelection::Important, ApproximationMode::ConvexHull).mesh
}

pub fn decompose_skeleton_with(
    skeleton: &Skeleton,
    selection: &BoneSelection,
    mode: ApproximationMode,
) -> SkeletalDecomposition {
    let bones = selection.resolve(skeleton);
    let colors = rainbow(bones.len());

    let mut clusters: BTreeMap<BoneId, Vec<Vec3>> =
        bones.iter().map(|&bone| (bone, Vec::new())).collect();
    for (vertex, &position) in skeleton.vertices().iter().enumerate() {
        for bone in skeleton.bones_influencing(vertex as u32) {
            if let Some(points) = clusters.get_mut(bone) {
                points.push(position);
            }
        }
    }

    let mut result = SkeletalDecomposition::default();
    for (slot, &bone_id) in bones.iter().enumerate() {
        let points = &clusters[&bone_id];
        let name = skeleton
            .bone(bone_id)
            .map(|bone| bone.name.as_str())
            .unwrap_or_default();

        if points.is_empty() {
            debug!("Bone '{}' has no vertices, skipping", name);
            continue;
        }

        let shape = match mode {
            ApproximationMode::ConvexHull => ConvexHull::try_new(points),
            ApproximationMode::Box => ConvexHull::aabb_box(points),
        };
        let shape = match shape {
            Ok(shape) => shape,
            Err(e) => {
                warn!("Skipping bone '{}' ({} points): {}", name, points.len(), e);
                result.skipped.push((bone_id, e));
                continue;
            }
        };

        let binding = VertexInfluences {
            bone_ids: [bone_id as u32, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
        };
        let mut object = DrawObject::new(
            name,
            VertexAttributes::flat_triangles(&shape.vertices, &shape.faces, binding),
            Material::collider(colors[slot]),
        );
        object.bone = Some(bone_id);
        result.mesh.push(object);
    }

    info!(
        "Skeletal decomposition: {} of {} selected bones produced pieces ({} degenerate)",
        result.mesh.len(),
        bones.len(),
        result.skipped.len()
    );

    result
}
