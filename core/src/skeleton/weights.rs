//! Per-vertex bone attribution
//!
//! Raw importer weights are recorded on the skeleton unchanged (bone weight
//! maps plus the vertex -> bones index used by skeletal decomposition). The
//! GPU-facing [`VertexInfluences`] are capped at [`MAX_BONES_PER_VERTEX`] and
//! normalized.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

use super::{BoneId, Skeleton};
use crate::error::SkeletonError;
use crate::scene::SceneMesh;

pub const MAX_BONES_PER_VERTEX: usize = 4;

/// Which weights survive when a vertex has more than
/// [`MAX_BONES_PER_VERTEX`] influences
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeightCapPolicy {
    /// Keep the largest weights
    #[default]
    Strongest,
    /// Keep the first weights in importer order
    FirstSeen,
}

/// Up to four (bone, weight) pairs, weights summing to 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VertexInfluences {
    pub bone_ids: [u32; MAX_BONES_PER_VERTEX],
    pub weights: [f32; MAX_BONES_PER_VERTEX],
}

impl Default for VertexInfluences {
    /// Rigidly bound to bone 0.
    fn default() -> Self {
        Self {
            bone_ids: [0; MAX_BONES_PER_VERTEX],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

impl VertexInfluences {
    /// Cap and normalize raw weights. Non-positive weights are ignored.
    pub fn from_raw(raw: &[(BoneId, f32)], policy: WeightCapPolicy) -> Self {
        let mut kept: SmallVec<[(BoneId, f32); 8]> = raw
            .iter()
            .copied()
            .filter(|(_, w)| w.is_finite() && *w > 0.0)
            .collect();

        if policy == WeightCapPolicy::Strongest {
            // Stable, so ties keep importer order
            kept.sort_by(|a, b| b.1.total_cmp(&a.1));
        }
        kept.truncate(MAX_BONES_PER_VERTEX);

        let total: f32 = kept.iter().map(|(_, w)| w).sum();
        if kept.is_empty() || total <= 0.0 {
            return Self::default();
        }

        let mut influences = Self {
            bone_ids: [0; MAX_BONES_PER_VERTEX],
            weights: [0.0; MAX_BONES_PER_VERTEX],
        };
        for (slot, (bone, weight)) in kept.into_iter().enumerate() {
            influences.bone_ids[slot] = bone as u32;
            influences.weights[slot] = weight / total;
        }
        influences
    }

    /// Non-zero (bone, weight) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (BoneId, f32)> + '_ {
        self.bone_ids
            .iter()
            .zip(self.weights.iter())
            .filter(|(_, w)| **w > 0.0)
            .map(|(b, w)| (*b as BoneId, *w))
    }

    pub fn total_weight(&self) -> f32 {
        self.weights.iter().sum()
    }
}

/// Record skinning data from `meshes` on `skeleton`.
///
/// Meshes are concatenated in order: vertex ids are global across meshes and
/// faces are re-based accordingly. Every bone named by a mesh must already
/// exist in the skeleton.
pub fn attribute_vertices(
    skeleton: &mut Skeleton,
    meshes: &[SceneMesh],
    policy: WeightCapPolicy,
) -> Result<(), SkeletonError> {
    let vertex_total: usize = meshes.iter().map(|mesh| mesh.positions.len()).sum();
    let mut raw: Vec<SmallVec<[(BoneId, f32); MAX_BONES_PER_VERTEX]>> =
        vec![SmallVec::new(); vertex_total];
    let mut vertices = Vec::with_capacity(vertex_total);
    let mut faces = Vec::new();

    let mut offset = 0u32;
    for mesh in meshes {
        for bone in &mesh.bones {
            let id = skeleton
                .bone_id(&bone.name)
                .ok_or_else(|| SkeletonError::MissingBone(bone.name.clone()))?;

            for weight in &bone.weights {
                if weight.vertex as usize >= mesh.positions.len() {
                    return Err(SkeletonError::VertexOutOfRange {
                        bone: bone.name.clone(),
                        vertex: weight.vertex,
                        vertex_count: mesh.positions.len(),
                    });
                }
                if weight.weight <= 0.0 {
                    continue;
                }
                let vertex = offset + weight.vertex;
                raw[vertex as usize].push((id, weight.weight));
                skeleton.record_influence(vertex, id, weight.weight);
            }
        }

        vertices.extend_from_slice(&mesh.positions);
        faces.extend(mesh.faces.iter().map(|face| face.map(|i| i + offset)));
        offset += mesh.positions.len() as u32;
    }

    let capped = raw.iter().filter(|r| r.len() > MAX_BONES_PER_VERTEX).count();
    if capped > 0 {
        debug!(
            "{} vertices have more than {} influences, keeping {:?}",
            capped, MAX_BONES_PER_VERTEX, policy
        );
    }
    let unweighted = raw.iter().filter(|r| r.is_empty()).count();
    if unweighted > 0 {
        debug!("{} vertices have no influences, binding to root", unweighted);
    }

    let influences = raw
        .iter()
        .map(|r| VertexInfluences::from_raw(r, policy))
        .collect();

    skeleton.set_geometry(vertices, faces);
    skeleton.set_influences(influences);
    Ok(())
}
