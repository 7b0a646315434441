//! Collider exchange documents
//!
//! A JSON document with a top-level `parts` list. Each part carries flat
//! `vertices` (xyz triples) and `triangles` (index triples). Rigged collider
//! exports add the owning bone and display color, which plain readers ignore.

use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::scene::{SceneGraph, SceneMesh, SceneNode};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartsDocument {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub vertices: Vec<f32>,
    pub triangles: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bone: Option<PartBone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[f32; 3]>,
}

/// Bone a rigged part is rigidly attached to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartBone {
    pub name: String,
    pub id: usize,
    /// Column-major offset (inverse bind) matrix
    pub offset_matrix: [f32; 16],
}

impl Part {
    pub fn from_geometry(vertices: &[Vec3], faces: &[[u32; 3]]) -> Self {
        Self {
            vertices: vertices.iter().flat_map(|v| v.to_array()).collect(),
            triangles: faces.iter().flatten().copied().collect(),
            ..Default::default()
        }
    }

    /// Validate and unflatten into positions and faces.
    pub fn geometry(&self, index: usize) -> Result<(Vec<Vec3>, Vec<[u32; 3]>), ImportError> {
        let invalid = |message: String| ImportError::InvalidMesh {
            name: self.name.clone().unwrap_or_else(|| format!("part {index}")),
            message,
        };

        if self.vertices.len() % 3 != 0 {
            return Err(invalid(format!(
                "{} vertex coordinates is not a multiple of 3",
                self.vertices.len()
            )));
        }
        if self.triangles.len() % 3 != 0 {
            return Err(invalid(format!(
                "{} triangle indices is not a multiple of 3",
                self.triangles.len()
            )));
        }

        let positions: Vec<Vec3> = self
            .vertices
            .chunks_exact(3)
            .map(Vec3::from_slice)
            .collect();
        if let Some(&bad) = self
            .triangles
            .iter()
            .find(|&&i| i as usize >= positions.len())
        {
            return Err(invalid(format!(
                "index {bad} exceeds {} vertices",
                positions.len()
            )));
        }
        let faces = self
            .triangles
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();

        Ok((positions, faces))
    }
}

/// Load an exchange document from disk.
pub fn load(path: &Path) -> Result<SceneGraph, ImportError> {
    let text = fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text)
}

/// Parse an exchange document; each part becomes a mesh under the root.
pub fn parse(text: &str) -> Result<SceneGraph, ImportError> {
    let document: PartsDocument = serde_json::from_str(text)?;

    let mut scene = SceneGraph {
        root: SceneNode::new("parts"),
        ..Default::default()
    };
    for (index, part) in document.parts.iter().enumerate() {
        let (positions, faces) = part.geometry(index)?;
        let name = part
            .name
            .clone()
            .unwrap_or_else(|| format!("part_{index}"));

        let mut node = SceneNode::new(name.clone());
        node.meshes.push(scene.meshes.len());
        scene.root.children.push(node);
        scene.meshes.push(SceneMesh {
            name,
            positions,
            faces,
            ..Default::default()
        });
    }

    Ok(scene)
}
