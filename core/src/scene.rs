//! Format-independent scene graph produced by the importers
//!
//! Every importer (`gltf`, `obj`, exchange-format `parts`) lowers its file into
//! a [`SceneGraph`]. The skeleton builder and mesh assembly only ever look at
//! this representation.

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::skeleton::Keyframe;

/// Imported scene: a node hierarchy plus the flat resource tables it indexes.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    pub root: SceneNode,
    pub meshes: Vec<SceneMesh>,
    pub materials: Vec<SceneMaterial>,
    pub animations: Vec<SceneAnimation>,
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    /// Transform relative to the parent node
    pub transform: Mat4,
    pub children: Vec<SceneNode>,
    /// Indices into [`SceneGraph::meshes`]
    pub meshes: Vec<usize>,
}

impl Default for SceneNode {
    fn default() -> Self {
        Self {
            name: String::new(),
            transform: Mat4::IDENTITY,
            children: Vec::new(),
            meshes: Vec::new(),
        }
    }
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    /// Pre-order iterator over this node and all descendants.
    pub fn iter(&self) -> impl Iterator<Item = &SceneNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

/// Triangle mesh with optional skinning data
#[derive(Debug, Clone, Default)]
pub struct SceneMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    /// Per-vertex normals; empty when the source had none
    pub normals: Vec<Vec3>,
    /// Per-vertex UVs; empty when the source had none
    pub uvs: Vec<Vec2>,
    pub faces: Vec<[u32; 3]>,
    pub bones: Vec<SceneBone>,
    pub material: Option<usize>,
}

impl SceneMesh {
    pub fn has_bones(&self) -> bool {
        !self.bones.is_empty()
    }

    /// Per-vertex normals, computing flat area-weighted normals if missing.
    pub fn normals_or_computed(&self) -> Vec<Vec3> {
        if self.normals.len() == self.positions.len() {
            return self.normals.clone();
        }

        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for face in &self.faces {
            let [a, b, c] = face.map(|i| i as usize);
            if a >= self.positions.len() || b >= self.positions.len() || c >= self.positions.len() {
                continue;
            }
            let n = (self.positions[b] - self.positions[a]).cross(self.positions[c] - self.positions[a]);
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }
        normals.into_iter().map(|n| n.normalize_or(Vec3::Y)).collect()
    }
}

/// A bone reference from a mesh: the node name it binds to, its offset
/// (inverse bind) matrix, and the vertices it influences.
#[derive(Debug, Clone)]
pub struct SceneBone {
    pub name: String,
    pub offset_matrix: Mat4,
    pub weights: Vec<VertexWeight>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexWeight {
    /// Vertex index local to the owning mesh
    pub vertex: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneMaterial {
    pub name: String,
    pub diffuse: Vec3,
    pub opacity: f32,
}

/// A named animation as imported (times in ticks)
#[derive(Debug, Clone, Default)]
pub struct SceneAnimation {
    pub name: String,
    /// Zero means the source did not specify a rate
    pub ticks_per_second: f64,
    pub duration: f64,
    pub channels: Vec<NodeChannel>,
}

/// Keyframe tracks targeting one node
#[derive(Debug, Clone, Default)]
pub struct NodeChannel {
    pub node_name: String,
    pub position_keys: Vec<Keyframe<Vec3>>,
    pub rotation_keys: Vec<Keyframe<Quat>>,
    pub scale_keys: Vec<Keyframe<Vec3>>,
}

impl SceneGraph {
    /// First node named `name` in pre-order.
    pub fn find_node(&self, name: &str) -> Option<&SceneNode> {
        self.root.iter().find(|node| node.name == name)
    }

    /// The first mesh bone named `name`, if any mesh references it.
    pub fn find_bone(&self, name: &str) -> Option<&SceneBone> {
        self.meshes
            .iter()
            .flat_map(|mesh| mesh.bones.iter())
            .find(|bone| bone.name == name)
    }

    /// Unique bone names referenced by any mesh, in first-seen order.
    pub fn bone_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for bone in self.meshes.iter().flat_map(|mesh| mesh.bones.iter()) {
            if !names.contains(&bone.name.as_str()) {
                names.push(&bone.name);
            }
        }
        names
    }

    pub fn is_skinned(&self) -> bool {
        self.meshes.iter().any(SceneMesh::has_bones)
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.positions.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.faces.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bone(name: &str) -> SceneBone {
        SceneBone {
            name: name.to_string(),
            offset_matrix: Mat4::IDENTITY,
            weights: Vec::new(),
        }
    }

    #[test]
    fn test_preorder_iteration() {
        let root = SceneNode::new("root")
            .with_child(SceneNode::new("a").with_child(SceneNode::new("a1")))
            .with_child(SceneNode::new("b"));

        let names: Vec<_> = root.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["root", "a", "a1", "b"]);
    }

    #[test]
    fn test_bone_names_are_unique() {
        let scene = SceneGraph {
            meshes: vec![
                SceneMesh {
                    bones: vec![bone("hip"), bone("spine")],
                    ..Default::default()
                },
                SceneMesh {
                    bones: vec![bone("spine"), bone("head")],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        assert_eq!(scene.bone_names(), ["hip", "spine", "head"]);
        assert!(scene.is_skinned());
        assert!(scene.find_bone("head").is_some());
        assert!(scene.find_bone("tail").is_none());
    }

    #[test]
    fn test_find_node() {
        let scene = SceneGraph {
            root: SceneNode::new("scene").with_child(SceneNode::new("armature")),
            ..Default::default()
        };
        assert!(scene.find_node("armature").is_some());
        assert!(scene.find_node("missing").is_none());
    }

    #[test]
    fn test_computed_flat_normals() {
        let mesh = SceneMesh {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            faces: vec![[0, 1, 2]],
            ..Default::default()
        };
        for n in mesh.normals_or_computed() {
            assert!(n.abs_diff_eq(Vec3::Z, 1e-6));
        }
    }
}
