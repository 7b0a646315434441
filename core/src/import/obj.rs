//! Wavefront OBJ import
//!
//! Each `o`/`g` statement starts a new mesh. Polygons are fan-triangulated.
//! Corners are deduplicated per mesh on their full `v/vt/vn` reference.

use std::fs;
use std::path::Path;

use glam::{Vec2, Vec3};
use hashbrown::HashMap;

use crate::error::ImportError;
use crate::scene::{SceneGraph, SceneMesh, SceneNode};

/// Load an OBJ file from disk.
pub fn load(path: &Path) -> Result<SceneGraph, ImportError> {
    let text = fs::read_to_string(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("obj");
    parse(&text, name)
}

/// Corner reference: position, texcoord, normal (0-based)
type Corner = (usize, Option<usize>, Option<usize>);

#[derive(Default)]
struct MeshBuilder {
    mesh: SceneMesh,
    corners: HashMap<Corner, u32>,
    has_normals: bool,
    has_uvs: bool,
}

impl MeshBuilder {
    fn named(name: String) -> Self {
        Self {
            mesh: SceneMesh {
                name,
                ..Default::default()
            },
            has_normals: true,
            has_uvs: true,
            ..Default::default()
        }
    }

    fn corner(&mut self, corner: Corner, pools: &Pools) -> u32 {
        if let Some(&index) = self.corners.get(&corner) {
            return index;
        }
        let (vi, vti, vni) = corner;
        let index = self.mesh.positions.len() as u32;
        self.mesh.positions.push(pools.positions[vi]);
        match vti {
            Some(ti) => self.mesh.uvs.push(pools.uvs[ti]),
            None => self.has_uvs = false,
        }
        match vni {
            Some(ni) => self.mesh.normals.push(pools.normals[ni]),
            None => self.has_normals = false,
        }
        self.corners.insert(corner, index);
        index
    }

    fn finish(mut self) -> Option<SceneMesh> {
        if self.mesh.faces.is_empty() {
            return None;
        }
        if !self.has_normals {
            self.mesh.normals.clear();
        }
        if !self.has_uvs {
            self.mesh.uvs.clear();
        }
        Some(self.mesh)
    }
}

#[derive(Default)]
struct Pools {
    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    normals: Vec<Vec3>,
}

/// Parse OBJ text. `name` labels the scene root and an unnamed first mesh.
pub fn parse(text: &str, name: &str) -> Result<SceneGraph, ImportError> {
    let mut pools = Pools::default();
    let mut meshes: Vec<SceneMesh> = Vec::new();
    let mut current = MeshBuilder::named(name.to_string());

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        let args: Vec<&str> = parts.collect();

        match keyword {
            "v" => pools.positions.push(parse_vec3(&args, line_no)?),
            "vn" => pools.normals.push(parse_vec3(&args, line_no)?),
            "vt" => {
                let [u, v] = parse_floats::<2>(&args, line_no)?;
                pools.uvs.push(Vec2::new(u, v));
            }
            "o" | "g" => {
                let group = args.join(" ");
                let next = MeshBuilder::named(if group.is_empty() {
                    format!("{name}_{}", meshes.len() + 1)
                } else {
                    group
                });
                if let Some(mesh) = std::mem::replace(&mut current, next).finish() {
                    meshes.push(mesh);
                }
            }
            "f" => {
                if args.len() < 3 {
                    return Err(parse_error(line_no, "face needs at least 3 vertices"));
                }
                let corners = args
                    .iter()
                    .map(|arg| parse_obj_vertex(arg, &pools, line_no))
                    .collect::<Result<Vec<_>, _>>()?;
                let indices: Vec<u32> = corners
                    .into_iter()
                    .map(|corner| current.corner(corner, &pools))
                    .collect();

                // Fan triangulation (convex polygons)
                for i in 1..indices.len() - 1 {
                    current
                        .mesh
                        .faces
                        .push([indices[0], indices[i], indices[i + 1]]);
                }
            }
            // Materials, smoothing groups and curves carry nothing we use
            _ => {}
        }
    }

    if let Some(mesh) = current.finish() {
        meshes.push(mesh);
    }
    if meshes.is_empty() {
        return Err(ImportError::Empty(format!("{name}: no faces in OBJ")));
    }

    let mut root = SceneNode::new(name);
    for (index, mesh) in meshes.iter().enumerate() {
        let mut node = SceneNode::new(mesh.name.clone());
        node.meshes.push(index);
        root.children.push(node);
    }

    Ok(SceneGraph {
        root,
        meshes,
        ..Default::default()
    })
}

fn parse_error(line: usize, message: impl Into<String>) -> ImportError {
    ImportError::Parse {
        format: "OBJ",
        line,
        message: message.into(),
    }
}

fn parse_floats<const N: usize>(args: &[&str], line: usize) -> Result<[f32; N], ImportError> {
    if args.len() < N {
        return Err(parse_error(line, format!("expected {N} components")));
    }
    let mut values = [0.0; N];
    for (value, arg) in values.iter_mut().zip(args) {
        *value = arg
            .parse()
            .map_err(|_| parse_error(line, format!("invalid number '{arg}'")))?;
    }
    Ok(values)
}

fn parse_vec3(args: &[&str], line: usize) -> Result<Vec3, ImportError> {
    parse_floats::<3>(args, line).map(Vec3::from_array)
}

/// Parse a vertex reference: "v", "v/vt", "v/vt/vn" or "v//vn".
///
/// Indices are 1-based; negative indices count back from the latest element.
fn parse_obj_vertex(s: &str, pools: &Pools, line: usize) -> Result<Corner, ImportError> {
    let mut parts = s.split('/');
    let vi = resolve_index(parts.next(), pools.positions.len(), line)?
        .ok_or_else(|| parse_error(line, format!("missing position index in '{s}'")))?;
    let vti = resolve_index(parts.next(), pools.uvs.len(), line)?;
    let vni = resolve_index(parts.next(), pools.normals.len(), line)?;
    Ok((vi, vti, vni))
}

fn resolve_index(part: Option<&str>, len: usize, line: usize) -> Result<Option<usize>, ImportError> {
    let Some(part) = part.filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    let raw: i64 = part
        .parse()
        .map_err(|_| parse_error(line, format!("invalid index '{part}'")))?;

    let resolved = match raw {
        0 => None,
        r if r > 0 => Some(r as usize - 1),
        r => len.checked_sub(r.unsigned_abs() as usize),
    };
    match resolved {
        Some(index) if index < len => Ok(Some(index)),
        _ => Err(parse_error(line, format!("index {raw} out of range ({len} elements)"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# a unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
f 1//1 2//1 3//1 4//1
";

    #[test]
    fn test_quad_is_fan_triangulated() {
        let scene = parse(QUAD, "quad").unwrap();
        assert_eq!(scene.meshes.len(), 1);

        let mesh = &scene.meshes[0];
        assert_eq!(mesh.name, "quad");
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(mesh.normals, vec![Vec3::Z; 4]);
        assert!(mesh.uvs.is_empty());
        assert_eq!(scene.root.children[0].meshes, vec![0]);
    }

    #[test]
    fn test_objects_become_meshes() {
        let text = "\
o Collider_00
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
o Collider_01
v 0 0 1
v 1 0 1
v 0 1 1
f 4 5 6
f -3 -2 -1
";
        let scene = parse(text, "colliders").unwrap();
        let names: Vec<_> = scene.meshes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Collider_00", "Collider_01"]);

        // Relative indices resolve to the same corners and are deduplicated
        let second = &scene.meshes[1];
        assert_eq!(second.positions.len(), 3);
        assert_eq!(second.faces, vec![[0, 1, 2], [0, 1, 2]]);
        assert_eq!(second.positions[0], Vec3::Z);
    }

    #[test]
    fn test_missing_normals_are_dropped() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2 3\n";
        let scene = parse(text, "mixed").unwrap();
        assert!(scene.meshes[0].normals.is_empty());
    }

    #[test]
    fn test_malformed_input() {
        let err = parse("v 0 zero 0\n", "bad").unwrap_err();
        assert!(matches!(err, ImportError::Parse { line: 1, .. }));

        let err = parse("v 0 0 0\nv 1 0 0\nf 1 2 9\n", "bad").unwrap_err();
        assert!(matches!(err, ImportError::Parse { line: 3, .. }));

        let err = parse("v 0 0 0\n", "empty").unwrap_err();
        assert!(matches!(err, ImportError::Empty(_)));
    }
}
