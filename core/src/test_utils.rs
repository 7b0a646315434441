//! Shared fixtures for unit tests

use std::fs;
use std::path::{Path, PathBuf};

use bytemuck::Pod;
use glam::{Mat4, Quat, Vec3};
use hashbrown::HashMap;
use serde_json::{Value, json};

use crate::scene::{
    NodeChannel, SceneAnimation, SceneBone, SceneGraph, SceneMesh, SceneNode, VertexWeight,
};
use crate::skeleton::{Keyframe, Skeleton, build_skeleton};

/// A bone-named node placed relative to its parent
pub fn bone_node(name: &str, transform: Mat4) -> SceneNode {
    SceneNode::new(name).with_transform(transform)
}

fn cube(center: Vec3, half: f32) -> (Vec<Vec3>, Vec<[u32; 3]>) {
    let mut corners = Vec::with_capacity(8);
    for i in 0..8 {
        let sign = |bit: u32| if i & bit == 0 { -half } else { half };
        corners.push(center + Vec3::new(sign(1), sign(2), sign(4)));
    }
    let faces = vec![
        [0, 2, 1], [1, 2, 3], [4, 5, 6], [5, 7, 6],
        [0, 1, 4], [1, 5, 4], [2, 6, 3], [3, 6, 7],
        [0, 4, 2], [2, 4, 6], [1, 3, 5], [3, 7, 5],
    ];
    (corners, faces)
}

fn tetra(center: Vec3, size: f32) -> (Vec<Vec3>, Vec<[u32; 3]>) {
    let corners = vec![
        center,
        center + Vec3::X * size,
        center + Vec3::Y * size,
        center + Vec3::Z * size,
    ];
    (corners, vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]])
}

/// A small humanoid: `Root -> Spine -> {LeftArm, RightArm}` under a non-bone
/// `Armature` node, skinning one mesh.
///
/// Spine weights a cube of 8 vertices, each arm a tetrahedron and Root a
/// single vertex. The scene carries one `wave` animation on the left arm.
pub fn scenario_scene() -> SceneGraph {
    let spine_global = Mat4::from_translation(Vec3::Y);
    let left_global = Mat4::from_translation(Vec3::new(-1.0, 1.0, 0.0));
    let right_global = Mat4::from_translation(Vec3::new(1.0, 1.0, 0.0));

    let mut positions = vec![Vec3::ZERO];
    let mut faces = Vec::new();
    let mut bones = vec![SceneBone {
        name: "Root".into(),
        offset_matrix: Mat4::IDENTITY,
        weights: vec![VertexWeight { vertex: 0, weight: 1.0 }],
    }];

    let parts = [
        ("Spine", spine_global, cube(Vec3::Y, 0.25)),
        ("LeftArm", left_global, tetra(Vec3::new(-1.2, 0.9, -0.1), 0.3)),
        ("RightArm", right_global, tetra(Vec3::new(0.9, 0.9, -0.1), 0.3)),
    ];
    for (name, global, (corners, part_faces)) in parts {
        let base = positions.len() as u32;
        faces.extend(part_faces.iter().map(|f| f.map(|i| i + base)));
        bones.push(SceneBone {
            name: name.into(),
            offset_matrix: global.inverse(),
            weights: (base..base + corners.len() as u32)
                .map(|vertex| VertexWeight { vertex, weight: 1.0 })
                .collect(),
        });
        positions.extend(corners);
    }
    // Tie the root vertex to the spine cube
    faces.push([0, 1, 2]);

    let mut body = SceneNode::new("Body");
    body.meshes.push(0);

    let armature = SceneNode::new("Armature").with_child(
        bone_node("Root", Mat4::IDENTITY).with_child(
            bone_node("Spine", Mat4::from_translation(Vec3::Y))
                .with_child(bone_node("LeftArm", Mat4::from_translation(-Vec3::X)))
                .with_child(bone_node("RightArm", Mat4::from_translation(Vec3::X))),
        ),
    );

    let wave = SceneAnimation {
        name: "wave".into(),
        ticks_per_second: 25.0,
        duration: 50.0,
        channels: vec![NodeChannel {
            node_name: "LeftArm".into(),
            position_keys: vec![Keyframe::new(0.0, -Vec3::X)],
            rotation_keys: vec![
                Keyframe::new(0.0, Quat::IDENTITY),
                Keyframe::new(25.0, Quat::from_rotation_z(0.5)),
                Keyframe::new(50.0, Quat::IDENTITY),
            ],
            scale_keys: Vec::new(),
        }],
    };

    SceneGraph {
        root: SceneNode::new("Scene").with_child(armature).with_child(body),
        meshes: vec![SceneMesh {
            name: "Body".into(),
            positions,
            faces,
            bones,
            ..Default::default()
        }],
        animations: vec![wave],
        ..Default::default()
    }
}

/// Two bones, `root` at the origin and `tip` one unit up, with no animations.
pub fn chain_skeleton() -> Skeleton {
    let tip_global = Mat4::from_translation(Vec3::Y);
    let scene = SceneGraph {
        root: SceneNode::new("scene").with_child(
            bone_node("root", Mat4::IDENTITY).with_child(bone_node("tip", tip_global)),
        ),
        meshes: vec![SceneMesh {
            name: "chain".into(),
            positions: vec![Vec3::ZERO, Vec3::Y, Vec3::Y * 2.0],
            faces: vec![[0, 1, 2]],
            bones: vec![
                SceneBone {
                    name: "root".into(),
                    offset_matrix: Mat4::IDENTITY,
                    weights: vec![
                        VertexWeight { vertex: 0, weight: 1.0 },
                        VertexWeight { vertex: 2, weight: 0.5 },
                    ],
                },
                SceneBone {
                    name: "tip".into(),
                    offset_matrix: tip_global.inverse(),
                    weights: vec![
                        VertexWeight { vertex: 1, weight: 1.0 },
                        VertexWeight { vertex: 2, weight: 0.5 },
                    ],
                },
            ],
            ..Default::default()
        }],
        ..Default::default()
    };
    build_skeleton(&scene).unwrap()
}

const FLOAT: u32 = 5126;
const UNSIGNED_SHORT: u32 = 5123;
const UNSIGNED_INT: u32 = 5125;

#[derive(Default)]
struct GlbBuilder {
    bin: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl GlbBuilder {
    fn accessor<T: Pod>(&mut self, data: &[T], component_type: u32, kind: &str) -> usize {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.views.push(json!({
            "buffer": 0,
            "byteOffset": self.bin.len(),
            "byteLength": bytes.len(),
        }));
        self.bin.extend_from_slice(bytes);
        self.accessors.push(json!({
            "bufferView": self.views.len() - 1,
            "componentType": component_type,
            "count": data.len(),
            "type": kind,
        }));
        self.accessors.len() - 1
    }

    fn bounded<const N: usize>(&mut self, data: &[[f32; N]], kind: &str) -> usize
    where
        [f32; N]: Pod,
    {
        let index = self.accessor(data, FLOAT, kind);
        let mut min = [f32::MAX; N];
        let mut max = [f32::MIN; N];
        for value in data {
            for i in 0..N {
                min[i] = min[i].min(value[i]);
                max[i] = max[i].max(value[i]);
            }
        }
        self.accessors[index]["min"] = json!(min.to_vec());
        self.accessors[index]["max"] = json!(max.to_vec());
        index
    }
}

fn push_node(
    node: &SceneNode,
    nodes: &mut Vec<Value>,
    by_name: &mut HashMap<String, usize>,
    mesh_nodes: &mut Vec<(usize, usize)>,
) -> usize {
    let index = nodes.len();
    nodes.push(Value::Null);
    by_name.insert(node.name.clone(), index);
    if let Some(&mesh) = node.meshes.first() {
        mesh_nodes.push((index, mesh));
    }

    let children: Vec<usize> = node
        .children
        .iter()
        .map(|child| push_node(child, nodes, by_name, mesh_nodes))
        .collect();

    let (scale, rotation, translation) = node.transform.to_scale_rotation_translation();
    let mut value = json!({
        "name": node.name,
        "translation": translation.to_array(),
        "rotation": rotation.to_array(),
        "scale": scale.to_array(),
    });
    if !children.is_empty() {
        value["children"] = json!(children);
    }
    nodes[index] = value;
    index
}

/// Encode a scene as GLB. Each node instances at most its first mesh.
pub fn glb_bytes(scene: &SceneGraph) -> Vec<u8> {
    let mut builder = GlbBuilder::default();
    let mut nodes = Vec::new();
    let mut by_name = HashMap::new();
    let mut mesh_nodes = Vec::new();
    let roots: Vec<usize> = scene
        .root
        .children
        .iter()
        .map(|child| push_node(child, &mut nodes, &mut by_name, &mut mesh_nodes))
        .collect();

    let mut meshes = Vec::new();
    let mut skins = Vec::new();
    for mesh in &scene.meshes {
        let positions: Vec<[f32; 3]> = mesh.positions.iter().map(|p| p.to_array()).collect();
        let indices: Vec<u32> = mesh.faces.iter().flatten().copied().collect();
        let mut attributes = json!({ "POSITION": builder.bounded(&positions, "VEC3") });

        if mesh.has_bones() {
            let mut joints = vec![[0u16; 4]; mesh.positions.len()];
            let mut weights = vec![[0f32; 4]; mesh.positions.len()];
            for (joint, bone) in mesh.bones.iter().enumerate() {
                for w in &bone.weights {
                    let v = w.vertex as usize;
                    if let Some(slot) = weights[v].iter().position(|&x| x == 0.0) {
                        joints[v][slot] = joint as u16;
                        weights[v][slot] = w.weight;
                    }
                }
            }
            attributes["JOINTS_0"] = json!(builder.accessor(&joints, UNSIGNED_SHORT, "VEC4"));
            attributes["WEIGHTS_0"] = json!(builder.accessor(&weights, FLOAT, "VEC4"));

            let inverse_binds: Vec<[f32; 16]> =
                mesh.bones.iter().map(|b| b.offset_matrix.to_cols_array()).collect();
            let joint_nodes: Vec<usize> = mesh.bones.iter().map(|b| by_name[&b.name]).collect();
            skins.push((
                meshes.len(),
                json!({
                    "joints": joint_nodes,
                    "inverseBindMatrices": builder.accessor(&inverse_binds, FLOAT, "MAT4"),
                }),
            ));
        }

        let indices = builder.accessor(&indices, UNSIGNED_INT, "SCALAR");
        meshes.push(json!({
            "name": mesh.name,
            "primitives": [{ "attributes": attributes, "indices": indices }],
        }));
    }

    for &(node, mesh) in &mesh_nodes {
        nodes[node]["mesh"] = json!(mesh);
        if let Some(skin) = skins.iter().position(|(m, _)| *m == mesh) {
            nodes[node]["skin"] = json!(skin);
        }
    }

    let mut animations = Vec::new();
    for animation in &scene.animations {
        let tps = animation.ticks_per_second;
        let mut samplers = Vec::new();
        let mut channels = Vec::new();
        for channel in &animation.channels {
            let node = by_name[&channel.node_name];
            let seconds = |time: f64| [(time / tps) as f32];

            if !channel.position_keys.is_empty() {
                let times: Vec<[f32; 1]> = channel.position_keys.iter().map(|k| seconds(k.time)).collect();
                let values: Vec<[f32; 3]> = channel.position_keys.iter().map(|k| k.value.to_array()).collect();
                samplers.push(json!({
                    "input": builder.bounded(&times, "SCALAR"),
                    "output": builder.accessor(&values, FLOAT, "VEC3"),
                }));
                channels.push(json!({
                    "sampler": samplers.len() - 1,
                    "target": { "node": node, "path": "translation" },
                }));
            }
            if !channel.rotation_keys.is_empty() {
                let times: Vec<[f32; 1]> = channel.rotation_keys.iter().map(|k| seconds(k.time)).collect();
                let values: Vec<[f32; 4]> = channel.rotation_keys.iter().map(|k| k.value.to_array()).collect();
                samplers.push(json!({
                    "input": builder.bounded(&times, "SCALAR"),
                    "output": builder.accessor(&values, FLOAT, "VEC4"),
                }));
                channels.push(json!({
                    "sampler": samplers.len() - 1,
                    "target": { "node": node, "path": "rotation" },
                }));
            }
        }
        animations.push(json!({
            "name": animation.name,
            "samplers": samplers,
            "channels": channels,
        }));
    }

    while builder.bin.len() % 4 != 0 {
        builder.bin.push(0);
    }
    let mut document = json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "name": scene.root.name, "nodes": roots }],
        "nodes": nodes,
        "meshes": meshes,
        "accessors": builder.accessors,
        "bufferViews": builder.views,
        "buffers": [{ "byteLength": builder.bin.len() }],
    });
    if !skins.is_empty() {
        document["skins"] = json!(skins.into_iter().map(|(_, skin)| skin).collect::<Vec<_>>());
    }
    if !animations.is_empty() {
        document["animations"] = json!(animations);
    }

    let mut json_chunk = serde_json::to_vec(&document).unwrap();
    while json_chunk.len() % 4 != 0 {
        json_chunk.push(b' ');
    }

    let total = 12 + 8 + json_chunk.len() + 8 + builder.bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
    glb.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
    glb.extend_from_slice(&json_chunk);
    glb.extend_from_slice(&(builder.bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(&0x004E_4942u32.to_le_bytes());
    glb.extend_from_slice(&builder.bin);
    glb
}

/// Write [`scenario_scene`] as `scenario.glb` into `dir`.
pub fn write_scenario_glb(dir: &Path) -> PathBuf {
    let path = dir.join("scenario.glb");
    fs::write(&path, glb_bytes(&scenario_scene())).unwrap();
    path
}
