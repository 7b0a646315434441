//! glTF 2.0 / GLB import
//!
//! Nodes keep their glTF names (unnamed nodes become `node_{index}`). Every
//! triangle primitive instanced by a node becomes one [`SceneMesh`]; when the
//! node has a skin, each joint becomes a [`SceneBone`] whose offset matrix is
//! the joint's inverse bind matrix. Animation times are in seconds, so
//! animations import with one tick per second.

use std::path::Path;

use glam::{Mat4, Quat, Vec2, Vec3};
use gltf::animation::util::ReadOutputs;
use gltf::animation::{Interpolation, Property};
use gltf::buffer::Data;
use gltf::mesh::Mode;
use tracing::{debug, warn};

use crate::error::ImportError;
use crate::scene::{
    NodeChannel, SceneAnimation, SceneBone, SceneGraph, SceneMaterial, SceneMesh, SceneNode,
    VertexWeight,
};
use crate::skeleton::Keyframe;

/// Load a `.gltf` or `.glb` file.
pub fn load(path: &Path) -> Result<SceneGraph, ImportError> {
    let (document, buffers, _images) = gltf::import(path).map_err(|source| match source {
        gltf::Error::Io(source) => ImportError::Io {
            path: path.to_path_buf(),
            source,
        },
        source => ImportError::Gltf {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let mut scene = SceneGraph {
        materials: document.materials().map(convert_material).collect(),
        ..Default::default()
    };

    let gltf_scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| ImportError::Empty(format!("{}: no scenes", path.display())))?;

    let mut root = SceneNode::new(gltf_scene.name().unwrap_or("Scene"));
    for node in gltf_scene.nodes() {
        root.children.push(convert_node(&node, &buffers, &mut scene.meshes)?);
    }
    scene.root = root;

    scene.animations = document
        .animations()
        .map(|animation| convert_animation(&animation, &buffers))
        .collect();

    Ok(scene)
}

fn node_name(node: &gltf::Node) -> String {
    node.name()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("node_{}", node.index()))
}

fn convert_node(
    node: &gltf::Node,
    buffers: &[Data],
    meshes: &mut Vec<SceneMesh>,
) -> Result<SceneNode, ImportError> {
    let mut converted = SceneNode::new(node_name(node))
        .with_transform(Mat4::from_cols_array_2d(&node.transform().matrix()));

    if let Some(mesh) = node.mesh() {
        let bones = match node.skin() {
            Some(skin) => skin_bones(&skin, buffers),
            None => Vec::new(),
        };

        for (index, primitive) in mesh.primitives().enumerate() {
            if primitive.mode() != Mode::Triangles {
                warn!(
                    "Skipping non-triangle primitive {} of mesh '{}'",
                    index,
                    mesh.name().unwrap_or("unnamed")
                );
                continue;
            }
            let name = match mesh.name() {
                Some(name) if index == 0 => name.to_string(),
                Some(name) => format!("{name}_{index}"),
                None => format!("mesh_{}_{index}", mesh.index()),
            };
            converted.meshes.push(meshes.len());
            meshes.push(convert_primitive(&primitive, name, &bones, buffers)?);
        }
    }

    for child in node.children() {
        converted.children.push(convert_node(&child, buffers, meshes)?);
    }

    Ok(converted)
}

/// Joint names and offset matrices. Weights are filled per primitive.
fn skin_bones(skin: &gltf::Skin, buffers: &[Data]) -> Vec<SceneBone> {
    let reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
    let mut inverse_binds = reader
        .read_inverse_bind_matrices()
        .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter();

    skin.joints()
        .map(|joint| SceneBone {
            name: node_name(&joint),
            // Missing inverse bind matrices default to identity
            offset_matrix: inverse_binds.next().unwrap_or(Mat4::IDENTITY),
            weights: Vec::new(),
        })
        .collect()
}

fn convert_primitive(
    primitive: &gltf::Primitive,
    name: String,
    skin_bones: &[SceneBone],
    buffers: &[Data],
) -> Result<SceneMesh, ImportError> {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions: Vec<Vec3> = reader
        .read_positions()
        .ok_or_else(|| ImportError::Empty(format!("mesh '{name}' has no positions")))?
        .map(Vec3::from_array)
        .collect();

    let normals: Vec<Vec3> = reader
        .read_normals()
        .map(|iter| iter.map(Vec3::from_array).collect())
        .filter(|n: &Vec<Vec3>| n.len() == positions.len())
        .unwrap_or_default();

    let uvs: Vec<Vec2> = reader
        .read_tex_coords(0)
        .map(|iter| iter.into_f32().map(Vec2::from_array).collect())
        .filter(|uv: &Vec<Vec2>| uv.len() == positions.len())
        .unwrap_or_default();

    // Non-indexed primitives list their vertices in triangle order
    let indices: Vec<u32> = match reader.read_indices() {
        Some(iter) => iter.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
        return Err(ImportError::InvalidMesh {
            message: format!("index {bad} exceeds {} vertices", positions.len()),
            name,
        });
    }
    let faces = indices
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();

    let mut bones = skin_bones.to_vec();
    if !bones.is_empty() {
        match (reader.read_joints(0), reader.read_weights(0)) {
            (Some(joints), Some(weights)) => {
                for (vertex, (joint_set, weight_set)) in
                    joints.into_u16().zip(weights.into_f32()).enumerate()
                {
                    for (joint, weight) in joint_set.into_iter().zip(weight_set) {
                        if weight <= 0.0 {
                            continue;
                        }
                        match bones.get_mut(joint as usize) {
                            Some(bone) => bone.weights.push(VertexWeight {
                                vertex: vertex as u32,
                                weight,
                            }),
                            None => warn!(
                                "Mesh '{}' vertex {} references joint {} of {}",
                                name,
                                vertex,
                                joint,
                                bones.len()
                            ),
                        }
                    }
                }
            }
            _ => warn!("Mesh '{}' has a skin but no JOINTS_0/WEIGHTS_0", name),
        }
    }

    Ok(SceneMesh {
        name,
        positions,
        normals,
        uvs,
        faces,
        bones,
        material: primitive.material().index(),
    })
}

fn convert_material(material: gltf::Material) -> SceneMaterial {
    let [r, g, b, a] = material.pbr_metallic_roughness().base_color_factor();
    SceneMaterial {
        name: material.name().unwrap_or("material").to_string(),
        diffuse: Vec3::new(r, g, b),
        opacity: a,
    }
}

fn convert_animation(animation: &gltf::Animation, buffers: &[Data]) -> SceneAnimation {
    let mut channels: Vec<NodeChannel> = Vec::new();
    let mut duration = 0.0_f64;

    for channel in animation.channels() {
        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
        let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs()) else {
            continue;
        };
        let times: Vec<f64> = inputs.map(f64::from).collect();
        duration = times.iter().copied().fold(duration, f64::max);

        let cubic = channel.sampler().interpolation() == Interpolation::CubicSpline;

        let target = node_name(&channel.target().node());
        let index = match channels.iter().position(|c| c.node_name == target) {
            Some(index) => index,
            None => {
                channels.push(NodeChannel {
                    node_name: target,
                    ..Default::default()
                });
                channels.len() - 1
            }
        };
        let node_channel = &mut channels[index];

        match (channel.target().property(), outputs) {
            (Property::Translation, ReadOutputs::Translations(values)) => {
                node_channel.position_keys =
                    keyframes(&times, values.map(Vec3::from_array).collect(), cubic);
            }
            (Property::Rotation, ReadOutputs::Rotations(values)) => {
                let values: Vec<Quat> = values
                    .into_f32()
                    .map(|q| Quat::from_array(q).normalize())
                    .collect();
                node_channel.rotation_keys = keyframes(&times, values, cubic);
            }
            (Property::Scale, ReadOutputs::Scales(values)) => {
                node_channel.scale_keys =
                    keyframes(&times, values.map(Vec3::from_array).collect(), cubic);
            }
            (property, _) => debug!("Ignoring {:?} channel on '{}'", property, node_channel.node_name),
        }
    }

    SceneAnimation {
        name: animation.name().unwrap_or_default().to_string(),
        ticks_per_second: 1.0,
        duration,
        channels,
    }
}

/// Pair sampler times with output values.
///
/// Cubic spline outputs are (in-tangent, value, out-tangent) triples; only the
/// value is kept.
fn keyframes<V: Copy>(times: &[f64], values: Vec<V>, cubic: bool) -> Vec<Keyframe<V>> {
    let values: Vec<V> = if cubic {
        values.chunks(3).filter_map(|c| c.get(1).copied()).collect()
    } else {
        values
    };
    times
        .iter()
        .zip(values)
        .map(|(&time, value)| Keyframe::new(time, value))
        .collect()
}
