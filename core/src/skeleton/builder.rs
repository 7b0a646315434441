//! Skeleton reconstruction from an imported scene graph
//!
//! Bones are the nodes named by any mesh's skinning data. Non-bone nodes in
//! between are walked through: bind placements come from the offset matrices,
//! which already include every intermediate node transform, so folding them
//! into the bone-to-bone local transform is exact.

use glam::Mat4;
use hashbrown::HashSet;
use tracing::{info, warn};

use super::weights::{WeightCapPolicy, attribute_vertices};
use super::{BoneId, Skeleton, load_animations};
use crate::error::SkeletonError;
use crate::scene::{SceneGraph, SceneNode};

/// Build a skeleton with the default weight cap policy.
pub fn build_skeleton(scene: &SceneGraph) -> Result<Skeleton, SkeletonError> {
    build_skeleton_with(scene, WeightCapPolicy::default())
}

/// Build the bone hierarchy, animations and vertex attribution for `scene`.
///
/// The returned skeleton is posed at its bind pose with the palette computed.
pub fn build_skeleton_with(
    scene: &SceneGraph,
    policy: WeightCapPolicy,
) -> Result<Skeleton, SkeletonError> {
    let bone_names: HashSet<&str> = scene.bone_names().into_iter().collect();
    if bone_names.is_empty() {
        return Err(SkeletonError::NoBones);
    }

    let (root, root_parent_global) = find_root_bone(&scene.root, &bone_names)?;

    let mut skeleton = Skeleton::new();
    let mut bind_globals: Vec<Mat4> = Vec::with_capacity(bone_names.len());

    // (node, nearest bone ancestor, accumulated node transform of the parent)
    let mut stack: Vec<(&SceneNode, Option<BoneId>, Mat4)> = vec![(root, None, root_parent_global)];
    while let Some((node, parent, parent_global)) = stack.pop() {
        let node_global = parent_global * node.transform;
        let mut context = parent;

        if bone_names.contains(node.name.as_str()) && skeleton.bone_id(&node.name).is_none() {
            let (offset, bind_global) = bind_placement(scene, node, node_global);
            let local = match parent {
                Some(parent) => bind_globals[parent].inverse() * bind_global,
                None => bind_global,
            };

            let id = skeleton.add_bone(node.name.clone(), parent, offset, local)?;
            bind_globals.push(bind_global);
            context = Some(id);
        }

        stack.extend(
            node.children
                .iter()
                .rev()
                .map(|child| (child, context, node_global)),
        );
    }

    // Every bone the meshes rely on must have been reached from the root
    for name in &bone_names {
        if skeleton.bone_id(name).is_none() {
            return Err(SkeletonError::MissingBone(name.to_string()));
        }
    }

    let animations = load_animations(scene, |name| skeleton.bone_id(name));
    for animation in animations {
        skeleton.add_animation(animation);
    }

    attribute_vertices(&mut skeleton, &scene.meshes, policy)?;
    skeleton.reset_to_bind_pose();

    info!(
        "Built skeleton: {} bones (root '{}'), {} animations, {} vertices",
        skeleton.bone_count(),
        root.name,
        skeleton.animation_names().len(),
        skeleton.vertices().len()
    );

    Ok(skeleton)
}

/// Offset matrix and bind-pose global placement for a bone node.
///
/// Falls back to the node hierarchy placement when the imported offset matrix
/// cannot be inverted.
fn bind_placement(scene: &SceneGraph, node: &SceneNode, node_global: Mat4) -> (Mat4, Mat4) {
    let offset = scene
        .find_bone(&node.name)
        .map(|bone| bone.offset_matrix)
        .unwrap_or(Mat4::IDENTITY);

    if offset.determinant().abs() > f32::EPSILON && offset.is_finite() {
        (offset, offset.inverse())
    } else {
        warn!(
            "Bone '{}' has a singular offset matrix, using its node placement",
            node.name
        );
        (node_global.inverse(), node_global)
    }
}

/// Pre-order search for the bone node with no bone ancestor.
///
/// Returns the node and the accumulated transform of its parent.
fn find_root_bone<'a>(
    root: &'a SceneNode,
    bone_names: &HashSet<&str>,
) -> Result<(&'a SceneNode, Mat4), SkeletonError> {
    let mut candidates: Vec<(&SceneNode, Mat4)> = Vec::new();

    let mut stack = vec![(root, Mat4::IDENTITY)];
    while let Some((node, parent_global)) = stack.pop() {
        if bone_names.contains(node.name.as_str()) {
            candidates.push((node, parent_global));
            // Anything below belongs to this candidate's hierarchy
            continue;
        }
        let global = parent_global * node.transform;
        stack.extend(node.children.iter().rev().map(|child| (child, global)));
    }

    match candidates.as_slice() {
        [] => Err(SkeletonError::RootNotFound),
        [only] => Ok(*only),
        [first, second, ..] => Err(SkeletonError::AmbiguousRoot {
            first: first.0.name.clone(),
            second: second.0.name.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{SceneBone, SceneMesh};
    use crate::test_utils::{bone_node, scenario_scene};
    use glam::Vec3;

    fn skin(names: &[&str], offsets: &[Mat4]) -> SceneMesh {
        SceneMesh {
            positions: vec![Vec3::ZERO],
            bones: names
                .iter()
                .zip(offsets)
                .map(|(name, offset)| SceneBone {
                    name: name.to_string(),
                    offset_matrix: *offset,
                    weights: Vec::new(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_hierarchy_matches_bone_nodes() {
        let scene = scenario_scene();
        let skeleton = build_skeleton(&scene).unwrap();

        let names: Vec<_> = skeleton.bones().iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["Root", "Spine", "LeftArm", "RightArm"]);

        let spine = skeleton.bone_id("Spine").unwrap();
        assert_eq!(skeleton.bone(spine).unwrap().parent, Some(0));
        assert_eq!(skeleton.bone(spine).unwrap().children.len(), 2);

        let roots = skeleton.bones().iter().filter(|b| b.is_root()).count();
        assert_eq!(roots, 1);
        for bone in skeleton.bones() {
            if let Some(parent) = bone.parent {
                assert!(parent < bone.id);
            }
        }
    }

    #[test]
    fn test_intermediate_nodes_are_folded() {
        // Root at y=1, a non-bone "twist" node adds x=2, child bone adds z=3
        let root_global = Mat4::from_translation(Vec3::Y);
        let child_global = Mat4::from_translation(Vec3::new(2.0, 1.0, 3.0));

        let scene = SceneGraph {
            root: SceneNode::new("scene").with_child(
                bone_node("root", Mat4::from_translation(Vec3::Y)).with_child(
                    SceneNode::new("twist")
                        .with_transform(Mat4::from_translation(Vec3::X * 2.0))
                        .with_child(bone_node(
                            "child",
                            Mat4::from_translation(Vec3::Z * 3.0),
                        )),
                ),
            ),
            meshes: vec![skin(
                &["root", "child"],
                &[root_global.inverse(), child_global.inverse()],
            )],
            ..Default::default()
        };

        let skeleton = build_skeleton(&scene).unwrap();
        assert_eq!(skeleton.bone_count(), 2);

        let child = skeleton.bone(1).unwrap();
        assert_eq!(child.parent, Some(0));
        assert!(
            child
                .local_transform
                .abs_diff_eq(Mat4::from_translation(Vec3::new(2.0, 0.0, 3.0)), 1e-5)
        );
        assert!(
            skeleton
                .global_transform(1)
                .unwrap()
                .abs_diff_eq(child_global, 1e-5)
        );
    }

    #[test]
    fn test_no_bones() {
        let scene = SceneGraph {
            meshes: vec![SceneMesh::default()],
            ..Default::default()
        };
        assert_eq!(build_skeleton(&scene).unwrap_err(), SkeletonError::NoBones);
    }

    #[test]
    fn test_root_not_found() {
        let scene = SceneGraph {
            root: SceneNode::new("scene"),
            meshes: vec![skin(&["hip"], &[Mat4::IDENTITY])],
            ..Default::default()
        };
        assert_eq!(
            build_skeleton(&scene).unwrap_err(),
            SkeletonError::RootNotFound
        );
    }

    #[test]
    fn test_multiple_roots_rejected() {
        let scene = SceneGraph {
            root: SceneNode::new("scene")
                .with_child(bone_node("rig_a", Mat4::IDENTITY))
                .with_child(bone_node("rig_b", Mat4::IDENTITY)),
            meshes: vec![skin(&["rig_a", "rig_b"], &[Mat4::IDENTITY, Mat4::IDENTITY])],
            ..Default::default()
        };
        assert_eq!(
            build_skeleton(&scene).unwrap_err(),
            SkeletonError::AmbiguousRoot {
                first: "rig_a".into(),
                second: "rig_b".into()
            }
        );
    }

    #[test]
    fn test_bone_outside_hierarchy() {
        // "ghost" is skinned but no node carries its name
        let scene = SceneGraph {
            root: SceneNode::new("scene").with_child(bone_node("hip", Mat4::IDENTITY)),
            meshes: vec![skin(&["hip", "ghost"], &[Mat4::IDENTITY, Mat4::IDENTITY])],
            ..Default::default()
        };
        assert_eq!(
            build_skeleton(&scene).unwrap_err(),
            SkeletonError::MissingBone("ghost".into())
        );
    }

    #[test]
    fn test_singular_offset_uses_node_placement() {
        let scene = SceneGraph {
            root: SceneNode::new("scene")
                .with_child(bone_node("hip", Mat4::from_translation(Vec3::X))),
            meshes: vec![skin(&["hip"], &[Mat4::ZERO])],
            ..Default::default()
        };
        let skeleton = build_skeleton(&scene).unwrap();
        let hip = skeleton.bone(0).unwrap();
        assert!(
            hip.local_transform
                .abs_diff_eq(Mat4::from_translation(Vec3::X), 1e-6)
        );
        assert!(skeleton.bone_matrices()[0].abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }
}
