//! Bone hierarchy, animation playback and the skinning matrix palette
//!
//! A [`Skeleton`] owns its bones (id = index into the bone list) and its
//! animations. The palette is derived state: anything that touches a bone's
//! local transform must be followed by [`Skeleton::update_bone_matrices`]
//! before the palette is read.

pub mod animation;
pub mod builder;
pub mod weights;

pub use animation::{Animation, AnimationChannel, Keyframe, load_animations};
pub use builder::{build_skeleton, build_skeleton_with};
pub use weights::{MAX_BONES_PER_VERTEX, VertexInfluences, WeightCapPolicy, attribute_vertices};

use glam::{Mat4, Vec3};
use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::error::SkeletonError;

/// Index of a bone in [`Skeleton::bones`]
pub type BoneId = usize;

#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub id: BoneId,
    pub parent: Option<BoneId>,
    /// Maps bind-pose mesh space into this bone's local space
    pub offset_matrix: Mat4,
    /// Current transform relative to the parent bone
    pub local_transform: Mat4,
    /// Snapshot of `local_transform` at load time
    pub bind_pose_transform: Mat4,
    pub children: Vec<BoneId>,
    /// Raw vertex weights as imported (global vertex id -> weight)
    pub vertex_weights: HashMap<u32, f32>,
}

impl Bone {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    bone_map: HashMap<String, BoneId>,
    animations: HashMap<String, Animation>,
    animation_names: Vec<String>,
    current_animation: Option<String>,
    bone_matrices: Vec<Mat4>,
    global_transforms: Vec<Mat4>,
    vertices: Vec<Vec3>,
    faces: Vec<[u32; 3]>,
    vertex_bones: HashMap<u32, SmallVec<[BoneId; MAX_BONES_PER_VERTEX]>>,
    influences: Vec<VertexInfluences>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bone and link it under `parent`.
    ///
    /// The first parentless bone becomes the root; a second one is rejected.
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<BoneId>,
        offset_matrix: Mat4,
        local_transform: Mat4,
    ) -> Result<BoneId, SkeletonError> {
        let name = name.into();
        let id = self.bones.len();

        match parent {
            Some(parent) if parent >= id => {
                return Err(SkeletonError::MissingBone(format!("#{parent}")));
            }
            Some(parent) => self.bones[parent].children.push(id),
            None => {
                if let Some(root) = self.root() {
                    return Err(SkeletonError::AmbiguousRoot {
                        first: root.name.clone(),
                        second: name,
                    });
                }
            }
        }

        if self.bone_map.contains_key(&name) {
            warn!("Duplicate bone name '{}', lookups resolve to the first", name);
        } else {
            self.bone_map.insert(name.clone(), id);
        }

        self.bones.push(Bone {
            name,
            id,
            parent,
            offset_matrix,
            local_transform,
            bind_pose_transform: local_transform,
            children: Vec::new(),
            vertex_weights: HashMap::new(),
        });
        self.bone_matrices.push(Mat4::IDENTITY);
        self.global_transforms.push(Mat4::IDENTITY);

        Ok(id)
    }

    pub fn bone_id(&self, name: &str) -> Option<BoneId> {
        self.bone_map.get(name).copied()
    }

    pub fn bone(&self, id: BoneId) -> Option<&Bone> {
        self.bones.get(id)
    }

    pub(crate) fn bone_mut(&mut self, id: BoneId) -> Option<&mut Bone> {
        self.bones.get_mut(id)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// The unique bone without a parent.
    pub fn root(&self) -> Option<&Bone> {
        self.bones.iter().find(|bone| bone.is_root())
    }

    /// Recompute the palette: `global(parent) * local * offset` per bone.
    pub fn update_bone_matrices(&mut self) {
        let Some(root) = self.root().map(|bone| bone.id) else {
            return;
        };

        let mut stack = vec![(root, Mat4::IDENTITY)];
        while let Some((id, parent_global)) = stack.pop() {
            let bone = &self.bones[id];
            let global = parent_global * bone.local_transform;
            self.global_transforms[id] = global;
            self.bone_matrices[id] = global * bone.offset_matrix;
            stack.extend(bone.children.iter().rev().map(|&child| (child, global)));
        }
    }

    /// Restore every bone's bind pose and recompute the palette.
    pub fn reset_to_bind_pose(&mut self) {
        for bone in &mut self.bones {
            bone.local_transform = bone.bind_pose_transform;
        }
        self.update_bone_matrices();
    }

    pub fn bone_matrices(&self) -> &[Mat4] {
        &self.bone_matrices
    }

    /// Bone placement in mesh space as of the last palette update.
    pub fn global_transform(&self, id: BoneId) -> Option<Mat4> {
        self.global_transforms.get(id).copied()
    }

    pub fn add_animation(&mut self, animation: Animation) {
        if !self.animations.contains_key(&animation.name) {
            self.animation_names.push(animation.name.clone());
        }
        self.animations.insert(animation.name.clone(), animation);
    }

    /// Animation names in import order.
    pub fn animation_names(&self) -> &[String] {
        &self.animation_names
    }

    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animations.get(name)
    }

    pub fn set_current_animation(&mut self, name: &str) -> Result<(), SkeletonError> {
        if !self.animations.contains_key(name) {
            return Err(SkeletonError::UnknownAnimation(name.to_string()));
        }
        debug!("Current animation: {}", name);
        self.current_animation = Some(name.to_string());
        Ok(())
    }

    /// Stop animating and return to the bind pose.
    pub fn clear_current_animation(&mut self) {
        self.current_animation = None;
        self.reset_to_bind_pose();
    }

    pub fn current_animation(&self) -> Option<&Animation> {
        self.current_animation
            .as_deref()
            .and_then(|name| self.animations.get(name))
    }

    /// Pose the skeleton at `seconds` into the current animation, looping.
    ///
    /// Bones without a channel hold their bind pose. Returns the sampled time
    /// in ticks, or `None` when no animation is selected.
    pub fn play_current_animation(&mut self, seconds: f64) -> Option<f64> {
        let name = self.current_animation.as_deref()?;
        let animation = self.animations.get(name)?;
        let ticks = animation.wrap_time(seconds);

        for bone in &mut self.bones {
            bone.local_transform = match animation.channel(bone.id) {
                Some(channel) => channel.calculate_transform(ticks),
                None => bone.bind_pose_transform,
            };
        }
        self.update_bone_matrices();

        Some(ticks)
    }

    pub(crate) fn set_geometry(&mut self, vertices: Vec<Vec3>, faces: Vec<[u32; 3]>) {
        self.vertices = vertices;
        self.faces = faces;
    }

    /// Bind-pose vertex positions of all skinned meshes, concatenated.
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    /// Bones with a recorded weight on `vertex`.
    pub fn bones_influencing(&self, vertex: u32) -> &[BoneId] {
        self.vertex_bones
            .get(&vertex)
            .map(|bones| bones.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn record_influence(&mut self, vertex: u32, bone: BoneId, weight: f32) {
        self.bones[bone].vertex_weights.insert(vertex, weight);
        let bones = self.vertex_bones.entry(vertex).or_default();
        if !bones.contains(&bone) {
            bones.push(bone);
        }
    }

    pub(crate) fn set_influences(&mut self, influences: Vec<VertexInfluences>) {
        self.influences = influences;
    }

    /// Capped, normalized influences per vertex.
    pub fn influences(&self) -> &[VertexInfluences] {
        &self.influences
    }

    /// Deform a bind-pose vertex with the current palette.
    pub fn skin_point(&self, vertex: u32) -> Option<Vec3> {
        let position = *self.vertices.get(vertex as usize)?;
        let influences = self
            .influences
            .get(vertex as usize)
            .copied()
            .unwrap_or_default();

        let mut skinned = Vec3::ZERO;
        for (bone, weight) in influences.iter() {
            let matrix = self.bone_matrices.get(bone)?;
            skinned += matrix.transform_point3(position) * weight;
        }
        Some(skinned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::chain_skeleton;

    #[test]
    fn test_add_bone_links_children() {
        let mut skeleton = Skeleton::new();
        let root = skeleton
            .add_bone("root", None, Mat4::IDENTITY, Mat4::IDENTITY)
            .unwrap();
        let child = skeleton
            .add_bone("child", Some(root), Mat4::IDENTITY, Mat4::IDENTITY)
            .unwrap();

        assert_eq!(skeleton.bone(root).unwrap().children, vec![child]);
        assert_eq!(skeleton.bone_id("child"), Some(child));
        assert_eq!(skeleton.root().unwrap().name, "root");
        assert_eq!(skeleton.bone_matrices().len(), 2);
    }

    #[test]
    fn test_second_root_rejected() {
        let mut skeleton = Skeleton::new();
        skeleton
            .add_bone("a", None, Mat4::IDENTITY, Mat4::IDENTITY)
            .unwrap();
        let err = skeleton
            .add_bone("b", None, Mat4::IDENTITY, Mat4::IDENTITY)
            .unwrap_err();
        assert_eq!(
            err,
            SkeletonError::AmbiguousRoot {
                first: "a".into(),
                second: "b".into()
            }
        );

        let err = skeleton
            .add_bone("c", Some(7), Mat4::IDENTITY, Mat4::IDENTITY)
            .unwrap_err();
        assert!(matches!(err, SkeletonError::MissingBone(_)));
    }

    #[test]
    fn test_palette_propagates_down_hierarchy() {
        let mut skeleton = Skeleton::new();
        let root = skeleton
            .add_bone(
                "root",
                None,
                Mat4::IDENTITY,
                Mat4::from_translation(Vec3::X),
            )
            .unwrap();
        let child = skeleton
            .add_bone(
                "child",
                Some(root),
                Mat4::IDENTITY,
                Mat4::from_translation(Vec3::Y),
            )
            .unwrap();
        skeleton.update_bone_matrices();

        let global = skeleton.global_transform(child).unwrap();
        assert!(
            global
                .w_axis
                .truncate()
                .abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-6)
        );
    }

    #[test]
    fn test_bind_pose_round_trip() {
        let mut skeleton = chain_skeleton();

        // Disturb the pose, then come back
        for id in 0..skeleton.bone_count() {
            skeleton.bone_mut(id).unwrap().local_transform = Mat4::from_rotation_x(0.7);
        }
        skeleton.update_bone_matrices();
        skeleton.reset_to_bind_pose();

        for matrix in skeleton.bone_matrices() {
            assert!(matrix.abs_diff_eq(Mat4::IDENTITY, 1e-5), "{matrix:?}");
        }
        for v in 0..skeleton.vertices().len() as u32 {
            let bind = skeleton.vertices()[v as usize];
            assert!(skeleton.skin_point(v).unwrap().abs_diff_eq(bind, 1e-5));
        }
    }

    #[test]
    fn test_animation_selection() {
        let mut skeleton = chain_skeleton();
        let tip = skeleton.bone_id("tip").unwrap();
        skeleton.add_animation(Animation::new("lift", 10.0, 10.0).with_channel(
            tip,
            AnimationChannel::new(
                vec![
                    Keyframe::new(0.0, Vec3::new(0.0, 1.0, 0.0)),
                    Keyframe::new(10.0, Vec3::new(0.0, 1.0, 2.0)),
                ],
                vec![],
                vec![],
            ),
        ));

        assert_eq!(skeleton.animation_names(), ["lift"]);
        assert_eq!(
            skeleton.set_current_animation("jump"),
            Err(SkeletonError::UnknownAnimation("jump".into()))
        );
        assert_eq!(skeleton.play_current_animation(0.5), None);

        skeleton.set_current_animation("lift").unwrap();
        // 1.5 s at 10 ticks/s wraps to tick 5
        assert_eq!(skeleton.play_current_animation(1.5), Some(5.0));
        let global = skeleton.global_transform(tip).unwrap();
        assert!(
            global
                .w_axis
                .truncate()
                .abs_diff_eq(Vec3::new(0.0, 1.0, 1.0), 1e-5)
        );

        skeleton.clear_current_animation();
        assert!(skeleton.current_animation().is_none());
        for matrix in skeleton.bone_matrices() {
            assert!(matrix.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }
    }
}
