//! Keyframe sampling
//!
//! Channels hold time-sorted position/rotation/scale tracks for one bone.
//! Sampling clamps at both ends; looping only happens in
//! [`Animation::wrap_time`], one level up.

use std::collections::BTreeMap;

use glam::{Mat4, Quat, Vec3};
use tracing::debug;

use super::BoneId;
use crate::scene::SceneGraph;

/// Rate used when the source file leaves ticks-per-second at zero
pub const DEFAULT_TICKS_PER_SECOND: f64 = 25.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keyframe<V> {
    /// Time in ticks
    pub time: f64,
    pub value: V,
}

impl<V> Keyframe<V> {
    pub fn new(time: f64, value: V) -> Self {
        Self { time, value }
    }
}

/// Values that can be blended between two keys
pub trait Interpolate: Copy {
    /// Value used when a track has no keys
    const REST: Self;

    fn interpolate(a: Self, b: Self, t: f32) -> Self;
}

impl Interpolate for Vec3 {
    const REST: Self = Vec3::ZERO;

    #[inline]
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

impl Interpolate for Quat {
    const REST: Self = Quat::IDENTITY;

    #[inline]
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        // glam's slerp takes the short path and falls back to lerp for near-equal inputs
        a.slerp(b, t).normalize()
    }
}

/// Sample a time-sorted track, clamping outside the key range.
///
/// A query landing exactly on a key returns that key's value untouched. A
/// non-finite time samples the first key.
pub fn sample<V: Interpolate>(keys: &[Keyframe<V>], time: f64, rest: V) -> V {
    let (first, last) = match keys {
        [] => return rest,
        [only] => return only.value,
        [first, .., last] => (first, last),
    };

    if !time.is_finite() || time <= first.time {
        return first.value;
    }
    if time >= last.time {
        return last.value;
    }

    // Greatest i with keys[i].time <= time; the guards above keep 1 <= i < len
    let i = keys.partition_point(|k| k.time <= time) - 1;
    let a = &keys[i];
    if a.time == time {
        return a.value;
    }
    let b = &keys[i + 1];

    let span = b.time - a.time;
    let t = if span > 0.0 { ((time - a.time) / span) as f32 } else { 0.0 };
    V::interpolate(a.value, b.value, t.clamp(0.0, 1.0))
}

/// Keyframe tracks for a single bone
#[derive(Clone, Debug, Default)]
pub struct AnimationChannel {
    pub positions: Vec<Keyframe<Vec3>>,
    pub rotations: Vec<Keyframe<Quat>>,
    pub scales: Vec<Keyframe<Vec3>>,
}

impl AnimationChannel {
    /// Build a channel, sorting each track by time.
    pub fn new(
        mut positions: Vec<Keyframe<Vec3>>,
        mut rotations: Vec<Keyframe<Quat>>,
        mut scales: Vec<Keyframe<Vec3>>,
    ) -> Self {
        positions.sort_by(|a, b| a.time.total_cmp(&b.time));
        rotations.sort_by(|a, b| a.time.total_cmp(&b.time));
        scales.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            positions,
            rotations,
            scales,
        }
    }

    pub fn position_at(&self, time: f64) -> Vec3 {
        sample(&self.positions, time, Vec3::REST)
    }

    pub fn rotation_at(&self, time: f64) -> Quat {
        sample(&self.rotations, time, Quat::REST)
    }

    pub fn scale_at(&self, time: f64) -> Vec3 {
        sample(&self.scales, time, Vec3::ONE)
    }

    /// Local transform at `time`: translation * rotation * scale.
    pub fn calculate_transform(&self, time: f64) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale_at(time),
            self.rotation_at(time),
            self.position_at(time),
        )
    }

    /// Time of the last key across all three tracks.
    pub fn end_time(&self) -> f64 {
        let positions = self.positions.iter().map(|k| k.time);
        let rotations = self.rotations.iter().map(|k| k.time);
        let scales = self.scales.iter().map(|k| k.time);
        positions.chain(rotations).chain(scales).fold(0.0, f64::max)
    }
}

#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    pub ticks_per_second: f64,
    /// Duration in ticks
    pub duration: f64,
    channels: BTreeMap<BoneId, AnimationChannel>,
}

impl Animation {
    pub fn new(name: impl Into<String>, ticks_per_second: f64, duration: f64) -> Self {
        Self {
            name: name.into(),
            ticks_per_second: if ticks_per_second > 0.0 {
                ticks_per_second
            } else {
                DEFAULT_TICKS_PER_SECOND
            },
            duration,
            channels: BTreeMap::new(),
        }
    }

    pub fn with_channel(mut self, bone: BoneId, channel: AnimationChannel) -> Self {
        self.channels.insert(bone, channel);
        self
    }

    pub fn channel(&self, bone: BoneId) -> Option<&AnimationChannel> {
        self.channels.get(&bone)
    }

    pub fn channels(&self) -> impl Iterator<Item = (BoneId, &AnimationChannel)> {
        self.channels.iter().map(|(id, channel)| (*id, channel))
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration / self.ticks_per_second
    }

    /// Convert seconds into ticks and wrap into `[0, duration)`.
    ///
    /// Non-finite times map to tick 0.
    pub fn wrap_time(&self, seconds: f64) -> f64 {
        let ticks = seconds * self.ticks_per_second;
        if self.duration > 0.0 && ticks.is_finite() {
            ticks.rem_euclid(self.duration)
        } else {
            0.0
        }
    }
}

/// Convert the scene's animations into bone-indexed [`Animation`]s.
///
/// Channels targeting nodes that are not bones are skipped. Unnamed
/// animations are called `animation_{index}`, and repeated names get the
/// index appended so every animation stays selectable.
pub fn load_animations(
    scene: &SceneGraph,
    bone_id: impl Fn(&str) -> Option<BoneId>,
) -> Vec<Animation> {
    let mut animations: Vec<Animation> = Vec::with_capacity(scene.animations.len());

    for (index, source) in scene.animations.iter().enumerate() {
        let mut name = if source.name.is_empty() {
            format!("animation_{index}")
        } else {
            source.name.clone()
        };
        if animations.iter().any(|a| a.name == name) {
            name = format!("{name}_{index}");
        }

        let mut animation = Animation::new(name, source.ticks_per_second, source.duration);
        for channel in &source.channels {
            let Some(bone) = bone_id(&channel.node_name) else {
                debug!(
                    "Skipping channel for non-bone node '{}' in '{}'",
                    channel.node_name, animation.name
                );
                continue;
            };
            animation.channels.insert(
                bone,
                AnimationChannel::new(
                    channel.position_keys.clone(),
                    channel.rotation_keys.clone(),
                    channel.scale_keys.clone(),
                ),
            );
        }

        if animation.duration <= 0.0 {
            animation.duration = animation
                .channels
                .values()
                .map(AnimationChannel::end_time)
                .fold(0.0, f64::max);
        }

        animations.push(animation);
    }

    animations
}
