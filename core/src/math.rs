//! Small math helpers shared by importers and decomposition
//!
//! - [`hue`] / [`rainbow`] give colliders evenly spaced, fully saturated colors
//! - [`Bounds`] is an axis-aligned min/max accumulator

use glam::Vec3;

/// Convert a hue in `[0, 1)` to RGB at full saturation and value.
///
/// Standard six-sector HSV conversion: red -> yellow -> green -> cyan -> blue
/// -> magenta -> red.
pub fn hue(h: f32) -> Vec3 {
    let h = h.rem_euclid(1.0) * 6.0;
    let sector = h.floor() as u32;
    let f = h - h.floor();

    match sector {
        0 => Vec3::new(1.0, f, 0.0),
        1 => Vec3::new(1.0 - f, 1.0, 0.0),
        2 => Vec3::new(0.0, 1.0, f),
        3 => Vec3::new(0.0, 1.0 - f, 1.0),
        4 => Vec3::new(f, 0.0, 1.0),
        _ => Vec3::new(1.0, 0.0, 1.0 - f),
    }
}

/// `count` colors with hues `i / count`.
pub fn rainbow(count: usize) -> Vec<Vec3> {
    (0..count).map(|i| hue(i as f32 / count as f32)).collect()
}

/// Axis-aligned bounding box accumulator
///
/// Starts inverted (`min = +MAX`, `max = -MAX`) so the first point or union
/// defines the box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut bounds = Self::EMPTY;
        for point in points {
            bounds.extend(*point);
        }
        bounds
    }

    #[inline]
    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    #[inline]
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// True until at least one point has been added.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}
