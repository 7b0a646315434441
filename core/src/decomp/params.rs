//! Decomposition parameters and presets

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const THRESHOLD_RANGE: (f32, f32) = (0.01, 1.0);
pub const RESOLUTION_RANGE: (u32, u32) = (100, 10_000);
pub const MAX_HULLS_RANGE: (u32, u32) = (1, 100);
pub const EXTRUDE_RANGE: (f32, f32) = (-0.5, 0.5);

/// Map a quality in `[0, 1]` (higher is better) to a concavity threshold.
///
/// Quality is clamped first; the threshold is `1 - quality` clamped to
/// `[0.01, 1]`, so quality 1 gives the finest decomposition.
pub fn threshold_from_quality(quality: f32) -> f32 {
    let quality = if quality.is_nan() {
        0.0
    } else {
        quality.clamp(0.0, 1.0)
    };
    (1.0 - quality).clamp(THRESHOLD_RANGE.0, THRESHOLD_RANGE.1)
}

/// Upper bound on the number of convex parts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum HullLimit {
    #[default]
    Unlimited,
    AtMost(u32),
}

impl HullLimit {
    /// Command-line value: `-1` for unlimited.
    pub fn as_flag(self) -> i32 {
        match self {
            HullLimit::Unlimited => -1,
            HullLimit::AtMost(n) => n.min(i32::MAX as u32) as i32,
        }
    }
}

impl From<i32> for HullLimit {
    /// Any non-positive count means unlimited.
    fn from(value: i32) -> Self {
        if value <= 0 {
            HullLimit::Unlimited
        } else {
            HullLimit::AtMost(value as u32)
        }
    }
}

impl From<HullLimit> for i32 {
    fn from(limit: HullLimit) -> Self {
        limit.as_flag()
    }
}

impl fmt::Display for HullLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HullLimit::Unlimited => write!(f, "unlimited"),
            HullLimit::AtMost(n) => write!(f, "{n}"),
        }
    }
}

/// Shape of each generated part
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApproximationMode {
    #[default]
    ConvexHull,
    /// Axis-aligned box around each part
    Box,
}

impl ApproximationMode {
    pub fn as_flag(self) -> &'static str {
        match self {
            ApproximationMode::ConvexHull => "ch",
            ApproximationMode::Box => "box",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompParameters {
    /// Concavity threshold; lower is more accurate and slower
    pub threshold: f32,
    /// Surface sampling resolution
    pub resolution: u32,
    pub max_convex_hulls: HullLimit,
    /// Fractional growth (or shrink) of each part around its centroid
    pub extrude: f32,
    pub mode: ApproximationMode,
}

impl Default for DecompParameters {
    fn default() -> Self {
        Preset::Balanced.parameters()
    }
}

impl DecompParameters {
    /// Default parameters with the threshold derived from `quality`.
    pub fn from_quality(quality: f32) -> Self {
        Self {
            threshold: threshold_from_quality(quality),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: ApproximationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Clamp every field into its accepted range.
    pub fn clamped(self) -> Self {
        let threshold = if self.threshold.is_nan() {
            THRESHOLD_RANGE.1
        } else {
            self.threshold.clamp(THRESHOLD_RANGE.0, THRESHOLD_RANGE.1)
        };
        let extrude = if self.extrude.is_nan() {
            0.0
        } else {
            self.extrude.clamp(EXTRUDE_RANGE.0, EXTRUDE_RANGE.1)
        };
        Self {
            threshold,
            resolution: self.resolution.clamp(RESOLUTION_RANGE.0, RESOLUTION_RANGE.1),
            max_convex_hulls: match self.max_convex_hulls {
                HullLimit::Unlimited => HullLimit::Unlimited,
                HullLimit::AtMost(n) => HullLimit::AtMost(n.clamp(MAX_HULLS_RANGE.0, MAX_HULLS_RANGE.1)),
            },
            extrude,
            mode: self.mode,
        }
    }

    /// Flags passed to the external decomposer.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            "--threshold".into(),
            self.threshold.to_string(),
            "--resolution".into(),
            self.resolution.to_string(),
            "--max-convex-hull".into(),
            self.max_convex_hulls.as_flag().to_string(),
            "--extrude-margin".into(),
            self.extrude.to_string(),
            "--approximate-mode".into(),
            self.mode.as_flag().into(),
        ]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Fast,
    #[default]
    Balanced,
    Accurate,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Fast, Preset::Balanced, Preset::Accurate];

    pub fn parameters(self) -> DecompParameters {
        let (threshold, resolution, max_convex_hulls) = match self {
            Preset::Fast => (0.5, 1000, HullLimit::AtMost(10)),
            Preset::Balanced => (0.3, 3000, HullLimit::AtMost(20)),
            Preset::Accurate => (0.1, 8000, HullLimit::Unlimited),
        };
        DecompParameters {
            threshold,
            resolution,
            max_convex_hulls,
            extrude: 0.0,
            mode: ApproximationMode::ConvexHull,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::Fast => "fast",
            Preset::Balanced => "balanced",
            Preset::Accurate => "accurate",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown preset '{s}' (expected fast, balanced or accurate)"))
    }
}
