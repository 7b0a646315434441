//! meshcollider.toml parsing
//!
//! Every section and field is optional; a missing file means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use meshcollider_core::decomp::{
    ApproximationMode, BoneSelection, DecompParameters, Decomposer, HullLimit, Preset,
};
use meshcollider_core::skeleton::Skeleton;
use serde::Deserialize;
use tracing::debug;

pub const CONFIG_FILE: &str = "meshcollider.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// External decomposer invocation
    pub decomposer: Decomposer,
    #[serde(rename = "static")]
    pub static_mesh: StaticSection,
    pub skeletal: SkeletalSection,
}

/// Defaults for `meshcollider static`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticSection {
    pub preset: Preset,
    pub box_mode: bool,
    /// Overrides on top of the preset
    pub threshold: Option<f32>,
    pub resolution: Option<u32>,
    /// -1 for unlimited
    pub max_convex_hulls: Option<HullLimit>,
    pub extrude: Option<f32>,
}

impl StaticSection {
    pub fn parameters(&self) -> DecompParameters {
        let mut params = self.preset.parameters();
        if let Some(threshold) = self.threshold {
            params.threshold = threshold;
        }
        if let Some(resolution) = self.resolution {
            params.resolution = resolution;
        }
        if let Some(limit) = self.max_convex_hulls {
            params.max_convex_hulls = limit;
        }
        if let Some(extrude) = self.extrude {
            params.extrude = extrude;
        }
        if self.box_mode {
            params.mode = ApproximationMode::Box;
        }
        params
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BoneMode {
    /// Bones with more than one child
    #[default]
    Important,
    /// Every bone
    All,
}

/// Defaults for `meshcollider skeletal`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkeletalSection {
    pub mode: BoneMode,
    pub box_mode: bool,
    /// Explicit bone names; overrides `mode` when non-empty
    pub bones: Vec<String>,
}

impl SkeletalSection {
    pub fn approximation(&self) -> ApproximationMode {
        if self.box_mode {
            ApproximationMode::Box
        } else {
            ApproximationMode::ConvexHull
        }
    }
}

/// Resolve a bone selection against a skeleton.
pub fn bone_selection(mode: BoneMode, bones: &[String], skeleton: &Skeleton) -> Result<BoneSelection> {
    if !bones.is_empty() {
        return BoneSelection::from_names(skeleton, bones.iter().map(String::as_str))
            .map_err(|name| anyhow::anyhow!("Unknown bone '{}'", name));
    }
    Ok(match mode {
        BoneMode::Important => BoneSelection::Important,
        BoneMode::All => BoneSelection::All,
    })
}

impl Config {
    /// Load from `explicit`, `./meshcollider.toml` or the user config directory.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.is_file() {
                bail!("Config file not found: {}", path.display());
            }
            return Self::from_path(path);
        }

        match Self::locate() {
            Some(path) => Self::from_path(&path),
            None => {
                debug!("No {} found, using defaults", CONFIG_FILE);
                Ok(Self::default())
            }
        }
    }

    fn locate() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        ProjectDirs::from("", "", "meshcollider")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
            .filter(|path| path.is_file())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::parse(&text).with_context(|| format!("Invalid config {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.decomposer, Decomposer::default());
        assert_eq!(config.static_mesh.parameters(), DecompParameters::default());
        assert_eq!(config.skeletal.mode, BoneMode::Important);
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
            [decomposer]
            program = "python3"
            args = ["scripts/coacd_preprocess.py"]

            [static]
            preset = "accurate"
            box_mode = true
            max_convex_hulls = 32

            [skeletal]
            mode = "all"
            box_mode = true
            "#,
        )
        .unwrap();

        assert_eq!(config.decomposer.args, ["scripts/coacd_preprocess.py"]);
        let params = config.static_mesh.parameters();
        assert_eq!(params.threshold, 0.1);
        assert_eq!(params.resolution, 8000);
        assert_eq!(params.max_convex_hulls, HullLimit::AtMost(32));
        assert_eq!(params.mode, ApproximationMode::Box);
        assert_eq!(config.skeletal.mode, BoneMode::All);
        assert_eq!(config.skeletal.approximation(), ApproximationMode::Box);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(Config::parse("[static]\npreset = \"quick\"\n").is_err());
        assert!(Config::parse("[render]\nwireframe = true\n").is_err());
    }

    #[test]
    fn test_missing_explicit_config() {
        let err = Config::load(Some(Path::new("/nonexistent/meshcollider.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
