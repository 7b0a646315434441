//! Per-asset controller
//!
//! A [`Session`] owns everything that changes while working on one asset: the
//! loaded mesh (and skeleton), the current collider, decomposition settings,
//! playback state and any in-flight background decomposition. Operations are
//! meant to be driven from a single thread, once per frame: `update`, then
//! `poll_decomposition`, then draw.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::decomp::{
    ApproximationMode, BoneSelection, DecompParameters, Decomposer, DecompositionJob,
    decompose_skeleton_with,
};
use crate::draw::{DrawMesh, RenderBackend};
use crate::error::{ColliderError, DecompositionError, ImportError, SkeletonError};
use crate::import::load_scene;
use crate::mesh::{SkinnedMesh, static_mesh_from_scene};
use crate::scene::SceneGraph;
use crate::skeleton::Skeleton;

/// The currently loaded visual asset
#[derive(Debug)]
pub enum LoadedAsset {
    Static(DrawMesh),
    Skinned(SkinnedMesh),
}

impl LoadedAsset {
    pub fn mesh(&self) -> &DrawMesh {
        match self {
            LoadedAsset::Static(mesh) => mesh,
            LoadedAsset::Skinned(skinned) => &skinned.mesh,
        }
    }

    fn mesh_mut(&mut self) -> &mut DrawMesh {
        match self {
            LoadedAsset::Static(mesh) => mesh,
            LoadedAsset::Skinned(skinned) => &mut skinned.mesh,
        }
    }
}

/// Display toggles, reset whenever a new asset loads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    pub show_mesh: bool,
    pub show_collider: bool,
    pub wireframe: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_mesh: true,
            show_collider: true,
            wireframe: false,
        }
    }
}

pub struct Session {
    backend: Box<dyn RenderBackend>,
    decomposer: Decomposer,
    path: Option<PathBuf>,
    asset: Option<LoadedAsset>,
    collider: Option<DrawMesh>,
    job: Option<DecompositionJob>,
    playing: bool,
    animation_time: f64,
    /// Static decomposition settings
    pub params: DecompParameters,
    /// Skeletal decomposition settings
    pub bone_selection: BoneSelection,
    pub skeletal_mode: ApproximationMode,
    pub options: RenderOptions,
}

impl Session {
    pub fn new(backend: Box<dyn RenderBackend>, decomposer: Decomposer) -> Self {
        Self {
            backend,
            decomposer,
            path: None,
            asset: None,
            collider: None,
            job: None,
            playing: false,
            animation_time: 0.0,
            params: DecompParameters::default(),
            bone_selection: BoneSelection::default(),
            skeletal_mode: ApproximationMode::default(),
            options: RenderOptions::default(),
        }
    }

    /// Load an asset, as skinned when it has a usable skeleton.
    ///
    /// A scene whose skeleton cannot be rebuilt loads as static. On error the
    /// previous asset stays loaded.
    pub fn load(&mut self, path: &Path) -> Result<(), ImportError> {
        let scene = load_scene(path)?;
        let asset = if scene.is_skinned() {
            match SkinnedMesh::from_scene(&scene) {
                Ok(skinned) => LoadedAsset::Skinned(skinned),
                Err(e) => {
                    warn!("{}: {}, loading as static mesh", path.display(), e);
                    LoadedAsset::Static(static_mesh_from_scene(&scene))
                }
            }
        } else {
            LoadedAsset::Static(static_mesh_from_scene(&scene))
        };
        self.replace_asset(path, asset);
        Ok(())
    }

    /// Load an asset as a static mesh, ignoring any skeleton.
    pub fn load_static(&mut self, path: &Path) -> Result<(), ImportError> {
        let scene = load_scene(path)?;
        self.replace_asset(path, LoadedAsset::Static(static_mesh_from_scene(&scene)));
        Ok(())
    }

    /// Load an asset that must be skinned.
    pub fn load_skinned(&mut self, path: &Path) -> Result<(), ColliderError> {
        let scene: SceneGraph = load_scene(path)?;
        let skinned = SkinnedMesh::from_scene(&scene)?;
        self.replace_asset(path, LoadedAsset::Skinned(skinned));
        Ok(())
    }

    fn replace_asset(&mut self, path: &Path, mut asset: LoadedAsset) {
        self.cancel_decomposition();
        asset.mesh_mut().upload(self.backend.as_mut());

        info!(
            "Session loaded {} ({} objects, {})",
            path.display(),
            asset.mesh().len(),
            if matches!(asset, LoadedAsset::Skinned(_)) { "skinned" } else { "static" }
        );

        // Old GPU buffers are released as the previous asset and collider drop
        self.asset = Some(asset);
        self.collider = None;
        self.path = Some(path.to_path_buf());
        self.playing = false;
        self.animation_time = 0.0;
        self.options = RenderOptions::default();
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn asset(&self) -> Option<&LoadedAsset> {
        self.asset.as_ref()
    }

    pub fn mesh(&self) -> Option<&DrawMesh> {
        self.asset.as_ref().map(LoadedAsset::mesh)
    }

    pub fn skeleton(&self) -> Option<&Skeleton> {
        match &self.asset {
            Some(LoadedAsset::Skinned(skinned)) => Some(&skinned.skeleton),
            _ => None,
        }
    }

    fn skeleton_mut(&mut self) -> Option<&mut Skeleton> {
        match &mut self.asset {
            Some(LoadedAsset::Skinned(skinned)) => Some(&mut skinned.skeleton),
            _ => None,
        }
    }

    pub fn collider(&self) -> Option<&DrawMesh> {
        self.collider.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing && self.skeleton().is_some_and(|s| s.current_animation().is_some());
    }

    pub fn animation_time(&self) -> f64 {
        self.animation_time
    }

    /// Select an animation by name and start playing it from the beginning,
    /// or pass `None` to stop and return to the bind pose.
    pub fn select_animation(&mut self, name: Option<&str>) -> Result<(), SkeletonError> {
        let Some(skeleton) = self.skeleton_mut() else {
            return match name {
                Some(name) => Err(SkeletonError::UnknownAnimation(name.to_string())),
                None => Ok(()),
            };
        };

        match name {
            Some(name) => {
                skeleton.set_current_animation(name)?;
                skeleton.play_current_animation(0.0);
                self.playing = true;
            }
            None => {
                skeleton.clear_current_animation();
                self.playing = false;
            }
        }
        self.animation_time = 0.0;
        Ok(())
    }

    /// Advance playback by `dt` seconds.
    pub fn update(&mut self, dt: f64) {
        if !self.playing {
            return;
        }
        let time = self.animation_time + dt;
        self.animation_time = time;
        if let Some(skeleton) = self.skeleton_mut() {
            skeleton.play_current_animation(time);
        }
    }

    /// Start a decomposition of the loaded asset.
    ///
    /// Static meshes run the external decomposer on a worker thread; collect
    /// the result with [`Session::poll_decomposition`]. Skinned meshes are
    /// decomposed immediately from their bind pose.
    pub fn decompose(&mut self) -> Result<(), DecompositionError> {
        let path = self.path.clone().ok_or(DecompositionError::NothingLoaded)?;

        match &self.asset {
            None => Err(DecompositionError::NothingLoaded),
            Some(LoadedAsset::Static(_)) => {
                self.cancel_decomposition();
                self.job = Some(DecompositionJob::spawn(self.decomposer.clone(), path, self.params));
                Ok(())
            }
            Some(LoadedAsset::Skinned(skinned)) => {
                let result =
                    decompose_skeleton_with(&skinned.skeleton, &self.bone_selection, self.skeletal_mode);
                self.set_collider(result.mesh);
                Ok(())
            }
        }
    }

    /// Skeletal decomposition of the loaded asset, failing on static meshes.
    pub fn decompose_skeleton(&mut self) -> Result<(), DecompositionError> {
        match &self.asset {
            Some(LoadedAsset::Skinned(_)) => self.decompose(),
            Some(LoadedAsset::Static(_)) => Err(DecompositionError::NotSkinned),
            None => Err(DecompositionError::NothingLoaded),
        }
    }

    fn set_collider(&mut self, mut collider: DrawMesh) {
        collider.upload(self.backend.as_mut());
        self.collider = Some(collider);
    }

    pub fn is_decomposing(&self) -> bool {
        self.job.is_some()
    }

    /// Install a finished background result. `None` while nothing finished.
    pub fn poll_decomposition(&mut self) -> Option<Result<(), DecompositionError>> {
        let result = self.job.as_mut()?.try_take()?;
        self.job = None;
        Some(self.finish(result))
    }

    /// Block until the running decomposition (if any) finishes.
    pub fn wait_for_decomposition(&mut self) -> Option<Result<(), DecompositionError>> {
        let job = self.job.take()?;
        Some(self.finish(job.wait()))
    }

    fn finish(&mut self, result: Result<DrawMesh, DecompositionError>) -> Result<(), DecompositionError> {
        match result {
            Ok(collider) => {
                self.set_collider(collider);
                Ok(())
            }
            Err(e) => {
                warn!("Decomposition failed: {}", e);
                self.collider = None;
                Err(e)
            }
        }
    }

    /// Cancel a running decomposition. Returns whether one was running.
    pub fn cancel_decomposition(&mut self) -> bool {
        match self.job.take() {
            Some(job) => {
                info!("Cancelling decomposition of {}", job.input().display());
                job.cancel();
                true
            }
            None => false,
        }
    }
}
