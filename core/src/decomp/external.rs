//! Static decomposition through an external process
//!
//! The decomposer is file-in/file-out: it is launched as
//! `<program> <args..> <input> <output> <flags..>` and must exit with status 0
//! after writing a collider OBJ to `<output>`. Any failure removes whatever
//! was written to the output path.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use std::{fs, io};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::params::DecompParameters;
use crate::draw::{DrawMesh, Material};
use crate::error::{DecompositionError, ImportError};
use crate::import::extension_of;
use crate::math::rainbow;
use crate::mesh::load_static_mesh;

/// Mesh formats the decomposer accepts
pub const SUPPORTED_INPUTS: &[&str] = &["obj", "stl", "ply"];

/// Directory (next to the input) that receives collider output
pub const COLLIDER_DIR: &str = "Colliders";

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const STDERR_TAIL: usize = 2048;

/// Shared flag that asks a running decomposition to stop
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How to launch the external decomposer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Decomposer {
    pub program: String,
    /// Leading arguments, e.g. the script path for an interpreter
    pub args: Vec<String>,
}

impl Default for Decomposer {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["coacd_preprocess.py".to_string()],
        }
    }
}

impl Decomposer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Locate the program on disk or on `PATH`.
    pub fn resolve(&self) -> Result<PathBuf, DecompositionError> {
        which::which(&self.program).map_err(|e| DecompositionError::ToolNotFound {
            program: self.program.clone(),
            reason: e.to_string(),
        })
    }

    /// Build the full command line for one run.
    pub fn command(&self, program: &Path, input: &Path, output: &Path, params: &DecompParameters) -> Command {
        let mut command = Command::new(program);
        command
            .args(&self.args)
            .arg(input)
            .arg(output)
            .args(params.to_args());
        command
    }

    /// Run to completion, blocking the calling thread.
    ///
    /// Polls `cancel` while the process runs; cancelling kills it.
    pub fn run(
        &self,
        input: &Path,
        output: &Path,
        params: &DecompParameters,
        cancel: &CancelToken,
    ) -> Result<(), DecompositionError> {
        let program = self.resolve()?;

        if let Some(dir) = output.parent() {
            fs::create_dir_all(dir)?;
        }
        if output.exists() {
            fs::remove_file(output)?;
        }

        let mut command = self.command(&program, input, output, params);
        command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::piped());
        debug!("Running decomposer: {:?}", command);

        let mut child = command.spawn().map_err(|source| DecompositionError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let stderr = collect_stderr(&mut child);

        let status = match wait_for(&mut child, cancel) {
            Ok(Some(status)) => status,
            Ok(None) => {
                remove_partial(output);
                return Err(DecompositionError::Cancelled);
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                remove_partial(output);
                return Err(e.into());
            }
        };
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            remove_partial(output);
            return Err(DecompositionError::ToolFailed {
                code: status
                    .code()
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "none (terminated by signal)".to_string()),
                stderr,
            });
        }
        if !output.is_file() {
            return Err(DecompositionError::MissingOutput(output.to_path_buf()));
        }

        Ok(())
    }
}

/// Wait for exit. `Ok(None)` means the run was cancelled and the child reaped.
fn wait_for(child: &mut Child, cancel: &CancelToken) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if cancel.is_cancelled() {
            info!("Cancelling decomposer (pid {})", child.id());
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Drain stderr on a thread so a chatty tool never blocks on a full pipe.
fn collect_stderr(child: &mut Child) -> JoinHandle<String> {
    let pipe = child.stderr.take();
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut text);
        }
        let text = text.trim();
        let start = text.len().saturating_sub(STDERR_TAIL);
        let start = (start..text.len())
            .find(|&i| text.is_char_boundary(i))
            .unwrap_or(text.len());
        text[start..].to_string()
    })
}

fn remove_partial(output: &Path) {
    if output.exists() {
        match fs::remove_file(output) {
            Ok(()) => debug!("Removed partial output {}", output.display()),
            Err(e) => warn!("Failed to remove partial output {}: {}", output.display(), e),
        }
    }
}

/// `<input dir>/Colliders/<stem>_collider.obj`
pub fn collider_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mesh".to_string());
    input
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(COLLIDER_DIR)
        .join(format!("{stem}_collider.obj"))
}

fn check_input(input: &Path) -> Result<(), DecompositionError> {
    match extension_of(input) {
        Some(ext) if SUPPORTED_INPUTS.contains(&ext.as_str()) => Ok(()),
        _ => Err(DecompositionError::UnsupportedInput {
            path: input.to_path_buf(),
            expected: SUPPORTED_INPUTS.join(", "),
        }),
    }
}

/// Give every object a distinct rainbow color and translucent material.
pub fn apply_collider_materials(mesh: &mut DrawMesh) {
    let colors = rainbow(mesh.len());
    for (object, color) in mesh.objects_mut().iter_mut().zip(colors) {
        object.material = Material::collider(color);
    }
}

/// Load decomposer output as a collider mesh.
pub fn load_collider_mesh(path: &Path) -> Result<DrawMesh, ImportError> {
    let mut mesh = load_static_mesh(path)?;
    apply_collider_materials(&mut mesh);
    Ok(mesh)
}

/// Decompose with default parameters and a threshold derived from `quality`.
pub fn decompose(
    decomposer: &Decomposer,
    input: &Path,
    quality: f32,
) -> Result<DrawMesh, DecompositionError> {
    decompose_with(decomposer, input, &DecompParameters::from_quality(quality), &CancelToken::new())
}

/// Decompose `input` and load the result. Blocks until the process exits.
pub fn decompose_with(
    decomposer: &Decomposer,
    input: &Path,
    params: &DecompParameters,
    cancel: &CancelToken,
) -> Result<DrawMesh, DecompositionError> {
    check_input(input)?;
    let output = collider_output_path(input);
    let params = params.clamped();

    info!(
        "Decomposing {} (threshold {}, resolution {}, max hulls {}, {:?})",
        input.display(),
        params.threshold,
        params.resolution,
        params.max_convex_hulls,
        params.mode
    );
    decomposer.run(input, &output, &params, cancel)?;

    let mesh = load_collider_mesh(&output).inspect_err(|_| remove_partial(&output))?;
    info!(
        "Collider written to {}: {} parts, {} triangles",
        output.display(),
        mesh.len(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// A decomposition running on a worker thread
///
/// Dropping the job cancels it.
#[derive(Debug)]
pub struct DecompositionJob {
    input: PathBuf,
    cancel: CancelToken,
    handle: Option<JoinHandle<Result<DrawMesh, DecompositionError>>>,
}

impl DecompositionJob {
    pub fn spawn(decomposer: Decomposer, input: PathBuf, params: DecompParameters) -> Self {
        let cancel = CancelToken::new();
        let handle = {
            let cancel = cancel.clone();
            let input = input.clone();
            thread::spawn(move || decompose_with(&decomposer, &input, &params, &cancel))
        };
        Self {
            input,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|handle| handle.is_finished())
    }

    /// The result, once the worker is done. Returns `None` while running and
    /// after the result has been taken.
    pub fn try_take(&mut self) -> Option<Result<DrawMesh, DecompositionError>> {
        if !self.handle.as_ref()?.is_finished() {
            return None;
        }
        self.handle.take().map(join)
    }

    /// Block until the worker finishes.
    pub fn wait(mut self) -> Result<DrawMesh, DecompositionError> {
        match self.handle.take() {
            Some(handle) => join(handle),
            None => Err(DecompositionError::Cancelled),
        }
    }
}

fn join(handle: JoinHandle<Result<DrawMesh, DecompositionError>>) -> Result<DrawMesh, DecompositionError> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("decomposition worker panicked").into()))
}

impl Drop for DecompositionJob {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collider_output_path() {
        assert_eq!(
            collider_output_path(Path::new("assets/robot.obj")),
            PathBuf::from("assets/Colliders/robot_collider.obj")
        );
        assert_eq!(
            collider_output_path(Path::new("crate.stl")),
            PathBuf::from("Colliders/crate_collider.obj")
        );
    }

    #[test]
    fn test_rejects_non_mesh_input() {
        let err = decompose(&Decomposer::default(), Path::new("robot.glb"), 0.5).unwrap_err();
        assert!(matches!(err, DecompositionError::UnsupportedInput { .. }));
        assert!(check_input(Path::new("ROBOT.OBJ")).is_ok());
    }

    #[test]
    fn test_missing_tool() {
        let decomposer = Decomposer::new("definitely-not-a-real-decomposer-binary", vec![]);
        let err = decomposer.resolve().unwrap_err();
        assert!(matches!(err, DecompositionError::ToolNotFound { .. }));
    }

    #[test]
    fn test_command_line() {
        let decomposer = Decomposer::new("python3", vec!["script.py".into()]);
        let command = decomposer.command(
            Path::new("python3"),
            Path::new("in.obj"),
            Path::new("out.obj"),
            &DecompParameters::default(),
        );
        let args: Vec<_> = command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(&args[..3], ["script.py", "in.obj", "out.obj"]);
        assert_eq!(args[3], "--threshold");
        assert_eq!(args.last().map(String::as_str), Some("ch"));
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
