use super::process::{ChildProcess, Compiler, RunHandle, SimulatorLauncher};
use super::types::{BuildRequest, BuildResult, ToolchainError};
use super::{LocateSdk, MONKEYC, MONKEYDO, executable_name};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use tracing::debug;

/// The external Connect IQ toolchain.
///
/// The SDK root is looked up on first use and cached for the lifetime of the
/// instance; share one `Toolchain` behind an `Arc` rather than creating many.
pub struct Toolchain {
    locator: Box<dyn LocateSdk>,
    root: OnceLock<Option<PathBuf>>,
    project_dir: PathBuf,
    jungle: PathBuf,
}

impl Toolchain {
    /// `jungle` is the project-description file; when it exists it takes
    /// precedence over the manifest for every compile.
    pub fn new(locator: Box<dyn LocateSdk>, project_dir: PathBuf, jungle: PathBuf) -> Self {
        Self {
            locator,
            root: OnceLock::new(),
            project_dir,
            jungle,
        }
    }

    /// Cached SDK root
    pub fn root(&self) -> Option<&Path> {
        self.root
            .get_or_init(|| {
                let root = self.locator.find_toolchain_root();
                debug!(?root, "toolchain root lookup");
                root
            })
            .as_deref()
    }

    /// Path of an SDK executable, which must exist
    pub fn executable(&self, tool: &'static str) -> Result<PathBuf, ToolchainError> {
        let root = self.root().ok_or(ToolchainError::SdkNotFound)?;
        let path = root.join("bin").join(executable_name(tool));
        if !path.exists() {
            return Err(ToolchainError::MissingExecutable { name: tool, path });
        }
        Ok(path)
    }

    fn jungle_if_present(&self) -> Option<&Path> {
        self.jungle.exists().then_some(self.jungle.as_path())
    }
}

/// Deterministic `monkeyc` argument vector (program name excluded)
pub fn compile_args(request: &BuildRequest, jungle: Option<&Path>) -> Vec<String> {
    let output = request.artifact_path();
    let mut args: Vec<String> = match jungle {
        Some(jungle) => vec![
            "-d".into(),
            request.target.clone(),
            "-f".into(),
            jungle.to_string_lossy().to_string(),
            "-o".into(),
            output.to_string_lossy().to_string(),
            "-y".into(),
            request.signing_key.to_string_lossy().to_string(),
        ],
        None => vec![
            "-f".into(),
            request.manifest.to_string_lossy().to_string(),
            "-o".into(),
            output.to_string_lossy().to_string(),
            "-d".into(),
            request.target.clone(),
            "-y".into(),
            request.signing_key.to_string_lossy().to_string(),
        ],
    };
    args.push(request.profile.flag().to_string());
    args
}

impl Compiler for Toolchain {
    fn compile(&self, request: &BuildRequest) -> Result<BuildResult, ToolchainError> {
        let monkeyc = self.executable(MONKEYC)?;
        let args = compile_args(request, self.jungle_if_present());
        debug!(program = %monkeyc.display(), ?args, "invoking compiler");

        let output = Command::new(&monkeyc)
            .args(&args)
            .current_dir(&self.project_dir)
            .output()
            .map_err(|source| ToolchainError::Launch {
                program: monkeyc.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(BuildResult::success(&request.target));
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let diagnostic = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };
        debug!(target = %request.target, code = ?output.status.code(), "compiler failed");
        Ok(BuildResult::failure(&request.target, diagnostic))
    }
}

impl SimulatorLauncher for Toolchain {
    fn launch(&self, artifact: &Path, target: &str) -> Result<RunHandle, ToolchainError> {
        let monkeydo = self.executable(MONKEYDO)?;

        // One pipe for both streams keeps the child's write order.
        let (reader, writer) = std::io::pipe()?;
        let stderr_writer = writer.try_clone()?;

        let mut cmd = Command::new(&monkeydo);
        cmd.arg(artifact)
            .arg(target)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr_writer);

        debug!(program = %monkeydo.display(), artifact = %artifact.display(), target, "launching simulator");
        let child = cmd.spawn().map_err(|source| ToolchainError::Launch {
            program: monkeydo.clone(),
            source,
        })?;
        // `cmd` still holds the write ends; drop it so EOF arrives when the child exits.
        drop(cmd);

        Ok(RunHandle::new(
            Box::new(ChildProcess::new(child)),
            Box::new(BufReader::new(reader)),
        ))
    }
}
