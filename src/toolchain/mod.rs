//! Connect IQ SDK discovery and invocation
//!
//! The SDK is only reachable as two executables under `<root>/bin`:
//! `monkeyc` (compiler) and `monkeydo` (simulator launcher). This module finds
//! the root, builds their argument vectors, and runs them.

pub mod invoker;
pub mod process;
pub mod types;

pub use invoker::{Toolchain, compile_args};
pub use process::{ChildProcess, Compiler, ExitInfo, RunHandle, SimulatorLauncher, SimulatorProcess};
pub use types::{BuildRequest, BuildResult, Profile, ToolchainError, artifact_path};

use regex::Regex;
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

pub const MONKEYC: &str = "monkeyc";
pub const MONKEYDO: &str = "monkeydo";

static SDK_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("valid regex"));

/// Anything that can answer "where is the SDK root?"
pub trait LocateSdk: Send + Sync {
    fn find_toolchain_root(&self) -> Option<PathBuf>;
}

/// Filesystem-scanning SDK locator
#[derive(Debug, Clone)]
pub struct SdkLocator {
    explicit: Option<PathBuf>,
    auto_detect: bool,
    candidates: Vec<PathBuf>,
}

impl SdkLocator {
    /// Locator over the platform-conventional install locations
    pub fn new(explicit: Option<PathBuf>, auto_detect: bool) -> Self {
        Self {
            explicit,
            auto_detect,
            candidates: default_candidates(),
        }
    }

    /// Locator over a caller-supplied candidate list
    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self {
            explicit: None,
            auto_detect: true,
            candidates,
        }
    }
}

impl LocateSdk for SdkLocator {
    fn find_toolchain_root(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit {
            if path.exists() {
                return Some(path.clone());
            }
            debug!(path = %path.display(), "configured sdk.path does not exist");
        }

        if !self.auto_detect {
            return None;
        }

        self.candidates.iter().find_map(|c| probe_candidate(c))
    }
}

fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".Garmin").join("ConnectIQ").join("SDK"));
        candidates.push(home.join(".Garmin").join("ConnectIQ").join("Sdks"));
    }
    if let Some(data) = dirs::data_dir() {
        candidates.push(data.join("Garmin").join("ConnectIQ").join("Sdks"));
    }
    candidates.push(PathBuf::from("/Applications/Garmin Connect IQ SDK"));
    candidates
}

/// A candidate is a root if it has `bin/`, otherwise look one level down for
/// versioned `connectiq-sdk-*` directories and take the newest.
fn probe_candidate(candidate: &Path) -> Option<PathBuf> {
    if !candidate.is_dir() {
        return None;
    }
    if candidate.join("bin").is_dir() {
        return Some(candidate.to_path_buf());
    }

    let entries = std::fs::read_dir(candidate).ok()?;
    let mut versioned: Vec<(Option<Version>, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.join("bin").is_dir())
        .filter_map(|p| {
            let name = p.file_name()?.to_string_lossy().to_string();
            name.contains("connectiq-sdk")
                .then(|| (sdk_version(&name), p))
        })
        .collect();

    // Newest version last; unversioned names sort first, ties by path.
    versioned.sort();
    versioned.pop().map(|(_, p)| p)
}

/// Extract `7.3.1` from names like `connectiq-sdk-lin-7.3.1-2024-09-23-df7b5816a`
pub fn sdk_version(dir_name: &str) -> Option<Version> {
    let caps = SDK_VERSION_RE.captures(dir_name)?;
    Version::parse(&format!("{}.{}.{}", &caps[1], &caps[2], &caps[3])).ok()
}

/// Platform file name of an SDK executable
pub fn executable_name(tool: &str) -> String {
    if cfg!(windows) {
        format!("{}.bat", tool)
    } else {
        tool.to_string()
    }
}
