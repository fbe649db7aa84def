use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Build profile, selects the profile-specific compiler flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Debug symbols (`-g`)
    #[default]
    Debug,
    /// Release build (`-r`)
    Release,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Debug => "debug",
            Profile::Release => "release",
        }
    }

    /// The flag appended after the common arguments
    pub fn flag(&self) -> &'static str {
        match self {
            Profile::Debug => "-g",
            Profile::Release => "-r",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed for one compile attempt. All paths are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub target: String,
    pub profile: Profile,
    pub manifest: PathBuf,
    pub output_dir: PathBuf,
    pub signing_key: PathBuf,
}

impl BuildRequest {
    /// `<output_dir>/<target>-<profile>.prg`
    pub fn artifact_path(&self) -> PathBuf {
        artifact_path(&self.output_dir, &self.target, self.profile)
    }
}

pub fn artifact_path(output_dir: &Path, target: &str, profile: Profile) -> PathBuf {
    output_dir.join(format!("{}-{}.prg", target, profile.as_str()))
}

/// Outcome of one compile attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    target: String,
    succeeded: bool,
    diagnostic: Option<String>,
}

impl BuildResult {
    pub fn success(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            succeeded: true,
            diagnostic: None,
        }
    }

    pub fn failure(target: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            succeeded: false,
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }
}

/// Error type for toolchain operations.
///
/// Compile failures are not errors: they come back as a failed
/// [`BuildResult`] so a sweep can continue.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("Connect IQ SDK not found")]
    SdkNotFound,

    #[error("{name} not found at {}", path.display())]
    MissingExecutable { name: &'static str, path: PathBuf },

    #[error("App not found: {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("failed to launch {}: {source}", program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolchainError {
    /// Precondition failures are reported and end the current operation,
    /// they never mean the toolchain itself misbehaved.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ToolchainError::SdkNotFound
                | ToolchainError::MissingExecutable { .. }
                | ToolchainError::ArtifactMissing(_)
        )
    }
}
