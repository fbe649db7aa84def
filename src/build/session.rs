//! Live simulator runs.

use crate::reporter::Reporter;
use crate::signal::StopSignal;
use crate::toolchain::{ExitInfo, SimulatorLauncher, ToolchainError};
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The simulator exited on its own after its output was drained
    Exited(ExitInfo),
    /// The stop signal fired and the simulator was terminated
    Stopped,
}

pub struct RunSession {
    launcher: Arc<dyn SimulatorLauncher>,
    reporter: Arc<dyn Reporter>,
}

impl RunSession {
    pub fn new(launcher: Arc<dyn SimulatorLauncher>, reporter: Arc<dyn Reporter>) -> Self {
        Self { launcher, reporter }
    }

    /// Launch the simulator for `artifact` and forward its output line by line
    /// until it exits or `stop` fires. The process is terminated before this
    /// returns `Stopped`.
    pub fn run_and_stream(
        &self,
        artifact: &Path,
        target: &str,
        stop: &dyn StopSignal,
    ) -> Result<RunOutcome, ToolchainError> {
        if !artifact.exists() {
            let err = ToolchainError::ArtifactMissing(artifact.to_path_buf());
            self.reporter.error(&err.to_string());
            return Err(err);
        }

        let name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| artifact.display().to_string());
        self.reporter.info(&format!("Running {} on {}", name, target));

        let mut handle = match self.launcher.launch(artifact, target) {
            Ok(handle) => handle,
            Err(e) => {
                self.reporter.error(&e.to_string());
                return Err(e);
            }
        };

        // Single reader keeps line order; the channel closing means EOF.
        let (tx, rx) = mpsc::channel::<String>();
        match handle.take_output() {
            None => drop(tx),
            Some(output) => {
                std::thread::Builder::new()
                    .name("ciqx-sim-output".into())
                    .spawn(move || {
                        for line in output.lines() {
                            match line {
                                Ok(line) => {
                                    if tx.send(line).is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    debug!(error = %e, "simulator output read failed");
                                    break;
                                }
                            }
                        }
                    })?;
            }
        }

        let mut eof = false;
        loop {
            if stop.should_stop() {
                self.reporter.info("Stopping simulator...");
                handle.terminate()?;
                return Ok(RunOutcome::Stopped);
            }

            if eof {
                if let Some(exit) = handle.try_wait()? {
                    debug!(code = ?exit.code, "simulator exited");
                    return Ok(RunOutcome::Exited(exit));
                }
                std::thread::sleep(POLL_INTERVAL);
                continue;
            }

            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => self.reporter.output(&line),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => eof = true,
            }
        }
    }
}
