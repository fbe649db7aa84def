//! Process-facing seams: the compiler and simulator traits, and the handle
//! that owns one live simulator process.

use super::types::{BuildRequest, BuildResult, ToolchainError};
use std::io::{self, BufRead};
use std::path::Path;
use std::process::Child;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long a simulator gets to exit after SIGTERM before it is killed
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

const EXIT_POLL: Duration = Duration::from_millis(20);

/// Blocking call-and-capture: one compile per request
pub trait Compiler: Send + Sync {
    fn compile(&self, request: &BuildRequest) -> Result<BuildResult, ToolchainError>;
}

/// Non-blocking spawn-plus-stream: one simulator per call
pub trait SimulatorLauncher: Send + Sync {
    fn launch(&self, artifact: &Path, target: &str) -> Result<RunHandle, ToolchainError>;
}

/// Exit information of a finished simulator process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// `None` when the process was ended by a signal
    pub code: Option<i32>,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// The lifecycle half of a running simulator
pub trait SimulatorProcess: Send {
    /// `Some` once the process has exited
    fn try_wait(&mut self) -> io::Result<Option<ExitInfo>>;

    /// Stop the process and reap it. Must be safe to call more than once.
    fn terminate(&mut self) -> io::Result<()>;
}

/// Ownership of one live simulator process plus its merged output stream.
///
/// Dropping a handle whose process is still running terminates it.
pub struct RunHandle {
    process: Box<dyn SimulatorProcess>,
    output: Option<Box<dyn BufRead + Send>>,
    finished: bool,
}

impl RunHandle {
    pub fn new(process: Box<dyn SimulatorProcess>, output: Box<dyn BufRead + Send>) -> Self {
        Self {
            process,
            output: Some(output),
            finished: false,
        }
    }

    /// Take the output stream. The stream can be read on another thread while
    /// the handle keeps lifecycle control.
    pub fn take_output(&mut self) -> Option<Box<dyn BufRead + Send>> {
        self.output.take()
    }

    pub fn try_wait(&mut self) -> io::Result<Option<ExitInfo>> {
        let status = self.process.try_wait()?;
        if status.is_some() {
            self.finished = true;
        }
        Ok(status)
    }

    pub fn terminate(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.process.terminate()?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if !self.finished
            && let Err(e) = self.process.terminate()
        {
            debug!(error = %e, "failed to terminate simulator on drop");
        }
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// [`SimulatorProcess`] over a real child process.
///
/// On Unix `terminate` sends SIGTERM and waits up to the grace period
/// before killing; elsewhere it kills right away.
pub struct ChildProcess {
    child: Child,
    grace: Duration,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        Self::with_grace(child, TERMINATE_GRACE)
    }

    pub fn with_grace(child: Child, grace: Duration) -> Self {
        Self { child, grace }
    }

    fn exited_within(&mut self, grace: Duration) -> io::Result<bool> {
        let deadline = Instant::now() + grace;
        loop {
            if self.child.try_wait()?.is_some() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(EXIT_POLL);
        }
    }
}

#[cfg(unix)]
fn request_stop(child: &Child) -> bool {
    let Ok(pid) = libc::pid_t::try_from(child.id()) else {
        return false;
    };
    // SAFETY: `pid` is our own child and has not been reaped yet, so the id
    // cannot have been reused.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn request_stop(_child: &Child) -> bool {
    false
}

impl SimulatorProcess for ChildProcess {
    fn try_wait(&mut self) -> io::Result<Option<ExitInfo>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| ExitInfo { code: status.code() }))
    }

    fn terminate(&mut self) -> io::Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        if request_stop(&self.child) {
            if self.exited_within(self.grace)? {
                return Ok(());
            }
            debug!(pid = self.child.id(), "simulator ignored SIGTERM; killing");
        }
        match self.child.kill() {
            Ok(()) => {}
            // Already exited between the check and the kill.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            Err(e) => return Err(e),
        }
        self.child.wait()?;
        Ok(())
    }
}
