//! Simulator run session tests
//!
//! The simulator is replaced by an in-process stub whose output is a pipe,
//! so streaming order, exit detection and cancellation can be observed.

use std::io::{BufReader, PipeWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ciqx::build::{RunOutcome, RunSession};
use ciqx::reporter::{Level, MemoryReporter};
use ciqx::signal::Interrupt;
use ciqx::toolchain::{ExitInfo, RunHandle, SimulatorLauncher, SimulatorProcess, ToolchainError};

struct StubProcess {
    exit: Option<ExitInfo>,
    /// Held open until terminate so a "running" simulator never reaches EOF
    writer: Option<PipeWriter>,
    terminated: Arc<AtomicBool>,
}

impl SimulatorProcess for StubProcess {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitInfo>> {
        Ok(self.exit)
    }

    fn terminate(&mut self) -> std::io::Result<()> {
        self.writer.take();
        self.terminated.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Launches a stub that prints `lines`; exits on its own when `exits` is set
struct StubLauncher {
    lines: Vec<String>,
    exits: bool,
    calls: AtomicUsize,
    launched: Mutex<Vec<(String, String)>>,
    terminated: Arc<AtomicBool>,
}

impl StubLauncher {
    fn new(lines: &[&str], exits: bool) -> Self {
        Self {
            lines: lines.iter().map(|s| s.to_string()).collect(),
            exits,
            calls: AtomicUsize::new(0),
            launched: Mutex::new(Vec::new()),
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SimulatorLauncher for StubLauncher {
    fn launch(&self, artifact: &Path, target: &str) -> Result<RunHandle, ToolchainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.launched.lock().unwrap().push((
            artifact.file_name().unwrap().to_string_lossy().to_string(),
            target.to_string(),
        ));

        let (reader, mut writer) = std::io::pipe()?;
        for line in &self.lines {
            writeln!(writer, "{}", line)?;
        }
        let process = StubProcess {
            exit: self.exits.then_some(ExitInfo { code: Some(0) }),
            writer: if self.exits { None } else { Some(writer) },
            terminated: Arc::clone(&self.terminated),
        };
        Ok(RunHandle::new(
            Box::new(process),
            Box::new(BufReader::new(reader)),
        ))
    }
}

fn artifact(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("build").join("fenix7-debug.prg");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"prg").unwrap();
    path
}

#[test]
fn test_missing_artifact_never_launches() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = Arc::new(StubLauncher::new(&[], true));
    let reporter = Arc::new(MemoryReporter::new());
    let session = RunSession::new(launcher.clone(), reporter.clone());

    let missing = tmp.path().join("build").join("fenix7-debug.prg");
    let err = session
        .run_and_stream(&missing, "fenix7", &|| false)
        .unwrap_err();

    assert!(matches!(err, ToolchainError::ArtifactMissing(_)));
    assert_eq!(launcher.calls.load(Ordering::SeqCst), 0);
    let errors = reporter.messages(Level::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("App not found:"));
    assert!(errors[0].contains("fenix7-debug.prg"));
}

#[test]
fn test_output_is_forwarded_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = Arc::new(StubLauncher::new(
        &["Connecting to simulator", "Loading app", "Ready"],
        true,
    ));
    let reporter = Arc::new(MemoryReporter::new());
    let session = RunSession::new(launcher.clone(), reporter.clone());

    let outcome = session
        .run_and_stream(&artifact(tmp.path()), "fenix7", &|| false)
        .unwrap();

    assert_eq!(outcome, RunOutcome::Exited(ExitInfo { code: Some(0) }));
    assert_eq!(
        reporter.messages(Level::Output),
        vec!["Connecting to simulator", "Loading app", "Ready"]
    );
    assert_eq!(
        reporter.messages(Level::Info),
        vec!["Running fenix7-debug.prg on fenix7"]
    );
    assert_eq!(
        launcher.launched.lock().unwrap().clone(),
        vec![("fenix7-debug.prg".to_string(), "fenix7".to_string())]
    );
    assert!(!launcher.terminated.load(Ordering::SeqCst));
}

#[test]
fn test_stop_terminates_before_returning() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = Arc::new(StubLauncher::new(&["Simulator started"], false));
    let reporter = Arc::new(MemoryReporter::new());
    let session = RunSession::new(launcher.clone(), reporter.clone());

    let started = Instant::now();
    let stop = move || started.elapsed() > Duration::from_millis(200);
    let outcome = session
        .run_and_stream(&artifact(tmp.path()), "fenix7", &stop)
        .unwrap();

    assert_eq!(outcome, RunOutcome::Stopped);
    assert!(launcher.terminated.load(Ordering::SeqCst));
    assert_eq!(reporter.messages(Level::Output), vec!["Simulator started"]);
    assert!(
        reporter
            .messages(Level::Info)
            .contains(&"Stopping simulator...".to_string())
    );
}

#[test]
fn test_interrupt_stops_a_running_simulator() {
    let tmp = tempfile::tempdir().unwrap();
    let launcher = Arc::new(StubLauncher::new(&[], false));
    let session = RunSession::new(launcher.clone(), Arc::new(MemoryReporter::new()));

    let interrupt = Interrupt::new();
    let stop = interrupt.watch();
    let trigger = interrupt.clone();
    let presser = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(150));
        trigger.trigger();
    });

    let outcome = session
        .run_and_stream(&artifact(tmp.path()), "venu2", &stop)
        .unwrap();
    presser.join().unwrap();

    assert_eq!(outcome, RunOutcome::Stopped);
    assert!(launcher.terminated.load(Ordering::SeqCst));
}
