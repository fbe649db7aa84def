//! Toolchain invocation tests against fake SDK executables
//!
//! A throwaway SDK directory holds shell-script stand-ins for `monkeyc` and
//! `monkeydo`, so the real process plumbing runs end to end.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use ciqx::build::{BuildLayout, BuildPlanner, RunOutcome, RunSession};
use ciqx::reporter::{Level, MemoryReporter};
use ciqx::toolchain::{
    BuildRequest, ChildProcess, Compiler, Profile, SdkLocator, SimulatorLauncher,
    SimulatorProcess, Toolchain, ToolchainError,
};

/// Writing a script while another thread forks can leave it busy (ETXTBSY),
/// so tests in this file run one at a time.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

struct FakeSdk {
    _tmp: tempfile::TempDir,
    project: PathBuf,
    sdk: PathBuf,
}

impl FakeSdk {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("project");
        let sdk = tmp.path().join("sdk");
        fs::create_dir_all(&project).unwrap();
        fs::create_dir_all(sdk.join("bin")).unwrap();
        Self {
            _tmp: tmp,
            project,
            sdk,
        }
    }

    fn script(&self, name: &str, body: &str) {
        let path = self.sdk.join("bin").join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn args_file(&self) -> PathBuf {
        self.sdk.join("args.txt")
    }

    /// `monkeyc` that records one argument per line, then exits with `code`
    fn recording_compiler(&self, code: i32, stderr: &str) {
        self.script(
            "monkeyc",
            &format!(
                "for a in \"$@\"; do echo \"$a\" >> '{}'; done\nprintf '%s' '{}' >&2\nexit {}",
                self.args_file().display(),
                stderr,
                code
            ),
        );
    }

    fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(self.args_file())
            .unwrap_or_default()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    fn toolchain(&self) -> Toolchain {
        Toolchain::new(
            Box::new(SdkLocator::new(Some(self.sdk.clone()), false)),
            self.project.clone(),
            self.project.join("monkey.jungle"),
        )
    }

    fn layout(&self) -> BuildLayout {
        BuildLayout {
            manifest: self.project.join("manifest.xml"),
            output_dir: self.project.join("build"),
            signing_key: self.project.join("developer_key.der"),
        }
    }

    fn request(&self, target: &str, profile: Profile) -> BuildRequest {
        self.layout().request(target, profile)
    }
}

fn path_str(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

#[test]
fn test_compile_passes_manifest_arguments() {
    let _guard = serial();
    let sdk = FakeSdk::new();
    sdk.recording_compiler(0, "");

    let result = sdk
        .toolchain()
        .compile(&sdk.request("fenix7", Profile::Release))
        .unwrap();

    assert!(result.succeeded());
    assert_eq!(
        sdk.recorded_args(),
        vec![
            "-f".to_string(),
            path_str(&sdk.project.join("manifest.xml")),
            "-o".to_string(),
            path_str(&sdk.project.join("build").join("fenix7-release.prg")),
            "-d".to_string(),
            "fenix7".to_string(),
            "-y".to_string(),
            path_str(&sdk.project.join("developer_key.der")),
            "-r".to_string(),
        ]
    );
}

#[test]
fn test_compile_prefers_jungle_when_present() {
    let _guard = serial();
    let sdk = FakeSdk::new();
    sdk.recording_compiler(0, "");
    fs::write(sdk.project.join("monkey.jungle"), "project.manifest = manifest.xml\n").unwrap();

    sdk.toolchain()
        .compile(&sdk.request("venu2", Profile::Debug))
        .unwrap();

    let args = sdk.recorded_args();
    assert_eq!(args[0], "-d");
    assert_eq!(args[1], "venu2");
    assert_eq!(args[2], "-f");
    assert_eq!(args[3], path_str(&sdk.project.join("monkey.jungle")));
    assert_eq!(args.last().map(String::as_str), Some("-g"));
    assert!(!args.contains(&path_str(&sdk.project.join("manifest.xml"))));
}

#[test]
fn test_failed_compile_captures_stderr() {
    let _guard = serial();
    let sdk = FakeSdk::new();
    sdk.recording_compiler(1, "ERROR: fenix7: source/App.mc:3: Undefined symbol foo");

    let result = sdk
        .toolchain()
        .compile(&sdk.request("fenix7", Profile::Debug))
        .unwrap();

    assert!(!result.succeeded());
    assert_eq!(
        result.diagnostic(),
        Some("ERROR: fenix7: source/App.mc:3: Undefined symbol foo")
    );
}

#[test]
fn test_failed_compile_falls_back_to_stdout() {
    let _guard = serial();
    let sdk = FakeSdk::new();
    sdk.script("monkeyc", "echo 'BUILD FAILED: device not supported'\nexit 2");

    let result = sdk
        .toolchain()
        .compile(&sdk.request("fenix7", Profile::Debug))
        .unwrap();

    assert_eq!(
        result.diagnostic(),
        Some("BUILD FAILED: device not supported")
    );
}

#[test]
fn test_missing_monkeyc_is_a_precondition_error() {
    let _guard = serial();
    let sdk = FakeSdk::new();

    let err = sdk
        .toolchain()
        .compile(&sdk.request("fenix7", Profile::Debug))
        .unwrap_err();

    assert!(matches!(err, ToolchainError::MissingExecutable { name: "monkeyc", .. }));
    assert!(err.is_precondition());
}

#[test]
fn test_unspawnable_compiler_is_a_launch_error() {
    let _guard = serial();
    let sdk = FakeSdk::new();
    // Present but not executable.
    let path = sdk.sdk.join("bin").join("monkeyc");
    fs::write(&path, "not a program").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

    let err = sdk
        .toolchain()
        .compile(&sdk.request("fenix7", Profile::Debug))
        .unwrap_err();

    assert!(matches!(err, ToolchainError::Launch { .. }));
}

#[test]
fn test_planner_sweep_with_real_processes() {
    let _guard = serial();
    let sdk = FakeSdk::new();
    sdk.script(
        "monkeyc",
        "case \"$*\" in *venu2*) echo 'ERROR: venu2: Invalid device id' >&2; exit 1;; esac\nexit 0",
    );
    let reporter = Arc::new(MemoryReporter::new());
    let planner = BuildPlanner::new(Arc::new(sdk.toolchain()), reporter.clone(), sdk.layout());

    let sweep = planner
        .build_all(
            &["fenix7".to_string(), "venu2".to_string()],
            Profile::Debug,
            &mut ciqx::build::NoProgress,
        )
        .unwrap();

    assert_eq!(sweep.summary(), "1/2 targets succeeded");
    assert!(sdk.project.join("build").is_dir());
    assert!(
        reporter
            .messages(Level::Info)
            .iter()
            .any(|m| m.contains("ciqx devices"))
    );
}

#[test]
fn test_simulator_output_is_merged_and_streamed() {
    let _guard = serial();
    let sdk = FakeSdk::new();
    sdk.script(
        "monkeydo",
        "echo \"launch $1 $2\"\necho 'warning: low memory' >&2\necho 'done'",
    );
    let artifact = sdk.project.join("build").join("fenix7-debug.prg");
    fs::create_dir_all(artifact.parent().unwrap()).unwrap();
    fs::write(&artifact, b"prg").unwrap();

    let reporter = Arc::new(MemoryReporter::new());
    let session = RunSession::new(Arc::new(sdk.toolchain()), reporter.clone());
    let outcome = session
        .run_and_stream(&artifact, "fenix7", &|| false)
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Exited(exit) if exit.success()));
    assert_eq!(
        reporter.messages(Level::Output),
        vec![
            format!("launch {} fenix7", artifact.display()),
            "warning: low memory".to_string(),
            "done".to_string(),
        ]
    );
}

#[test]
fn test_long_running_simulator_is_killed_on_stop() {
    let _guard = serial();
    let sdk = FakeSdk::new();
    sdk.script("monkeydo", "echo ready\nexec sleep 30");
    let artifact = sdk.project.join("app.prg");
    fs::write(&artifact, b"prg").unwrap();

    let toolchain = sdk.toolchain();
    let mut handle = toolchain.launch(&artifact, "fenix7").unwrap();
    std::thread::sleep(Duration::from_millis(200));
    assert!(handle.try_wait().unwrap().is_none());

    handle.terminate().unwrap();
    // Terminate reaps the child, so a second call is a no-op.
    handle.terminate().unwrap();
}

#[test]
fn test_stop_lets_simulator_shut_down_cleanly() {
    let _guard = serial();
    let sdk = FakeSdk::new();
    let marker = sdk.project.join("shutdown.txt");
    sdk.script(
        "monkeydo",
        &format!(
            "trap 'echo clean > \"{}\"; exit 0' TERM\necho ready\nwhile true; do sleep 0.1; done",
            marker.display()
        ),
    );
    let artifact = sdk.project.join("app.prg");
    fs::write(&artifact, b"prg").unwrap();

    let mut handle = sdk.toolchain().launch(&artifact, "fenix7").unwrap();
    std::thread::sleep(Duration::from_millis(200));
    handle.terminate().unwrap();

    assert_eq!(fs::read_to_string(&marker).unwrap().trim(), "clean");
}

#[test]
fn test_simulator_ignoring_sigterm_is_killed_after_grace() {
    let _guard = serial();
    let sdk = FakeSdk::new();
    sdk.script("monkeydo", "trap '' TERM\nexec sleep 30");

    let child = Command::new(sdk.sdk.join("bin").join("monkeydo"))
        .stdout(Stdio::null())
        .spawn()
        .unwrap();
    let mut process = ChildProcess::with_grace(child, Duration::from_millis(200));
    std::thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    process.terminate().unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_secs(5));
    let exit = process.try_wait().unwrap().unwrap();
    assert_eq!(exit.code, None);
}
