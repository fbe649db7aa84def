use super::planner::{BarProgress, BuildLayout, BuildPlanner, Sweep};
use super::session::{RunOutcome, RunSession};
use super::watcher::{EventSource, NotifySource, WatchLoop};
use crate::config::CiqxConfig;
use crate::reporter::Reporter;
use crate::signal::Interrupt;
use crate::toolchain::{
    Compiler, Profile, SdkLocator, SimulatorLauncher, Toolchain, ToolchainError, artifact_path,
};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

const IDLE_POLL: Duration = Duration::from_millis(100);

/// Options for `watch`
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub patterns: Vec<String>,
    pub debounce: Duration,
    /// Replace a running simulator after each successful rebuild
    pub restart_simulator: bool,
}

impl WatchOptions {
    pub fn from_config(config: &CiqxConfig) -> Self {
        Self {
            patterns: config.watch_patterns(),
            debounce: config.watch.debounce(),
            restart_simulator: config.watch.restart_simulator,
        }
    }
}

/// Wires planner, run session and watch loop together for one project
pub struct Orchestrator {
    root: PathBuf,
    reporter: Arc<dyn Reporter>,
    planner: BuildPlanner,
    session: RunSession,
}

impl Orchestrator {
    pub fn new(
        root: PathBuf,
        layout: BuildLayout,
        compiler: Arc<dyn Compiler>,
        launcher: Arc<dyn SimulatorLauncher>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            root,
            planner: BuildPlanner::new(compiler, Arc::clone(&reporter), layout),
            session: RunSession::new(launcher, Arc::clone(&reporter)),
            reporter,
        }
    }

    /// Orchestrator over the real SDK, paths resolved against `root`
    pub fn from_config(root: &Path, config: &CiqxConfig, reporter: Arc<dyn Reporter>) -> Self {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let locator = SdkLocator::new(config.sdk.path.clone(), config.sdk.auto_detect);
        let toolchain = Arc::new(Toolchain::new(
            Box::new(locator),
            root.clone(),
            root.join(&config.project.jungle),
        ));
        let layout = BuildLayout {
            manifest: root.join(&config.project.manifest),
            output_dir: root.join(&config.project.out_dir),
            signing_key: root.join(&config.signing.developer_key),
        };
        Self::new(root, layout, toolchain.clone(), toolchain, reporter)
    }

    pub fn artifact(&self, target: &str, profile: Profile) -> PathBuf {
        artifact_path(&self.planner.layout().output_dir, target, profile)
    }

    /// Build one target; `Ok(false)` when the compile failed
    pub fn build(&self, target: &str, profile: Profile) -> Result<bool> {
        Ok(self.planner.build_one(target, profile)?.succeeded())
    }

    /// Build every target with a progress bar and report the tally
    pub fn build_all(&self, targets: &[String], profile: Profile) -> Result<Sweep> {
        let mut progress = BarProgress::new();
        let sweep = self.planner.build_all(targets, profile, &mut progress);
        progress.finish();
        let sweep = sweep?;

        if sweep.succeeded() {
            self.reporter.success(&format!(
                "Built all {} targets successfully",
                sweep.success_count()
            ));
        } else {
            self.reporter.error(&sweep.summary());
        }
        Ok(sweep)
    }

    /// Build, then run in the simulator until it exits or Ctrl-C
    pub fn run(&self, target: &str, profile: Profile, interrupt: &Interrupt) -> Result<()> {
        let stop = interrupt.watch();
        if !self.build(target, profile)? || stop.fired() {
            return Ok(());
        }
        let outcome = self
            .session
            .run_and_stream(&self.artifact(target, profile), target, &stop)?;
        debug!(?outcome, "run finished");
        Ok(())
    }

    /// Watch the project root with the `notify` backend
    pub fn watch(
        &self,
        target: &str,
        profile: Profile,
        options: &WatchOptions,
        interrupt: &Interrupt,
    ) -> Result<()> {
        let source = NotifySource::new(&self.root);
        self.watch_with(source, target, profile, options, interrupt)
    }

    /// Watch loop driver over any event source.
    ///
    /// Every successful build, initial or triggered, queues a simulator launch
    /// on the fresh artifact. With `restart_simulator` a queued launch also
    /// replaces a simulator that is still running; without it the running
    /// simulator is left alone and the launch happens once it exits.
    ///
    /// Ctrl-C while the simulator runs stops the simulator and drops any
    /// queued launch; Ctrl-C while idle stops watching and returns `Ok`.
    pub fn watch_with<S: EventSource>(
        &self,
        source: S,
        target: &str,
        profile: Profile,
        options: &WatchOptions,
        interrupt: &Interrupt,
    ) -> Result<()> {
        self.reporter
            .info(&format!("Starting watch mode for {} ({})", target, profile));
        self.reporter.info("Press Ctrl+C to stop");

        let launch_pending = Arc::new(AtomicBool::new(false));
        let mut watch = WatchLoop::new(source, &self.root, options.debounce);
        {
            let planner = self.planner.clone();
            let reporter = Arc::clone(&self.reporter);
            let launch_pending = Arc::clone(&launch_pending);
            let target = target.to_string();
            watch.start(&options.patterns, move || {
                reporter.info("Files changed, rebuilding...");
                match planner.build_one(&target, profile) {
                    Ok(result) if result.succeeded() => {
                        launch_pending.store(true, Ordering::SeqCst);
                    }
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "rebuild could not run"),
                }
            })?;
        }

        let artifact = self.artifact(target, profile);
        let first = interrupt.watch();
        if self.build(target, profile)? {
            launch_pending.store(true, Ordering::SeqCst);
        }
        if first.fired() {
            // Ctrl-C during the initial build ends the session.
            watch.stop();
            self.reporter.info("Watch mode stopped");
            return Ok(());
        }

        loop {
            if launch_pending.swap(false, Ordering::SeqCst) {
                let stop_run = interrupt.watch();
                let stop = || {
                    stop_run.fired()
                        || (options.restart_simulator && launch_pending.load(Ordering::SeqCst))
                };
                match self.session.run_and_stream(&artifact, target, &stop) {
                    Ok(RunOutcome::Stopped) if !stop_run.fired() => {
                        // Superseded by a rebuild: launch again on the new artifact.
                        continue;
                    }
                    Ok(outcome) => debug!(?outcome, "simulator run ended"),
                    Err(e) if e.is_precondition() => {}
                    Err(ToolchainError::Launch { .. }) => {}
                    Err(e) => {
                        watch.stop();
                        return Err(e.into());
                    }
                }
                if stop_run.fired() {
                    launch_pending.store(false, Ordering::SeqCst);
                }
            }

            let idle = interrupt.watch();
            while !idle.fired() && !launch_pending.load(Ordering::SeqCst) {
                std::thread::sleep(IDLE_POLL);
            }
            if idle.fired() {
                break;
            }
        }

        watch.stop();
        self.reporter.info("Watch mode stopped");
        Ok(())
    }
}
