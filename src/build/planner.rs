//! Sequential multi-target build sweeps.

use super::feedback::FeedbackAnalyzer;
use crate::reporter::Reporter;
use crate::toolchain::{BuildRequest, BuildResult, Compiler, Profile, ToolchainError};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Called once before and once after each target's compile attempt
pub trait BuildProgress {
    fn started(&mut self, index: usize, total: usize, target: &str);
    fn finished(&mut self, index: usize, total: usize, result: &BuildResult);
}

/// No progress display
pub struct NoProgress;

impl BuildProgress for NoProgress {
    fn started(&mut self, _: usize, _: usize, _: &str) {}
    fn finished(&mut self, _: usize, _: usize, _: &BuildResult) {}
}

/// Terminal progress bar for `build --all`
pub struct BarProgress {
    pb: Option<ProgressBar>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self { pb: None }
    }

    pub fn finish(&mut self) {
        if let Some(pb) = self.pb.take() {
            pb.finish_and_clear();
        }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildProgress for BarProgress {
    fn started(&mut self, _index: usize, total: usize, target: &str) {
        let pb = self.pb.get_or_insert_with(|| {
            let pb = ProgressBar::new(total as u64);
            let style = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-");
            pb.set_style(style);
            pb
        });
        pb.set_message(format!("Building {}", target));
    }

    fn finished(&mut self, _index: usize, _total: usize, _result: &BuildResult) {
        if let Some(pb) = &self.pb {
            pb.inc(1);
        }
    }
}

/// Ordered results of a sweep, one per requested target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sweep {
    results: Vec<BuildResult>,
}

impl Sweep {
    pub fn results(&self) -> &[BuildResult] {
        &self.results
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded()).count()
    }

    /// True iff every target succeeded
    pub fn succeeded(&self) -> bool {
        self.success_count() == self.results.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}/{} targets succeeded",
            self.success_count(),
            self.results.len()
        )
    }
}

/// Paths shared by every request of a project, already resolved
#[derive(Debug, Clone)]
pub struct BuildLayout {
    pub manifest: PathBuf,
    pub output_dir: PathBuf,
    pub signing_key: PathBuf,
}

impl BuildLayout {
    pub fn request(&self, target: &str, profile: Profile) -> BuildRequest {
        BuildRequest {
            target: target.to_string(),
            profile,
            manifest: self.manifest.clone(),
            output_dir: self.output_dir.clone(),
            signing_key: self.signing_key.clone(),
        }
    }
}

/// Sequences compiles through a [`Compiler`]. Cheap to clone.
///
/// Clones share one build lock, so at most one compile runs at a time no
/// matter which thread asks for it.
#[derive(Clone)]
pub struct BuildPlanner {
    compiler: Arc<dyn Compiler>,
    reporter: Arc<dyn Reporter>,
    layout: BuildLayout,
    build_lock: Arc<Mutex<()>>,
}

impl BuildPlanner {
    pub fn new(compiler: Arc<dyn Compiler>, reporter: Arc<dyn Reporter>, layout: BuildLayout) -> Self {
        Self {
            compiler,
            reporter,
            layout,
            build_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn layout(&self) -> &BuildLayout {
        &self.layout
    }

    /// Compile one target.
    ///
    /// A failed compile is an `Ok` with a failed result; `Err` means the
    /// toolchain could not be used at all.
    pub fn build_one(&self, target: &str, profile: Profile) -> Result<BuildResult, ToolchainError> {
        // The toolchain writes one artifact per target; never run it twice at once.
        let _guard = self.build_lock.lock().unwrap_or_else(|e| e.into_inner());
        fs::create_dir_all(&self.layout.output_dir)?;
        let request = self.layout.request(target, profile);

        self.reporter
            .info(&format!("Building {} ({})...", target, profile));

        let result = match self.compiler.compile(&request) {
            Ok(result) => result,
            Err(e) => {
                self.reporter.error(&e.to_string());
                return Err(e);
            }
        };

        if result.succeeded() {
            self.reporter
                .success(&format!("Built {} successfully", target));
        } else {
            let diagnostic = result.diagnostic().unwrap_or_default();
            self.reporter.error(&format!(
                "Build failed for {}: {}",
                target,
                FeedbackAnalyzer::summary(diagnostic)
            ));
            self.reporter.debug(diagnostic);
            if let Some(hint) = FeedbackAnalyzer::analyze(diagnostic) {
                self.reporter.info(&hint);
            }
        }

        Ok(result)
    }

    /// Compile every target in order. One failure never stops the sweep.
    pub fn build_all(
        &self,
        targets: &[String],
        profile: Profile,
        progress: &mut dyn BuildProgress,
    ) -> Result<Sweep, ToolchainError> {
        let total = targets.len();
        let mut results = Vec::with_capacity(total);

        for (index, target) in targets.iter().enumerate() {
            progress.started(index, total, target);
            let result = self.build_one(target, profile)?;
            progress.finished(index, total, &result);
            debug!(target = %target, succeeded = result.succeeded(), "sweep step");
            results.push(result);
        }

        Ok(Sweep { results })
    }
}
