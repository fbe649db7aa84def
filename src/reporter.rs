//! User-facing output sink.
//!
//! Every component receives an `Arc<dyn Reporter>` at construction instead of
//! printing directly, so tests can swap in [`MemoryReporter`].

use colored::*;
use std::sync::Mutex;

pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
    fn debug(&self, message: &str);
    fn success(&self, message: &str);

    /// One line of simulator output, forwarded as it arrives
    fn output(&self, line: &str) {
        self.info(line);
    }
}

/// Colored terminal output. Debug messages go through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn info(&self, message: &str) {
        println!("{} {}", "ℹ".blue(), message);
    }

    fn error(&self, message: &str) {
        eprintln!("{} {}", "x".red(), message.red());
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "ciqx", "{message}");
    }

    fn success(&self, message: &str) {
        println!("{} {}", "✓".green(), message.green());
    }

    fn output(&self, line: &str) {
        println!("{} {}", "[SIM]".dimmed(), line.trim_end());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
    Debug,
    Success,
    Output,
}

/// Records every message in order
#[derive(Debug, Default)]
pub struct MemoryReporter {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Messages of one level, in order
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    fn push(&self, level: Level, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, message.to_string()));
        }
    }
}

impl Reporter for MemoryReporter {
    fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }

    fn debug(&self, message: &str) {
        self.push(Level::Debug, message);
    }

    fn success(&self, message: &str) {
        self.push(Level::Success, message);
    }

    fn output(&self, line: &str) {
        self.push(Level::Output, line);
    }
}
