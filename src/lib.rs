//! # ciqx - Terminal workflow for Garmin Connect IQ
//!
//! ciqx drives the Connect IQ SDK (`monkeyc` and `monkeydo`) so the
//! edit → rebuild → rerun loop happens in one terminal.
//!
//! ## Quick Start
//!
//! ```bash
//! ciqx init watchface
//! ciqx build --all
//! ciqx watch --target venu2
//! ```
//!
//! ## Module Organization
//!
//! - [`toolchain`] - SDK discovery and the compiler/simulator invocations
//! - [`build`] - Build sweeps, simulator runs and the watch loop
//! - [`config`] - Configuration parsing (`ciqx.toml`)
//! - [`commands`] - `doctor`, `init` and `devices` handlers

/// Build planner, simulator sessions and debounced watching.
pub mod build;

/// CLI command handlers outside the build engine.
pub mod commands;

/// Configuration file parsing (`ciqx.toml`).
pub mod config;

/// Device registry.
pub mod devices;

/// `tracing` subscriber setup.
pub mod logging;

/// User-facing output sink.
pub mod reporter;

/// Ctrl-C handling.
pub mod signal;

/// Project skeleton templates.
pub mod templates;

/// Connect IQ SDK discovery and invocation.
pub mod toolchain;

/// Terminal UI utilities (tables).
pub mod ui;
