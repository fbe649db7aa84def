//! # ciqx CLI Entry Point
//!
//! This is the main executable for the `ciqx` command-line tool.
//! It parses CLI arguments using clap and routes commands to the handlers.
//!
//! ## Command Structure
//!
//! - **Project**: `init`, `devices`, `doctor`
//! - **Build**: `build`, `run`, `watch`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::Path;
use std::sync::Arc;

use ciqx::build::{Orchestrator, WatchOptions};
use ciqx::commands;
use ciqx::config::{AppType, CiqxConfig, ConfigService};
use ciqx::devices;
use ciqx::logging;
use ciqx::reporter::{ConsoleReporter, Reporter};
use ciqx::signal::Interrupt;
use ciqx::toolchain::{Profile, ToolchainError};
use ciqx::ui;

#[cfg(windows)]
#[link(name = "kernel32")]
unsafe extern "system" {
    fn SetConsoleOutputCP(wCodePageID: u32) -> i32;
}

#[cfg(windows)]
fn enable_utf8_console() {
    unsafe {
        SetConsoleOutputCP(65001);
    }
}

#[cfg(not(windows))]
fn enable_utf8_console() {}

#[derive(Parser)]
#[command(name = "ciqx")]
#[command(about = "Build, run and watch Garmin Connect IQ projects", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Show debug diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the SDK, tools, signing key and manifest
    Doctor,
    /// Create a project skeleton in the current directory
    Init {
        /// Kind of Connect IQ app
        #[arg(value_enum, default_value_t = AppType::Watchface)]
        app_type: AppType,
    },
    /// List supported devices
    Devices,
    /// Compile the app for one or all configured targets
    Build {
        /// Device to build for [default: devices.default]
        #[arg(short, long)]
        target: Option<String>,
        /// Build profile
        #[arg(short, long, value_enum, default_value_t = Profile::Debug)]
        profile: Profile,
        /// Build every target in devices.targets
        #[arg(short, long)]
        all: bool,
    },
    /// Build, then run the app in the simulator
    Run {
        /// Device to run on [default: devices.default]
        #[arg(short, long)]
        target: Option<String>,
        /// Build profile
        #[arg(short, long, value_enum, default_value_t = Profile::Debug)]
        profile: Profile,
    },
    /// Rebuild on source changes and keep the simulator running
    Watch {
        /// Device to run on [default: devices.default]
        #[arg(short, long)]
        target: Option<String>,
        /// Build profile
        #[arg(short, long, value_enum, default_value_t = Profile::Debug)]
        profile: Profile,
        /// Replace a running simulator after each successful rebuild
        #[arg(long)]
        restart: bool,
    },
    /// Print the ciqx version
    Version,
}

fn main() -> Result<()> {
    enable_utf8_console();

    let cli = Cli::parse();
    logging::init_logging(cli.verbose)?;

    match dispatch(cli.command) {
        Ok(()) => Ok(()),
        // Toolchain failures were already reported by the component that hit them.
        Err(e) if e.downcast_ref::<ToolchainError>().is_some() => {
            tracing::debug!(error = %e, "exiting after toolchain error");
            std::process::exit(1);
        }
        Err(e) => Err(e),
    }
}

fn dispatch(command: Option<Commands>) -> Result<()> {
    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter);
    let cwd = std::env::current_dir().context("Failed to read current directory")?;

    match command {
        Some(Commands::Doctor) => {
            let config = ConfigService::in_dir(&cwd).load()?;
            if !commands::doctor::run_doctor(&cwd, &config, reporter.as_ref())? {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Commands::Init { app_type }) => {
            commands::init::run_init(&cwd, app_type, reporter.as_ref())
        }
        Some(Commands::Devices) => {
            commands::devices::list_devices();
            Ok(())
        }
        Some(Commands::Build {
            target,
            profile,
            all,
        }) => {
            let (config, orchestrator) = load_project(&cwd, Arc::clone(&reporter))?;
            let ok = if all {
                orchestrator
                    .build_all(&config.devices.targets, profile)?
                    .succeeded()
            } else {
                let target = resolve_target(target, &config, reporter.as_ref());
                orchestrator.build(&target, profile)?
            };
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Commands::Run { target, profile }) => {
            let (config, orchestrator) = load_project(&cwd, Arc::clone(&reporter))?;
            let interrupt = Interrupt::install().context("Failed to install Ctrl-C handler")?;
            let target = resolve_target(target, &config, reporter.as_ref());
            orchestrator.run(&target, profile, &interrupt)
        }
        Some(Commands::Watch {
            target,
            profile,
            restart,
        }) => {
            let (config, orchestrator) = load_project(&cwd, Arc::clone(&reporter))?;
            let interrupt = Interrupt::install().context("Failed to install Ctrl-C handler")?;
            let mut options = WatchOptions::from_config(&config);
            options.restart_simulator |= restart;
            let target = resolve_target(target, &config, reporter.as_ref());
            orchestrator.watch(&target, profile, &options, &interrupt)
        }
        Some(Commands::Version) => {
            println!("ciqx {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => {
            print_splash();
            Ok(())
        }
    }
}

fn load_project(root: &Path, reporter: Arc<dyn Reporter>) -> Result<(CiqxConfig, Orchestrator)> {
    let config = ConfigService::in_dir(root).load()?;
    let orchestrator = Orchestrator::from_config(root, &config, reporter);
    Ok((config, orchestrator))
}

/// `--target`, or the configured default device
fn resolve_target(target: Option<String>, config: &CiqxConfig, reporter: &dyn Reporter) -> String {
    let target = target.unwrap_or_else(|| config.devices.default.clone());
    if devices::find(&target).is_none() {
        reporter.debug(&format!(
            "{} is not in the built-in device list, passing it through",
            target
        ));
    }
    target
}

fn print_splash() {
    println!();
    println!("   {}", "ciqx".cyan().bold());
    println!(
        "   {}",
        "Terminal workflow for Garmin Connect IQ".dimmed().italic()
    );
    println!("   {}", format!("v{}", env!("CARGO_PKG_VERSION")).green());
    println!();

    let mut table = ui::Table::new("Commands", &["Command", "Description"]);
    for (cmd, desc) in [
        ("ciqx init [type]", "Create a project skeleton"),
        ("ciqx doctor", "Check the SDK and project"),
        ("ciqx devices", "List supported devices"),
        ("ciqx build [-t dev] [--all]", "Compile the app"),
        ("ciqx run [-t dev]", "Build and run in the simulator"),
        ("ciqx watch [-t dev]", "Rebuild on changes"),
    ] {
        table.add_row(vec![cmd.yellow().to_string(), desc.to_string()]);
    }
    table.print();
    println!();
    println!("   Run {} for details.", "ciqx --help".cyan());
}
