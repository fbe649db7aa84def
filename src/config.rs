//! Project configuration (`ciqx.toml`).
//!
//! Every table and key is optional. A missing file is replaced by the
//! defaults on first load.

use crate::build::DEFAULT_DEBOUNCE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "ciqx.toml";

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CiqxConfig {
    pub sdk: SdkConfig,
    pub project: ProjectConfig,
    pub devices: DevicesConfig,
    pub signing: SigningConfig,
    pub watch: WatchConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SdkConfig {
    /// Explicit SDK root; skips discovery when it exists
    pub path: Option<PathBuf>,
    pub auto_detect: bool,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            path: None,
            auto_detect: true,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    pub manifest: String,
    pub jungle: String,
    pub src: Vec<String>,
    pub resources: Vec<String>,
    pub out_dir: String,
    pub app_type: AppType,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            manifest: "manifest.xml".into(),
            jungle: "monkey.jungle".into(),
            src: vec!["source".into()],
            resources: vec!["resources".into()],
            out_dir: "build".into(),
            app_type: AppType::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DevicesConfig {
    pub default: String,
    pub targets: Vec<String>,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            default: "fenix7".into(),
            targets: vec!["fenix7".into(), "venu2".into()],
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SigningConfig {
    pub developer_key: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            developer_key: "developer_key.der".into(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WatchConfig {
    pub debounce_ms: u64,
    /// Relaunch the simulator after every successful rebuild
    pub restart_simulator: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            restart_simulator: false,
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Connect IQ application types
#[derive(
    Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    #[default]
    Watchface,
    Datafield,
    Widget,
    App,
}

impl AppType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::Watchface => "watchface",
            AppType::Datafield => "datafield",
            AppType::Widget => "widget",
            AppType::App => "app",
        }
    }

    /// Class name of the application entry point, e.g. `WatchfaceApp`
    pub fn entry_class(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => format!("{}{}App", first.to_uppercase(), chars.as_str()),
            None => "App".to_string(),
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CiqxConfig {
    /// One `**/*.mc` glob per source directory
    pub fn source_globs(&self) -> Vec<String> {
        self.project
            .src
            .iter()
            .map(|dir| format!("{}/**/*.mc", dir.trim_end_matches('/')))
            .collect()
    }

    /// Everything under each resource directory
    pub fn resource_globs(&self) -> Vec<String> {
        self.project
            .resources
            .iter()
            .map(|dir| format!("{}/**/*", dir.trim_end_matches('/')))
            .collect()
    }

    /// Patterns that trigger a rebuild in watch mode
    pub fn watch_patterns(&self) -> Vec<String> {
        let mut patterns = self.source_globs();
        patterns.extend(self.resource_globs());
        patterns.push(self.project.manifest.clone());
        patterns.push(self.project.jungle.clone());
        patterns
    }
}

/// Loads and saves `ciqx.toml`
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
}

impl ConfigService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `ciqx.toml` inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CONFIG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config, writing the defaults first if the file is missing
    pub fn load(&self) -> Result<CiqxConfig> {
        if !self.path.exists() {
            let config = CiqxConfig::default();
            self.save(&config)?;
            return Ok(config);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        toml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse {} - check for syntax errors",
                self.path.display()
            )
        })
    }

    pub fn save(&self, config: &CiqxConfig) -> Result<()> {
        let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}
