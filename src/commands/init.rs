//! Init command handler
//!
//! Handles `ciqx init <app_type>`: project directories, manifest, strings
//! resource and a default `ciqx.toml`.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::config::{AppType, CiqxConfig, ConfigService};
use crate::reporter::Reporter;
use crate::templates;

pub fn run_init(root: &Path, app_type: AppType, reporter: &dyn Reporter) -> Result<()> {
    reporter.info(&format!("Initializing {} project...", app_type));

    for dir in [
        "source",
        "resources",
        "resources/drawables",
        "resources/strings",
    ] {
        fs::create_dir_all(root.join(dir))
            .with_context(|| format!("Failed to create {}/", dir))?;
    }

    let manifest = root.join("manifest.xml");
    if manifest.exists() {
        reporter.info("manifest.xml already exists, leaving it untouched");
    } else {
        let app_id = uuid::Uuid::new_v4().to_string();
        fs::write(
            &manifest,
            templates::manifest(app_type, &app_id, templates::DEFAULT_PRODUCTS),
        )
        .context("Failed to write manifest.xml")?;
    }

    let strings = root.join("resources").join("strings").join("strings.xml");
    if !strings.exists() {
        let app_name = root
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .unwrap_or_else(|| "ConnectIQ App".to_string());
        fs::write(&strings, templates::strings(&app_name))
            .context("Failed to write strings.xml")?;
    }

    let mut config = CiqxConfig::default();
    config.project.app_type = app_type;
    ConfigService::in_dir(root).save(&config)?;

    reporter.success(&format!("{} project initialized!", app_type));
    Ok(())
}
