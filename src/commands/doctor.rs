//! Doctor command handler
//!
//! Handles `ciqx doctor`: SDK, tools, signing key and manifest checks.

use anyhow::Result;
use std::path::Path;

use crate::config::CiqxConfig;
use crate::reporter::Reporter;
use crate::toolchain::{LocateSdk, MONKEYC, MONKEYDO, SdkLocator, executable_name};

/// Run the environment diagnostics. `Ok(false)` means a blocking problem.
pub fn run_doctor(root: &Path, config: &CiqxConfig, reporter: &dyn Reporter) -> Result<bool> {
    let locator = SdkLocator::new(config.sdk.path.clone(), config.sdk.auto_detect);
    run_doctor_with(root, config, &locator, reporter)
}

pub fn run_doctor_with(
    root: &Path,
    config: &CiqxConfig,
    locator: &dyn LocateSdk,
    reporter: &dyn Reporter,
) -> Result<bool> {
    reporter.info("Running environment diagnostics...");
    reporter.debug(&format!(
        "{} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH
    ));

    let Some(sdk) = locator.find_toolchain_root() else {
        reporter.error("Connect IQ SDK not found");
        reporter.info("Install the SDK with the SDK Manager or set [sdk] path in ciqx.toml");
        return Ok(false);
    };
    reporter.success(&format!("Connect IQ SDK found at: {}", sdk.display()));

    let mut healthy = true;
    for tool in [MONKEYC, MONKEYDO] {
        let path = sdk.join("bin").join(executable_name(tool));
        if path.exists() {
            reporter.success(&format!("{} found", tool));
        } else {
            reporter.error(&format!("{} not found at {}", tool, path.display()));
            healthy = false;
        }
    }

    let dev_key = root.join(&config.signing.developer_key);
    if dev_key.exists() {
        reporter.success("Developer key found");
    } else {
        reporter.error(&format!("Developer key not found: {}", dev_key.display()));
        reporter.info("Generate with: openssl genrsa -out developer_key.pem 4096");
        reporter.info(
            "Then convert: openssl pkcs8 -topk8 -inform PEM -outform DER -in developer_key.pem -out developer_key.der -nocrypt",
        );
    }

    let manifest = root.join(&config.project.manifest);
    if manifest.exists() {
        reporter.success("Manifest found");
    } else {
        reporter.error(&format!("Manifest not found: {}", manifest.display()));
        reporter.info("Create a project with: ciqx init");
    }

    if healthy {
        reporter.success("Environment check complete!");
    }
    Ok(healthy)
}
