use colored::*;
use regex::Regex;
use std::sync::LazyLock;

// monkeyc: "ERROR: fenix7: source/App.mc:12,4: Undefined symbol ':foo' detected."
static LOCATED_ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ERROR:\s*(?:[\w-]+:\s*)?(?P<file>[^:]+\.mc):(?P<line>\d+)(?:,\d+)?:\s*(?P<msg>.+)$")
        .expect("valid regex")
});

pub struct FeedbackAnalyzer;

impl FeedbackAnalyzer {
    /// One-line summary of a compiler diagnostic
    pub fn summary(diagnostic: &str) -> String {
        let lines = || diagnostic.lines().map(str::trim).filter(|l| !l.is_empty());

        if let Some(line) = lines().find(|l| l.starts_with("ERROR")) {
            if let Some(caps) = LOCATED_ERROR_RE.captures(line) {
                return format!("{}:{}: {}", &caps["file"], &caps["line"], &caps["msg"]);
            }
            return line.to_string();
        }

        lines()
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| "compiler exited with an error and no output".to_string())
    }

    /// A hint for well-known failure shapes
    pub fn analyze(output: &str) -> Option<String> {
        // 1. Unknown or unsupported device
        if output.contains("Invalid device id") || output.contains("is not a valid device") {
            return Some(format!(
                "The target is not a known {}.\nCheck the products listed in {} or run {}.",
                "device id".bold().yellow(),
                "manifest.xml".bold().yellow(),
                "ciqx devices".bold().green()
            ));
        }

        // 2. Signing key
        if output.contains("private key") || output.contains("developer key") {
            return Some(format!(
                "The {} could not be loaded.\nGenerate one with:\n  {}\n  {}",
                "developer key".bold().red(),
                "openssl genrsa -out developer_key.pem 4096".green(),
                "openssl pkcs8 -topk8 -inform PEM -outform DER -in developer_key.pem -out developer_key.der -nocrypt"
                    .green()
            ));
        }

        // 3. Missing symbol
        if output.contains("Undefined symbol") || output.contains("Cannot find symbol") {
            return Some(format!(
                "It looks like an {} error.\nCheck your {} statements and the API level of the target.",
                "Undefined Symbol".bold().red(),
                "using Toybox.*".bold().yellow()
            ));
        }

        None
    }
}
