use std::path::Path;

use {
    anyhow::Result,
    chatmux_config::{Severity, ValidationResult, validate},
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Validate the config file and print diagnostics. Returns whether the
/// config is free of errors.
pub fn check(path: Option<&Path>, verbose: bool) -> Result<bool> {
    let result = match path.map(Path::to_path_buf).or_else(chatmux_config::find_config_file) {
        Some(path) => {
            eprintln!("Checking {}\n", path.display());
            validate::validate_file(&path)
        },
        None => {
            eprintln!("No config file found; checking defaults.\n");
            ValidationResult {
                diagnostics: validate(&Default::default()),
                config_path: None,
            }
        },
    };

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
            Severity::Info => CYAN,
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{}{RESET} {}", d.severity, d.message);
        } else {
            eprintln!(
                "  {BOLD}{color}{}{RESET} {}: {}",
                d.severity, d.path, d.message
            );
        }
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    Ok(errors == 0)
}
