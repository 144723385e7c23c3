//! Configuration validation.
//!
//! Checks a loaded config for problems serde cannot catch: missing tokens,
//! duplicate node ids and settings that parse but will not behave as the
//! author probably intended.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use secrecy::ExposeSecret;

use crate::{
    Error,
    loader::load_config,
    schema::{ChatmuxConfig, NodeDefinition, NodeKind},
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "credential", "duplicate-id", "settings", "channel"
    pub category: &'static str,
    /// Dotted path, e.g. "node.announce.api_token"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.severity, self.category, self.path, self.message
        )
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Load `path` and validate it. Load failures become a single `syntax`
/// error diagnostic.
pub fn validate_file(path: &Path) -> ValidationResult {
    let diagnostics = match load_config(path) {
        Ok(config) => validate(&config),
        Err(e) => {
            let category = if matches!(e, Error::Parse { .. }) {
                "syntax"
            } else {
                "io"
            };
            vec![Diagnostic::new(
                Severity::Error,
                category,
                path.display().to_string(),
                e.to_string(),
            )]
        },
    };
    ValidationResult {
        diagnostics,
        config_path: Some(path.to_path_buf()),
    }
}

/// Validate an already-parsed config. Diagnostics are sorted by severity.
pub fn validate(config: &ChatmuxConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut seen = HashSet::new();

    for node in &config.nodes {
        let base = format!("node.{}", node.id);
        if node.id.trim().is_empty() {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "settings",
                "node",
                format!("{} node has an empty id", node.kind),
            ));
        } else if !seen.insert(node.id.as_str()) {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "duplicate-id",
                &base,
                format!("node id '{}' is used more than once", node.id),
            ));
        }

        match node.kind {
            NodeKind::Speaker => check_speaker(node, &base, &mut diagnostics),
            NodeKind::Auditor => check_auditor(node, &base, &mut diagnostics),
        }
    }

    diagnostics.sort_by_key(|d| d.severity);
    diagnostics
}

fn check_token(token: &str, base: &str, diagnostics: &mut Vec<Diagnostic>) {
    if token.trim().is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "credential",
            format!("{base}.api_token"),
            "api token is empty; the node cannot connect",
        ));
    } else if token.contains("${") {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "credential",
            format!("{base}.api_token"),
            "api token contains an unresolved ${...} placeholder",
        ));
    }
}

fn check_speaker(node: &NodeDefinition, base: &str, diagnostics: &mut Vec<Diagnostic>) {
    let config = match node.outbound_config() {
        Ok(config) => config,
        Err(e) => {
            diagnostics.push(Diagnostic::new(Severity::Error, "settings", base, e.to_string()));
            return;
        },
    };
    check_token(config.api_token.expose_secret(), base, diagnostics);
    if config.default_channel().is_none() {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "channel",
            format!("{base}.channel"),
            "no default channel; every input must carry a channel",
        ));
    }
}

fn check_auditor(node: &NodeDefinition, base: &str, diagnostics: &mut Vec<Diagnostic>) {
    let config = match node.inbound_config() {
        Ok(config) => config,
        Err(e) => {
            diagnostics.push(Diagnostic::new(Severity::Error, "settings", base, e.to_string()));
            return;
        },
    };
    check_token(config.api_token.expose_secret(), base, diagnostics);

    let blank_entries = config
        .channels
        .split(',')
        .filter(|s| s.trim().trim_start_matches('#').trim().is_empty())
        .count();
    if !config.channels.trim().is_empty() && blank_entries > 0 {
        let noun = if blank_entries == 1 { "entry" } else { "entries" };
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "channel",
            format!("{base}.channels"),
            format!("{blank_entries} blank watch-list {noun} ignored"),
        ));
    }
    if !config.channels.trim().is_empty() && config.watch_list().is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "channel",
            format!("{base}.channels"),
            "watch list has no usable names; every channel will be watched",
        ));
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn parse(json: &str) -> ChatmuxConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn clean_config_has_no_errors() {
        let cfg = parse(
            r#"{"nodes":[
                {"id":"s","kind":"speaker","api_token":"xoxb-1","channel":"general"},
                {"id":"a","kind":"auditor","api_token":"xoxb-1","channels":"eng,ops"}
            ]}"#,
        );
        assert!(validate(&cfg).is_empty());
    }

    #[test]
    fn empty_token_is_error() {
        let cfg = parse(r#"{"nodes":[{"id":"a","kind":"auditor","api_token":"  "}]}"#);
        let diags = validate(&cfg);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].category, "credential");
        assert_eq!(diags[0].path, "node.a.api_token");
    }

    #[test]
    fn duplicate_ids_are_errors() {
        let cfg = parse(
            r#"{"nodes":[
                {"id":"x","kind":"auditor","api_token":"t"},
                {"id":"x","kind":"auditor","api_token":"t"}
            ]}"#,
        );
        let diags = validate(&cfg);
        assert!(diags.iter().any(|d| d.category == "duplicate-id"));
    }

    #[test]
    fn speaker_without_channel_is_info() {
        let cfg = parse(r#"{"nodes":[{"id":"s","kind":"speaker","api_token":"t"}]}"#);
        let diags = validate(&cfg);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Info);
    }

    #[test]
    fn blank_watch_list_entries_warn() {
        let cfg = parse(r#"{"nodes":[{"id":"a","kind":"auditor","api_token":"t","channels":"eng,,"}]}"#);
        let diags = validate(&cfg);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Warning);
        assert!(diags[0].message.starts_with("2 blank"));

        let cfg = parse(r#"{"nodes":[{"id":"a","kind":"auditor","api_token":"t","channels":" , #"}]}"#);
        assert!(
            validate(&cfg)
                .iter()
                .any(|d| d.message.contains("every channel will be watched"))
        );
    }

    #[test]
    fn unresolved_placeholder_warns() {
        let cfg = parse(r#"{"nodes":[{"id":"a","kind":"auditor","api_token":"${NOPE}"}]}"#);
        let diags = validate(&cfg);
        assert_eq!(diags[0].severity, Severity::Warning);
    }

    #[test]
    fn errors_sort_first() {
        let cfg = parse(
            r#"{"nodes":[
                {"id":"s","kind":"speaker","api_token":"t"},
                {"id":"a","kind":"auditor","api_token":""}
            ]}"#,
        );
        let diags = validate(&cfg);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags.last().unwrap().severity, Severity::Info);
    }

    #[test]
    fn file_syntax_error_becomes_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatmux.json");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"{ not json")
            .unwrap();
        let result = validate_file(&path);
        assert!(result.has_errors());
        assert_eq!(result.count(Severity::Error), 1);
        assert_eq!(result.diagnostics[0].category, "syntax");
    }
}
