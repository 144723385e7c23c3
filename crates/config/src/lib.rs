//! Configuration loading, env substitution and validation.
//!
//! Config files: `chatmux.toml`, `chatmux.yaml`, `chatmux.yml` or
//! `chatmux.json`, searched in `./` then the user config directory
//! (`~/.config/chatmux/` on Linux).
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in the raw
//! file before parsing.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Context, Error, Result},
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{ChatmuxConfig, MetricsConfig, NodeDefinition, NodeKind},
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_file},
};
