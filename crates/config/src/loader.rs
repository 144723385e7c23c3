use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{Context, Error, Result, env_subst::substitute_env, schema::ChatmuxConfig};

/// Standard config file names, checked in order.
pub const CONFIG_FILENAMES: &[&str] = &[
    "chatmux.toml",
    "chatmux.yaml",
    "chatmux.yml",
    "chatmux.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<ChatmuxConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./chatmux.{toml,yaml,yml,json}` (project-local)
/// 2. `<user config dir>/chatmux.{toml,yaml,yml,json}`
///
/// Returns `ChatmuxConfig::default()` if no file is found or it fails to
/// load.
pub fn discover_and_load() -> ChatmuxConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    ChatmuxConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    find_in(Path::new(".")).or_else(|| config_dir().and_then(|dir| find_in(&dir)))
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/chatmux/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "chatmux").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<ChatmuxConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse("toml", e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse("yaml", e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse("json", e)),
        _ => Err(Error::message(format!("unsupported config format: .{ext}"))),
    }
}
