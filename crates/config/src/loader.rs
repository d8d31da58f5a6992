//! Config discovery and parsing.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::schema::OpenclawConfig;

const CONFIG_FILE: &str = "openclaw.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// The config path that would be loaded: `./openclaw.toml` if present,
/// otherwise `~/.config/openclaw/openclaw.toml` (whether or not it exists).
pub fn config_path() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE);
    if local.is_file() {
        return local;
    }
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("openclaw")
        .join(CONFIG_FILE)
}

/// Load config from the discovered path; a missing file yields defaults.
pub fn load() -> Result<OpenclawConfig, ConfigError> {
    load_from(&config_path())
}

/// Load config from an explicit path; a missing file yields defaults.
pub fn load_from(path: &Path) -> Result<OpenclawConfig, ConfigError> {
    if !path.is_file() {
        return Ok(OpenclawConfig::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
