//! Configuration loading and schema.
//!
//! Config file: `openclaw.toml`, searched in `./` then `~/.config/openclaw/`.
//! Missing files yield the built-in defaults.

pub mod loader;
pub mod schema;

pub use {
    loader::{config_path, load, load_from, ConfigError},
    schema::{AgentConfig, CronConfig, OpenclawConfig},
};
