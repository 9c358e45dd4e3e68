// Configuration loader
// Loads ~/.bugrefine/config.toml (or an explicit path) and applies the
// ANTHROPIC_API_KEY environment variable on top.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::constants::CONFIG_RELATIVE_PATH;
use super::settings::Config;

const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Load configuration.
///
/// An explicit `path` must exist. Without one, the default location is used
/// if present, and built-in defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => load_from_file(p)?,
        None => match default_config_path() {
            Some(p) if p.exists() => load_from_file(&p)?,
            _ => Config::default(),
        },
    };

    apply_env_overrides(&mut config, std::env::var(API_KEY_ENV).ok());

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

/// Parse a config file without env overrides or validation
pub fn load_from_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents)?;
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_RELATIVE_PATH))
}

fn apply_env_overrides(config: &mut Config, api_key: Option<String>) {
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        config.critic.api_key = Some(key);
    }
}
