//! Configuration IO helpers.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dirs_next::config_dir;
use tracing::{debug, info};
use visitnote_util::expand_tilde;

use crate::config::{ConfigError, VisitnoteConfig, interpolate_config, validate_config};

/// Environment variable that overrides the configuration path.
pub const CONFIG_PATH_ENV: &str = "VISITNOTE_CONFIG_PATH";

/// Returns the default path for the configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("visitnote")
        .join("config.json")
}

/// Loads configuration from the default path.
pub fn load_config() -> Result<VisitnoteConfig, ConfigError> {
    let path = default_config_path();
    load_config_from_path(&path)
}

/// Loads, interpolates and validates configuration from a specific path.
///
/// A missing file yields the defaults. `.yaml`/`.yml` files are parsed as
/// YAML, everything else as JSON.
pub fn load_config_from_path(path: &Path) -> Result<VisitnoteConfig, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file; using defaults");
        return Ok(VisitnoteConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut config = parse_config(path, &content)?;
    interpolate_config(&mut config)?;
    validate_config(&config)?;
    info!(path = %path.display(), "loaded configuration");
    Ok(config)
}

fn parse_config(path: &Path, content: &str) -> Result<VisitnoteConfig, ConfigError> {
    let is_yaml = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("yaml") || extension.eq_ignore_ascii_case("yml"));
    let parsed = if is_yaml {
        serde_yaml::from_str(content).map_err(|error| error.to_string())
    } else {
        serde_json::from_str(content).map_err(|error| error.to_string())
    };
    parsed.map_err(|message| ConfigError::Parse {
        path: path.display().to_string(),
        message,
    })
}
