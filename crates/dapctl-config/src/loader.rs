//! Configuration file loading

use crate::constants::{DEFAULT_CONFIG_FILENAME, ENV_DAPCTL_CONFIG};
use crate::Config;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Resolve which config file to use.
///
/// Order: explicit path, `$DAPCTL_CONFIG`, `dapctl.toml` in the current
/// directory. Returns `None` when nothing exists so callers can fall back to
/// defaults.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        return Ok(Some(path.to_path_buf()));
    }
    if let Ok(env_path) = std::env::var(ENV_DAPCTL_CONFIG) {
        if !env_path.is_empty() {
            let path = PathBuf::from(env_path);
            if !path.exists() {
                return Err(ConfigError::NotFound(path));
            }
            return Ok(Some(path));
        }
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILENAME);
    Ok(local.exists().then_some(local))
}

/// Load configuration from a TOML file
///
/// # Example
///
/// ```rust,ignore
/// use dapctl_config::load_config;
/// use std::path::Path;
///
/// let config = load_config(Path::new("dapctl.toml"))?;
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "Loading config");
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parse configuration from a TOML string
pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate().map_err(ConfigError::ValidationError)?;
    Ok(config)
}
