//! Configuration loading from disk.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{ProxyConfig, ServiceConf};
use crate::config::validation::{validate_config, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {0}: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("JSON parse error in {0}: {1}")]
    Json(String, #[source] serde_json::Error),
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.display().to_string(), e))
}

/// Load and validate the proxy settings from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(&read(path)?)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load the service map: name → { public path }.
pub fn load_services(path: &Path) -> Result<HashMap<String, ServiceConf>, ConfigError> {
    serde_json::from_str(&read(path)?).map_err(|e| ConfigError::Json(path.display().to_string(), e))
}

/// Load the backend map: name → [endpoint URLs].
pub fn load_backends(path: &Path) -> Result<HashMap<String, Vec<String>>, ConfigError> {
    serde_json::from_str(&read(path)?).map_err(|e| ConfigError::Json(path.display().to_string(), e))
}
