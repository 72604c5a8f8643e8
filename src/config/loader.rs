//! Configuration loading from disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config from JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse config from TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to render sample config: {0}")]
    Render(String),

    #[error("no config found; a sample was written to {}. Add your SDK key to it and run again", .0.display())]
    SampleWritten(PathBuf),

    #[error("required key SDK_KEY missing value")]
    MissingSdkKey,

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "toml")
}

/// Parse config text; TOML when the path ends in `.toml`, JSON otherwise.
pub fn parse_config(path: &Path, content: &str) -> Result<ProxyConfig, ConfigError> {
    if is_toml(path) {
        Ok(toml::from_str(content)?)
    } else {
        Ok(serde_json::from_str(content)?)
    }
}

/// Apply defaults and run semantic validation.
pub fn finalize(mut config: ProxyConfig) -> Result<ProxyConfig, ConfigError> {
    config.apply_defaults();
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load, default and validate configuration from a file.
///
/// A missing file is replaced by a sample config and reported as
/// [`ConfigError::SampleWritten`] so the operator can fill in the SDK key.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Config file not found, writing a sample configuration");
            write_sample_config(path)?;
            return Err(ConfigError::SampleWritten(path.to_path_buf()));
        }
        Err(e) => return Err(ConfigError::Io(e)),
    };

    tracing::info!(path = %path.display(), "Loading configuration from file");
    finalize(parse_config(path, &content)?)
}

/// Write [`ProxyConfig::sample`] to `path` in the format implied by its extension.
pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    let sample = ProxyConfig::sample();
    let rendered = if is_toml(path) {
        toml::to_string_pretty(&sample).map_err(|e| ConfigError::Render(e.to_string()))?
    } else {
        serde_json::to_string_pretty(&sample)?
    };
    fs::write(path, rendered)?;
    Ok(())
}
