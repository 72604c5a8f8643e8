//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate transport settings (ports, socket path, permission bits)
//! - Validate upstream endpoint URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs after defaults are applied, before any instance starts

use thiserror::Error;
use url::Url;

use crate::config::schema::{ProxyConfig, ProxyInstance};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no proxy instances configured")]
    NoInstances,

    #[error("instance {index}: sdkKey is required")]
    MissingSdkKey { index: usize },

    #[error("instance {index}: httpPort must be set when HTTP is enabled")]
    MissingHttpPort { index: usize },

    #[error("instance {index}: unixSocketPath must be set when the Unix socket is enabled")]
    MissingSocketPath { index: usize },

    #[error("instance {index}: invalid unixSocketPermissions '{value}'")]
    InvalidPermissions { index: usize, value: String },

    #[error("instance {index}: invalid {field} '{value}'")]
    InvalidUrl {
        index: usize,
        field: &'static str,
        value: String,
    },
}

/// Parse an octal permission string such as "0755" into file mode bits.
pub fn parse_permissions(value: &str) -> Option<u32> {
    u32::from_str_radix(value, 8).ok().filter(|mode| *mode <= 0o7777)
}

/// Validate a fully defaulted configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.instances.is_empty() {
        errors.push(ValidationError::NoInstances);
    }

    for (index, instance) in config.instances.iter().enumerate() {
        validate_instance(index, instance, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_instance(index: usize, instance: &ProxyInstance, errors: &mut Vec<ValidationError>) {
    if instance.sdk_key.is_empty() {
        errors.push(ValidationError::MissingSdkKey { index });
    }

    if instance.http_enabled && instance.http_port == 0 {
        errors.push(ValidationError::MissingHttpPort { index });
    }

    if instance.unix_socket_enabled {
        if instance.unix_socket_path.is_empty() {
            errors.push(ValidationError::MissingSocketPath { index });
        }
        if parse_permissions(&instance.unix_socket_permissions).is_none() {
            errors.push(ValidationError::InvalidPermissions {
                index,
                value: instance.unix_socket_permissions.clone(),
            });
        }
    }

    let sdk = &instance.sdk_config;
    for (field, value) in [
        ("configCDNURI", &sdk.config_cdn_uri),
        ("eventsAPIURI", &sdk.events_api_uri),
        ("bucketingAPIURI", &sdk.bucketing_api_uri),
    ] {
        if Url::parse(value).is_err() {
            errors.push(ValidationError::InvalidUrl {
                index,
                field,
                value: value.clone(),
            });
        }
    }
}
