use std::net::SocketAddr;

use crate::config::models::{BackendsConfig, ServerConfig};
use crate::core::backend::BackendUrl;

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Server configuration validator
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Validate the entire server configuration.
    ///
    /// An empty backend list is not an error here: the forwarder answers every
    /// request with a 502 in that case, and the binary warns about it at start-up.
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        for (field, value) in [
            ("mount_path", &config.mount_path),
            ("upstream_prefix", &config.upstream_prefix),
        ] {
            if let Err(e) = Self::validate_path_prefix(field, value) {
                errors.push(e);
            }
        }

        if config.path_param.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "path_param".to_string(),
            });
        }

        if config.max_body_bytes == 0 {
            errors.push(ValidationError::InvalidField {
                field: "max_body_bytes".to_string(),
                message: "Must be greater than zero".to_string(),
            });
        }

        if config.connect_timeout_secs == Some(0) {
            errors.push(ValidationError::InvalidField {
                field: "connect_timeout_secs".to_string(),
                message: "Must be greater than zero when set".to_string(),
            });
        }

        if let Err(mut backend_errors) = Self::validate_backends(&config.backends) {
            errors.append(&mut backend_errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_path_prefix(field: &str, value: &str) -> ValidationResult<()> {
        if !value.starts_with('/') {
            return Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: format!("Must start with '/', got '{value}'"),
            });
        }
        if value.contains('?') || value.contains('#') {
            return Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: "Must not contain a query or fragment".to_string(),
            });
        }
        Ok(())
    }

    fn validate_backends(backends: &BackendsConfig) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<_> = backends
            .ordered()
            .filter_map(|(slot, origin)| {
                BackendUrl::new(origin)
                    .err()
                    .map(|e| ValidationError::InvalidField {
                        field: format!("backends.{slot}"),
                        message: e.to_string(),
                    })
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        errors
            .iter()
            .map(|e| format!("  • {e}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
