//! Configuration validation errors and semantic validation.

use crate::cluster::ClusterConfig;
use std::path::PathBuf;
use thiserror::Error;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Config not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::NotFound(_) => 62,
            ValidationError::MissingField(_) => 63,
            ValidationError::InvalidValue { .. } => 64,
        }
    }
}

impl From<ValidationError> for logsvc_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::NotFound(path) => logsvc_common::Error::ConfigNotFound {
                path: path.display().to_string(),
            },
            other => logsvc_common::Error::InvalidConfig(other.to_string()),
        }
    }
}

/// Validate a cluster configuration semantically.
///
/// Components are not checked here: a request may name its own, and the
/// fallback to the configured list is decided per request.
pub fn validate_cluster_config(config: &ClusterConfig) -> ValidationResult<()> {
    let base_url = config.loki.base_url.trim();
    if base_url.is_empty() {
        return Err(ValidationError::MissingField("loki.base_url".to_string()));
    }
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ValidationError::InvalidValue {
            field: "loki.base_url".to_string(),
            message: format!("Must be an http(s) URL, got '{}'", base_url),
        });
    }

    if config.labels.cluster.trim().is_empty() {
        return Err(ValidationError::MissingField("labels.cluster".to_string()));
    }
    if config.labels.component.trim().is_empty() {
        return Err(ValidationError::MissingField("labels.component".to_string()));
    }

    if config.loki.timeout_seconds == 0 {
        return Err(ValidationError::InvalidValue {
            field: "loki.timeout_seconds".to_string(),
            message: "Must be positive, got 0".to_string(),
        });
    }

    if let Some(auth) = &config.loki.auth {
        if auth.kind != "token" && auth.kind != "none" {
            return Err(ValidationError::InvalidValue {
                field: "loki.auth.type".to_string(),
                message: format!("Expected 'token' or 'none', got '{}'", auth.kind),
            });
        }
        let has_token = auth.token.as_deref().is_some_and(|t| !t.trim().is_empty());
        if auth.kind == "token" && !has_token {
            return Err(ValidationError::MissingField("loki.auth.token".to_string()));
        }
    }

    Ok(())
}
