//! Error types for the log retrieval service.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for callers deciding whether to retry
//! - HTTP status mapping for the serve surface
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Rate Limited
//!   Reason: rate limited for key 'us-east-1-f02': retry after 9.2s
//!   Fix: Wait for the Retry-After delay before issuing another query for this cluster.
//! ```
//!
//! # Agent-Facing Output
//!
//! ```json
//! {
//!   "code": 20,
//!   "category": "admission",
//!   "message": "rate limited for key 'us-east-1-f02': retry after 9.2s",
//!   "recoverable": true,
//!   "context": { "key": "us-east-1-f02", "retry_after_seconds": 10 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed requests and invalid cluster configuration.
    Validation,
    /// Requests gated by the admission controller.
    Admission,
    /// Failures talking to the log backend.
    Upstream,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Admission => write!(f, "admission"),
            ErrorCategory::Upstream => write!(f, "upstream"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for the service.
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors (10-19)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid cluster config: {0}")]
    InvalidConfig(String),

    #[error("cluster config not found: {path}")]
    ConfigNotFound { path: String },

    // Admission errors (20-29)
    #[error("rate limited for key '{key}': retry after {retry_after_secs:.1}s")]
    RateLimited { key: String, retry_after_secs: f64 },

    // Upstream errors (30-39)
    #[error("log backend unavailable: {0}")]
    Upstream(String),

    #[error("log backend returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("malformed log backend payload: {0}")]
    UpstreamPayload(String),

    // I/O errors (40-49)
    #[error("export failed: {0}")]
    Export(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// - 10-19: Validation errors
    /// - 20-29: Admission errors
    /// - 30-39: Upstream errors
    /// - 40-49: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidRequest(_) => 10,
            Error::InvalidConfig(_) => 11,
            Error::ConfigNotFound { .. } => 12,
            Error::RateLimited { .. } => 20,
            Error::Upstream(_) => 30,
            Error::UpstreamStatus { .. } => 31,
            Error::UpstreamPayload(_) => 32,
            Error::Export(_) => 40,
            Error::Io(_) => 41,
            Error::Json(_) => 42,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidRequest(_) | Error::InvalidConfig(_) | Error::ConfigNotFound { .. } => {
                ErrorCategory::Validation
            }
            Error::RateLimited { .. } => ErrorCategory::Admission,
            Error::Upstream(_) | Error::UpstreamStatus { .. } | Error::UpstreamPayload(_) => {
                ErrorCategory::Upstream
            }
            Error::Export(_) | Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether retrying the same request later may succeed.
    ///
    /// Validation errors need a changed request; everything else is transient.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::InvalidRequest(_) | Error::InvalidConfig(_) | Error::ConfigNotFound { .. } => {
                false
            }
            Error::RateLimited { .. } => true,
            Error::Upstream(_) => true,
            // 4xx from the backend means our query is wrong, not that it is down
            Error::UpstreamStatus { status, .. } => *status >= 500,
            Error::UpstreamPayload(_) => false,
            Error::Export(_) | Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// HTTP status used when this error is returned from the serve surface.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidRequest(_) | Error::InvalidConfig(_) => 400,
            Error::ConfigNotFound { .. } => 404,
            Error::RateLimited { .. } => 429,
            Error::Upstream(_) | Error::UpstreamStatus { .. } | Error::UpstreamPayload(_) => 502,
            Error::Json(_) => 400,
            Error::Export(_) | Error::Io(_) => 500,
        }
    }

    /// Whole seconds to advertise in a `Retry-After` header.
    ///
    /// Always rounds up past the computed delay so a client that honours the
    /// header is admitted on its next attempt.
    pub fn retry_after_header(&self) -> Option<u64> {
        match self {
            Error::RateLimited {
                retry_after_secs, ..
            } => Some(retry_after_secs.max(0.0).floor() as u64 + 1),
            _ => None,
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) => "Invalid Request",
            Error::InvalidConfig(_) => "Invalid Cluster Configuration",
            Error::ConfigNotFound { .. } => "Cluster Configuration Not Found",
            Error::RateLimited { .. } => "Rate Limited",
            Error::Upstream(_) => "Log Backend Unavailable",
            Error::UpstreamStatus { .. } => "Log Backend Error",
            Error::UpstreamPayload(_) => "Malformed Log Backend Response",
            Error::Export(_) => "Export Failed",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) => {
                "Check max_lines (1-100), window_seconds (10-3600) and that the time range end is not before its start."
            }
            Error::InvalidConfig(_) => {
                "Run 'logsvc check --cluster-config <file>' and set loki.base_url, labels.cluster and labels.component."
            }
            Error::ConfigNotFound { .. } => {
                "Pass --cluster-config, set LOGSERVICE_CONFIG, or place cluster.json in ~/.config/logservice/."
            }
            Error::RateLimited { .. } => {
                "Wait for the Retry-After delay before issuing another query for this cluster."
            }
            Error::Upstream(_) => "Check network reachability of the log backend and retry.",
            Error::UpstreamStatus { .. } => {
                "Check tenant and auth headers in the cluster config; 5xx responses are usually transient."
            }
            Error::UpstreamPayload(_) => {
                "The backend did not answer with a query_range payload. Check loki.base_url points at the query frontend."
            }
            Error::Export(_) | Error::Io(_) => {
                "Check disk space and permissions on the data directory (LOGSERVICE_DATA_DIR)."
            }
            Error::Json(_) => "Invalid JSON input. Check syntax with 'jq .' before retrying.",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Additional structured context (e.g., key, retry delay).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::RateLimited { key, .. } => {
                context.insert("key".to_string(), serde_json::json!(key));
                if let Some(secs) = err.retry_after_header() {
                    context.insert("retry_after_seconds".to_string(), serde_json::json!(secs));
                }
            }
            Error::UpstreamStatus { status, .. } => {
                context.insert("upstream_status".to_string(), serde_json::json!(status));
            }
            Error::ConfigNotFound { path } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

    /// Serialize to pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
