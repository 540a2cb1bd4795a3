//! Error types for the redaction rules.

use thiserror::Error;

/// Result type for redaction operations.
pub type Result<T> = std::result::Result<T, RedactionError>;

/// Errors that can occur while loading redaction rules.
///
/// Applying rules never fails; only loading does.
#[derive(Error, Debug)]
pub enum RedactionError {
    /// A rule pattern did not compile.
    #[error("pattern error in rule {index}: {message}")]
    PatternError { index: usize, message: String },

    /// The rule file parsed but contained no usable rule.
    #[error("rule file contains no valid patterns")]
    NoValidRules,

    /// I/O error reading the rule file.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}
