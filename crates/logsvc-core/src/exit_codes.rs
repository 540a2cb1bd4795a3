//! Exit codes for the `logsvc` CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0: Success
//! - 10-19: User/request errors (recoverable by changing the request or waiting)
//! - 20-29: Environment errors (backend, filesystem)
//! - 30+: Internal errors (bugs, should be reported)

use logsvc_common::{Error, ErrorCategory};

/// Exit codes for `logsvc` operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Clean = 0,

    // ========================================================================
    // User / Request Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Request or cluster config failed validation
    ValidationError = 11,

    /// Rejected by admission control; retry later
    RateLimited = 12,

    // ========================================================================
    // Environment Errors (20-29)
    // ========================================================================
    /// Log backend unreachable or returned an error
    UpstreamError = 20,

    /// I/O error
    IoError = 21,

    // ========================================================================
    // Internal Errors (30+)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 30,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Check if this exit code is a user/request error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ValidationError => "ERR_VALIDATION",
            ExitCode::RateLimited => "ERR_RATE_LIMITED",
            ExitCode::UpstreamError => "ERR_UPSTREAM",
            ExitCode::IoError => "ERR_IO",
            ExitCode::InternalError => "ERR_INTERNAL",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err.category() {
            ErrorCategory::Validation => ExitCode::ValidationError,
            ErrorCategory::Admission => ExitCode::RateLimited,
            ErrorCategory::Upstream => ExitCode::UpstreamError,
            ErrorCategory::Io => match err {
                // malformed JSON input is a caller mistake, not an I/O failure
                Error::Json(_) => ExitCode::ArgsError,
                _ => ExitCode::IoError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_are_stable() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(ExitCode::ArgsError.as_i32(), 10);
        assert_eq!(ExitCode::ValidationError.as_i32(), 11);
        assert_eq!(ExitCode::RateLimited.as_i32(), 12);
        assert_eq!(ExitCode::UpstreamError.as_i32(), 20);
        assert_eq!(ExitCode::IoError.as_i32(), 21);
        assert_eq!(ExitCode::InternalError.as_i32(), 30);
    }

    #[test]
    fn test_from_error() {
        let cases = [
            (Error::InvalidRequest("x".into()), ExitCode::ValidationError),
            (
                Error::ConfigNotFound { path: "/x".into() },
                ExitCode::ValidationError,
            ),
            (
                Error::RateLimited {
                    key: "c".into(),
                    retry_after_secs: 1.0,
                },
                ExitCode::RateLimited,
            ),
            (
                Error::UpstreamStatus {
                    status: 503,
                    body: String::new(),
                },
                ExitCode::UpstreamError,
            ),
            (Error::Export("disk full".into()), ExitCode::IoError),
        ];
        for (err, expected) in cases {
            assert_eq!(ExitCode::from(&err), expected, "{}", err);
        }

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(ExitCode::from(&Error::from(json_err)), ExitCode::ArgsError);
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::RateLimited.to_string(), "ERR_RATE_LIMITED (12)");
        assert!(ExitCode::ValidationError.is_user_error());
        assert!(!ExitCode::IoError.is_user_error());
        assert!(ExitCode::Clean.is_success());
    }
}
