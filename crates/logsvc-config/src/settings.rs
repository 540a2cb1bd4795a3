//! Process-wide settings read from the environment.
//!
//! | Variable                  | Default                      |
//! |---------------------------|------------------------------|
//! | `LOGSERVICE_ENV`          | `local`                      |
//! | `LOGSERVICE_CONFIG`       | unset                        |
//! | `LOGSERVICE_DATA_DIR`     | `~/.logservice`              |
//! | `LOGSERVICE_REDACTION`    | `<data_dir>/redaction.json`  |
//! | `LOGSERVICE_REDACT`       | `true`                       |
//! | `LOGSERVICE_MIN_INTERVAL` | `10` (seconds)               |

use crate::resolve::ENV_CONFIG_PATH;
use crate::validate::{ValidationError, ValidationResult};
use std::path::PathBuf;
use tracing::debug;

pub const ENV_ENVIRONMENT: &str = "LOGSERVICE_ENV";
pub const ENV_DATA_DIR: &str = "LOGSERVICE_DATA_DIR";
pub const ENV_REDACTION_PATH: &str = "LOGSERVICE_REDACTION";
pub const ENV_REDACT: &str = "LOGSERVICE_REDACT";
pub const ENV_MIN_INTERVAL: &str = "LOGSERVICE_MIN_INTERVAL";

pub const DEFAULT_MIN_INTERVAL_SECONDS: u64 = 10;
const REDACTION_FILENAME: &str = "redaction.json";
const DATA_DIR_NAME: &str = ".logservice";

/// Service settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Deployment label, only used in logs.
    pub env: String,

    /// Default cluster config path.
    pub config_path: Option<PathBuf>,

    /// Root for exports and the default redaction rule file.
    pub data_dir: PathBuf,

    /// Redaction rule file.
    pub redaction_path: PathBuf,

    /// Whether lines are redacted before leaving the process.
    pub redact_enabled: bool,

    /// Minimum spacing between admitted queries for one cluster.
    pub min_interval_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            env: "local".to_string(),
            config_path: None,
            redaction_path: data_dir.join(REDACTION_FILENAME),
            data_dir,
            redact_enabled: true,
            min_interval_seconds: DEFAULT_MIN_INTERVAL_SECONDS,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

fn parse_bool(field: &str, raw: &str) -> ValidationResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("Expected a boolean, got '{}'", other),
        }),
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> ValidationResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> ValidationResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(env) = get(ENV_ENVIRONMENT) {
            settings.env = env;
        }
        settings.config_path = get(ENV_CONFIG_PATH).map(PathBuf::from);

        if let Some(dir) = get(ENV_DATA_DIR) {
            settings.data_dir = PathBuf::from(dir);
        }
        settings.redaction_path = match get(ENV_REDACTION_PATH) {
            Some(path) => PathBuf::from(path),
            None => settings.data_dir.join(REDACTION_FILENAME),
        };

        if let Some(raw) = get(ENV_REDACT) {
            settings.redact_enabled = parse_bool(ENV_REDACT, &raw)?;
        }

        if let Some(raw) = get(ENV_MIN_INTERVAL) {
            let secs: u64 = raw.trim().parse().map_err(|_| ValidationError::InvalidValue {
                field: ENV_MIN_INTERVAL.to_string(),
                message: format!("Expected whole seconds, got '{}'", raw),
            })?;
            if secs == 0 {
                return Err(ValidationError::InvalidValue {
                    field: ENV_MIN_INTERVAL.to_string(),
                    message: "Must be positive, got 0".to_string(),
                });
            }
            settings.min_interval_seconds = secs;
        }

        debug!(
            env = %settings.env,
            data_dir = %settings.data_dir.display(),
            redaction_path = %settings.redaction_path.display(),
            redact = settings.redact_enabled,
            min_interval_seconds = settings.min_interval_seconds,
            "settings loaded"
        );
        Ok(settings)
    }

    /// Token refill rate for the admission limiter, in tokens per second.
    pub fn limiter_rate(&self) -> f64 {
        1.0 / self.min_interval_seconds as f64
    }

    /// Bucket capacity for the admission limiter.
    pub fn limiter_burst(&self) -> f64 {
        1.0
    }

    /// Directory receiving export files.
    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }
}
