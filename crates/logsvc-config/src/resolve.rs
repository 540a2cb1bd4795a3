//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI arguments → environment variables → XDG paths → /etc.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a configuration file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument or request field.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/logservice/.
    SystemConfig,

    /// Nothing found.
    #[default]
    Unresolved,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::Unresolved => write!(f, "unresolved"),
        }
    }
}

/// A resolved cluster config location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Environment variable names.
pub const ENV_CONFIG_PATH: &str = "LOGSERVICE_CONFIG";
pub const ENV_CONFIG_DIR: &str = "LOGSERVICE_CONFIG_DIR";

/// Standard config file name.
pub const CLUSTER_FILENAME: &str = "cluster.json";

/// Application name for XDG directories.
const APP_NAME: &str = "logservice";

/// Resolve the cluster config path.
///
/// Resolution order:
/// 1. Explicit CLI (or request) path
/// 2. LOGSERVICE_CONFIG environment variable
/// 3. LOGSERVICE_CONFIG_DIR environment variable + cluster.json
/// 4. XDG config directory (~/.config/logservice/cluster.json)
/// 5. System config (/etc/logservice/cluster.json)
///
/// Explicit paths (1, 2) are returned even when missing, so the caller can
/// report exactly which file was asked for. Discovered paths (3-5) are only
/// returned when the file exists.
pub fn resolve_cluster_config_path(cli_path: Option<&Path>) -> ConfigLocation {
    let location = locate(cli_path);
    match &location.path {
        Some(path) => debug!(
            path = %path.display(),
            source = %location.source,
            "cluster config located"
        ),
        None => debug!("no cluster config found"),
    }
    location
}

fn locate(cli_path: Option<&Path>) -> ConfigLocation {
    // 1. CLI argument
    if let Some(path) = cli_path {
        return ConfigLocation {
            path: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        };
    }

    // 2. Environment variable (direct path)
    if let Some(env_path) = std::env::var_os(ENV_CONFIG_PATH).filter(|v| !v.is_empty()) {
        return ConfigLocation {
            path: Some(PathBuf::from(env_path)),
            source: ConfigSource::Environment,
        };
    }

    // 3. Environment variable (config dir)
    if let Some(config_dir) = std::env::var_os(ENV_CONFIG_DIR).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(config_dir).join(CLUSTER_FILENAME);
        if path.exists() {
            return ConfigLocation {
                path: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    // 4. XDG config directory
    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(CLUSTER_FILENAME);
        if path.exists() {
            return ConfigLocation {
                path: Some(path),
                source: ConfigSource::XdgConfig,
            };
        }
    }

    // 5. System config
    let system_path = system_config_dir().join(CLUSTER_FILENAME);
    if system_path.exists() {
        return ConfigLocation {
            path: Some(system_path),
            source: ConfigSource::SystemConfig,
        };
    }

    ConfigLocation::default()
}

/// Get the XDG config directory for the log service.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_display() {
        assert_eq!(format!("{}", ConfigSource::CliArgument), "CLI argument");
        assert_eq!(
            format!("{}", ConfigSource::Environment),
            "environment variable"
        );
        assert_eq!(format!("{}", ConfigSource::XdgConfig), "XDG config");
        assert_eq!(format!("{}", ConfigSource::SystemConfig), "system config");
        assert_eq!(format!("{}", ConfigSource::Unresolved), "unresolved");
    }

    #[test]
    fn test_cli_path_returned_even_if_missing() {
        let path = Path::new("/nonexistent/logservice/cluster.json");
        let location = resolve_cluster_config_path(Some(path));
        assert_eq!(location.source, ConfigSource::CliArgument);
        assert_eq!(location.path.as_deref(), Some(path));
    }

    #[test]
    fn test_xdg_config_dir() {
        if let Some(path) = xdg_config_dir() {
            assert!(path.ends_with(APP_NAME));
        }
    }

    #[test]
    fn test_system_config_dir() {
        assert_eq!(system_config_dir(), PathBuf::from("/etc/logservice"));
    }
}
