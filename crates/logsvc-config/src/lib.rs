//! Log service configuration loading and validation.
//!
//! This crate provides:
//! - Process settings read from `LOGSERVICE_*` environment variables
//! - Typed cluster configuration (backend endpoint, label mapping, components)
//! - Config resolution (CLI → env → XDG → /etc)
//! - Semantic validation with stable error codes

pub mod cluster;
pub mod resolve;
pub mod settings;
pub mod validate;

pub use cluster::{AuthConfig, ClusterConfig, LabelsConfig, LokiConfig, QueryParams};
pub use resolve::{resolve_cluster_config_path, ConfigLocation, ConfigSource};
pub use settings::Settings;
pub use validate::{validate_cluster_config, ValidationError, ValidationResult};
