//! Typed cluster configuration.
//!
//! A cluster config tells the service where the log backend lives, how
//! requests are attributed to a tenant, and which label names carry the
//! cluster and component identifiers.
//!
//! ```json
//! {
//!   "loki": {
//!     "base_url": "http://loki-gateway:3100",
//!     "tenant_header": "X-Scope-OrgID",
//!     "tenant": "ops",
//!     "auth": {"type": "token", "token": "..."},
//!     "query_params": {"direction": "backward"}
//!   },
//!   "labels": {"cluster": "cluster_id", "component": "app"},
//!   "components": ["pd", "tikv", "tidb"]
//! }
//! ```

use crate::validate::ValidationError;
use logsvc_common::Direction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default per-call deadline for backend requests.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Cluster configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub loki: LokiConfig,

    #[serde(default)]
    pub labels: LabelsConfig,

    /// Components queried when a request names none.
    #[serde(default)]
    pub components: Vec<String>,
}

/// Log backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LokiConfig {
    #[serde(default)]
    pub base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_header: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,

    /// Extra headers sent verbatim on every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,

    #[serde(default)]
    pub query_params: QueryParams,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl Default for LokiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            tenant_header: None,
            tenant: None,
            headers: BTreeMap::new(),
            auth: None,
            query_params: QueryParams::default(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

/// Credential attached to backend requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// `token` or `none`.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Header name; `Authorization` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,

    /// Value prefix; `Bearer` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Fixed query parameters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub direction: Direction,
}

/// Label names carrying the cluster and component identifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelsConfig {
    #[serde(default)]
    pub cluster: String,

    #[serde(default)]
    pub component: String,
}

impl ClusterConfig {
    /// Load a cluster config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ValidationError> {
        if !path.exists() {
            return Err(ValidationError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_str(&content)
    }

    /// Parse a cluster config from a JSON string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// Components to query: the requested ones, or the configured list.
    pub fn effective_components(&self, requested: &[String]) -> Vec<String> {
        let requested: Vec<String> = requested
            .iter()
            .filter(|c| !c.trim().is_empty())
            .cloned()
            .collect();
        if requested.is_empty() {
            self.components.clone()
        } else {
            requested
        }
    }

    /// Label pairs selecting one component's stream, cluster label first.
    pub fn stream_labels(&self, cluster_id: &str, component: &str) -> Vec<(String, String)> {
        vec![
            (self.labels.cluster.clone(), cluster_id.to_string()),
            (self.labels.component.clone(), component.to_string()),
        ]
    }
}

impl LokiConfig {
    /// Headers for backend requests.
    ///
    /// Static headers first; the tenant header is added when both name and
    /// value are set; a `token` auth block with an inline token adds
    /// `<header>: <scheme> <token>`. Later entries overwrite earlier ones.
    pub fn request_headers(&self) -> BTreeMap<String, String> {
        let mut headers = self.headers.clone();

        if let (Some(name), Some(value)) = (&self.tenant_header, &self.tenant) {
            if !name.is_empty() && !value.is_empty() {
                headers.insert(name.clone(), value.clone());
            }
        }

        if let Some(auth) = &self.auth {
            if auth.kind == "token" {
                if let Some(token) = auth.token.as_deref().filter(|t| !t.is_empty()) {
                    let header = auth.header.as_deref().unwrap_or("Authorization");
                    let scheme = auth.scheme.as_deref().unwrap_or("Bearer");
                    headers.insert(header.to_string(), format!("{} {}", scheme, token));
                }
            }
        }

        headers
    }
}
