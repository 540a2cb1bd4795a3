//! The retrieval pipeline for one request.
//!
//! ```text
//! QueryRequest
//!   → validate request shape
//!   → resolve + load + validate cluster config, pick components
//!   → admission (one token per cluster_id)
//!   → per component: build_logql → query_with_slicing (remaining budget)
//!   → redact (if enabled)
//!   → QueryResponse { lines, truncated }
//! ```
//!
//! Every check that needs no backend runs before admission, so a rejected
//! request never spends a token.

use crate::admission::TokenBucketLimiter;
use crate::export::write_export;
use crate::logging::event_names;
use crate::loki::LokiClient;
use crate::query::build_logql;
use crate::window::{query_with_slicing, LogFetcher};
use chrono::Utc;
use logsvc_common::{
    Error, ExportRequest, ExportResponse, LogLine, QueryRequest, QueryResponse, Result,
};
use logsvc_config::{
    resolve_cluster_config_path, validate_cluster_config, ClusterConfig, LokiConfig, Settings,
};
use logsvc_redact::Redactor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Opens a fetcher for a cluster's backend.
pub trait Connector: Send + Sync {
    fn connect(&self, config: &LokiConfig) -> Result<Box<dyn LogFetcher>>;
}

/// Connects to Loki over HTTP.
#[derive(Debug, Default, Clone, Copy)]
pub struct LokiConnector;

impl Connector for LokiConnector {
    fn connect(&self, config: &LokiConfig) -> Result<Box<dyn LogFetcher>> {
        Ok(Box::new(LokiClient::from_config(config)))
    }
}

/// Shared state for all requests: settings, limiter, redactor and connector.
pub struct QueryService {
    settings: Settings,
    limiter: TokenBucketLimiter,
    redactor: Redactor,
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("settings", &self.settings)
            .field("limiter", &self.limiter)
            .field("redaction_rules", &self.redactor.len())
            .finish()
    }
}

impl QueryService {
    /// Service over Loki, loading redaction rules from the settings' rule file.
    pub fn new(settings: Settings) -> Self {
        let redactor = Redactor::from_file(&settings.redaction_path);
        Self::with_parts(settings, redactor, Arc::new(LokiConnector))
    }

    /// Service with an explicit redactor and connector.
    pub fn with_parts(settings: Settings, redactor: Redactor, connector: Arc<dyn Connector>) -> Self {
        let limiter = TokenBucketLimiter::new(settings.limiter_rate(), settings.limiter_burst());
        info!(
            event = event_names::SERVICE_READY,
            env = %settings.env,
            redact = settings.redact_enabled,
            redaction_source = %redactor.source(),
            redaction_rules = redactor.len(),
            min_interval_seconds = settings.min_interval_seconds,
            "query service ready"
        );
        Self {
            settings,
            limiter,
            redactor,
            connector,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn limiter(&self) -> &TokenBucketLimiter {
        &self.limiter
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Resolve and load the cluster config for `request`, then validate it.
    pub fn load_cluster_config(&self, request: &QueryRequest) -> Result<ClusterConfig> {
        let explicit = request
            .cluster_config_path
            .as_deref()
            .or(self.settings.config_path.as_deref());
        let location = resolve_cluster_config_path(explicit);
        let path: PathBuf = location.path.ok_or_else(|| {
            Error::InvalidRequest("cluster_config_path is required".to_string())
        })?;
        debug!(path = %path.display(), source = %location.source, "cluster config resolved");

        let config = ClusterConfig::from_file(&path)?;
        validate_cluster_config(&config)?;
        Ok(config)
    }

    /// Run one retrieval.
    pub fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let started = Instant::now();
        request.validate()?;

        let config = self.load_cluster_config(request)?;
        let components = config.effective_components(&request.components);
        if components.is_empty() {
            return Err(Error::InvalidRequest("components is required".to_string()));
        }

        if let Err(err) = self.limiter.check(&request.cluster_id) {
            warn!(
                event = event_names::QUERY_REJECTED,
                cluster_id = %request.cluster_id,
                error = %err,
                "query rejected by admission"
            );
            return Err(err);
        }
        info!(
            event = event_names::QUERY_ADMITTED,
            cluster_id = %request.cluster_id,
            components = components.len(),
            keywords = request.keywords.len(),
            max_lines = request.max_lines,
            "query admitted"
        );

        let fetcher = self.connector.connect(&config.loki)?;
        let direction = config.loki.query_params.direction;
        let mut lines: Vec<LogLine> = Vec::new();

        for component in &components {
            let labels = config.stream_labels(&request.cluster_id, component);
            let logql = build_logql(&labels, &request.keywords);
            let remaining = request.max_lines - lines.len();
            let batch = query_with_slicing(
                fetcher.as_ref(),
                &logql,
                request.time_range.start,
                request.time_range.end,
                remaining,
                request.window_seconds,
                direction,
            )
            .map_err(|err| {
                warn!(
                    event = event_names::QUERY_FAILED,
                    cluster_id = %request.cluster_id,
                    component = %component,
                    error = %err,
                    "retrieval failed"
                );
                err
            })?;
            debug!(component = %component, fetched = batch.len(), "component fetched");
            lines.extend(batch);
            if lines.len() >= request.max_lines {
                break;
            }
        }
        lines.truncate(request.max_lines);

        let lines = if self.settings.redact_enabled {
            self.redactor.redact_lines(lines)
        } else {
            lines
        };

        let response = QueryResponse::new(lines, request.max_lines);
        info!(
            event = event_names::QUERY_FINISHED,
            cluster_id = %request.cluster_id,
            lines = response.lines.len(),
            truncated = response.truncated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "query finished"
        );
        Ok(response)
    }

    /// Write lines to an export file, redacting them first if enabled.
    pub fn export(&self, request: ExportRequest) -> Result<ExportResponse> {
        let lines = if self.settings.redact_enabled {
            self.redactor.redact_lines(request.lines)
        } else {
            request.lines
        };
        let path = write_export(
            &self.settings.exports_dir(),
            request.format,
            &lines,
            Utc::now(),
        )?;
        Ok(ExportResponse {
            path: path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::TimeWindow;
    use logsvc_common::{parse_timestamp, Direction, TimeRange};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serves `per_window` canned lines per fetch and records queries.
    struct StubConnector {
        per_window: usize,
        queries: Arc<Mutex<Vec<String>>>,
        connects: Arc<Mutex<usize>>,
    }

    struct StubFetcher {
        per_window: usize,
        queries: Arc<Mutex<Vec<String>>>,
    }

    impl LogFetcher for StubFetcher {
        fn fetch(
            &self,
            query: &str,
            window: TimeWindow,
            limit: usize,
            _direction: Direction,
        ) -> Result<Vec<LogLine>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok((0..self.per_window.min(limit))
                .map(|i| {
                    LogLine::new(
                        window.end.timestamp_nanos_opt().unwrap_or(0).to_string(),
                        format!("msg {} password=hunter2", i),
                    )
                })
                .collect())
        }
    }

    impl Connector for StubConnector {
        fn connect(&self, _config: &LokiConfig) -> Result<Box<dyn LogFetcher>> {
            *self.connects.lock().unwrap() += 1;
            Ok(Box::new(StubFetcher {
                per_window: self.per_window,
                queries: Arc::clone(&self.queries),
            }))
        }
    }

    struct Fixture {
        _temp: TempDir,
        config_path: PathBuf,
        service: QueryService,
        queries: Arc<Mutex<Vec<String>>>,
        connects: Arc<Mutex<usize>>,
    }

    fn fixture(per_window: usize, redact: bool) -> Fixture {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("cluster.json");
        std::fs::write(
            &config_path,
            r#"{"loki":{"base_url":"http://loki:3100"},
                "labels":{"cluster":"cluster_id","component":"app"},
                "components":["pd","tikv"]}"#,
        )
        .unwrap();

        let settings = Settings {
            data_dir: temp.path().to_path_buf(),
            redaction_path: temp.path().join("redaction.json"),
            redact_enabled: redact,
            ..Settings::default()
        };
        let queries = Arc::new(Mutex::new(Vec::new()));
        let connects = Arc::new(Mutex::new(0));
        let connector = StubConnector {
            per_window,
            queries: Arc::clone(&queries),
            connects: Arc::clone(&connects),
        };
        let service = QueryService::with_parts(settings, Redactor::builtin(), Arc::new(connector));
        Fixture {
            _temp: temp,
            config_path,
            service,
            queries,
            connects,
        }
    }

    fn request(config_path: &std::path::Path) -> QueryRequest {
        QueryRequest {
            cluster_id: "c1".into(),
            cluster_config_path: Some(config_path.to_path_buf()),
            components: vec![],
            keywords: vec!["error".into()],
            time_range: TimeRange::new(
                parse_timestamp("2024-05-01T10:00:00Z").unwrap(),
                parse_timestamp("2024-05-01T10:16:40Z").unwrap(),
            ),
            max_lines: 5,
            window_seconds: 300,
        }
    }

    #[test]
    fn test_query_caps_and_redacts() {
        let fx = fixture(2, true);
        let response = fx.service.query(&request(&fx.config_path)).unwrap();

        assert_eq!(response.lines.len(), 5);
        assert!(response.truncated);
        assert!(response.lines.iter().all(|l| l.line.ends_with("password=***")));

        let queries = fx.queries.lock().unwrap();
        assert_eq!(queries[0], r#"{cluster_id="c1",app="pd"} |= "error""#);
        // pd yields 4 windows x 2 lines = 8 > 5, tikv is never queried
        assert!(queries.iter().all(|q| q.contains(r#"app="pd""#)));
    }

    #[test]
    fn test_query_spans_components() {
        let fx = fixture(1, false);
        let mut req = request(&fx.config_path);
        req.max_lines = 6;
        let response = fx.service.query(&req).unwrap();

        // 4 windows per component, one line each
        assert_eq!(response.lines.len(), 6);
        assert!(response.truncated);
        assert!(response.lines[0].line.contains("hunter2"));
        let queries = fx.queries.lock().unwrap();
        assert_eq!(queries.iter().filter(|q| q.contains(r#"app="tikv""#)).count(), 2);
    }

    #[test]
    fn test_query_not_truncated_below_cap() {
        let fx = fixture(0, true);
        let response = fx.service.query(&request(&fx.config_path)).unwrap();
        assert!(response.lines.is_empty());
        assert!(!response.truncated);
    }

    #[test]
    fn test_requested_components_override_config() {
        let fx = fixture(1, true);
        let mut req = request(&fx.config_path);
        req.components = vec!["tidb".into()];
        fx.service.query(&req).unwrap();
        let queries = fx.queries.lock().unwrap();
        assert!(queries.iter().all(|q| q.contains(r#"app="tidb""#)));
    }

    #[test]
    fn test_second_query_rate_limited() {
        let fx = fixture(1, true);
        let req = request(&fx.config_path);
        fx.service.query(&req).unwrap();

        let err = fx.service.query(&req).unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
        let retry_after = err.retry_after_header().unwrap();
        assert!((10..=11).contains(&retry_after), "retry_after = {}", retry_after);
        assert_eq!(*fx.connects.lock().unwrap(), 1);
    }

    #[test]
    fn test_invalid_request_spends_no_token() {
        let fx = fixture(1, true);
        let mut bad = request(&fx.config_path);
        bad.max_lines = 0;
        assert_eq!(fx.service.query(&bad).unwrap_err().code(), 10);

        let mut missing = request(&fx.config_path);
        missing.cluster_config_path = Some(fx.config_path.with_file_name("absent.json"));
        assert!(matches!(
            fx.service.query(&missing).unwrap_err(),
            Error::ConfigNotFound { .. }
        ));

        assert!(fx.service.limiter().tokens("c1").is_none());
        fx.service.query(&request(&fx.config_path)).unwrap();
    }

    #[test]
    fn test_empty_components_rejected_before_admission() {
        let fx = fixture(1, true);
        std::fs::write(
            &fx.config_path,
            r#"{"loki":{"base_url":"http://loki:3100"},
                "labels":{"cluster":"cluster_id","component":"app"}}"#,
        )
        .unwrap();
        let err = fx.service.query(&request(&fx.config_path)).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(ref m) if m.contains("components")));
        assert!(fx.service.limiter().tokens("c1").is_none());
    }

    #[test]
    fn test_export_redacts_when_enabled() {
        let fx = fixture(0, true);
        let response = fx
            .service
            .export(ExportRequest {
                format: logsvc_common::ExportFormat::Text,
                lines: vec![LogLine::new("1", "token=abc123")],
            })
            .unwrap();
        let content = std::fs::read_to_string(&response.path).unwrap();
        assert_eq!(content, "1 token=***");
        assert!(PathBuf::from(&response.path).starts_with(fx.service.settings().exports_dir()));
    }
}
