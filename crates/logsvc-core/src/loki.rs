//! Loki `query_range` client.
//!
//! One blocking `GET {base_url}/loki/api/v1/query_range` per window, with a
//! fixed per-call deadline and no retries.

use crate::window::{LogFetcher, TimeWindow};
use chrono::{DateTime, Utc};
use logsvc_common::{Direction, Error, LogLine, Result};
use logsvc_config::LokiConfig;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub const QUERY_RANGE_PATH: &str = "/loki/api/v1/query_range";

/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Default, Deserialize)]
struct QueryRangeResponse {
    #[serde(default)]
    data: Option<QueryRangeData>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryRangeData {
    #[serde(default)]
    result: Option<Vec<StreamResult>>,
}

#[derive(Debug, Deserialize)]
struct StreamResult {
    #[serde(default)]
    stream: Option<BTreeMap<String, String>>,
    #[serde(default)]
    values: Option<Vec<Vec<Value>>>,
}

/// Nanosecond epoch of `ts`.
pub fn to_nanos(ts: DateTime<Utc>) -> Result<i64> {
    ts.timestamp_nanos_opt().ok_or_else(|| {
        Error::InvalidRequest(format!(
            "timestamp {} is outside the nanosecond epoch range",
            ts.to_rfc3339()
        ))
    })
}

/// Decode a `query_range` payload into lines.
///
/// Missing `data`, `result`, `stream` or `values` decode as empty. Each value
/// must be an array whose first two elements are the timestamp and the line.
pub fn decode_query_range(body: &str) -> Result<Vec<LogLine>> {
    let payload: QueryRangeResponse = serde_json::from_str(body)
        .map_err(|e| Error::UpstreamPayload(format!("invalid query_range JSON: {}", e)))?;

    let streams = payload.data.and_then(|d| d.result).unwrap_or_default();
    let mut lines = Vec::new();
    for stream in streams {
        let labels = stream.stream.unwrap_or_default();
        for value in stream.values.unwrap_or_default() {
            let (ts, line) = match value.as_slice() {
                [Value::String(ts), Value::String(line), ..] => (ts.clone(), line.clone()),
                other => {
                    return Err(Error::UpstreamPayload(format!(
                        "expected [timestamp, line] pair, got {} element(s)",
                        other.len()
                    )))
                }
            };
            lines.push(LogLine::new(ts, line).with_labels(labels.clone()));
        }
    }
    Ok(lines)
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}

/// Blocking Loki client.
#[derive(Clone)]
pub struct LokiClient {
    base_url: String,
    headers: BTreeMap<String, String>,
    agent: ureq::Agent,
}

impl std::fmt::Debug for LokiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // header values may carry credentials
        f.debug_struct("LokiClient")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl LokiClient {
    pub fn new(base_url: &str, headers: BTreeMap<String, String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
            agent,
        }
    }

    /// Client for a cluster's backend, with tenant and auth headers applied.
    pub fn from_config(config: &LokiConfig) -> Self {
        Self::new(
            &config.base_url,
            config.request_headers(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Fetch at most `limit` lines matching `query` in `[start, end]`.
    pub fn query_range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
        direction: Direction,
    ) -> Result<Vec<LogLine>> {
        let url = format!("{}{}", self.base_url, QUERY_RANGE_PATH);
        let mut request = self
            .agent
            .get(&url)
            .query("query", query)
            .query("start", &to_nanos(start)?.to_string())
            .query("end", &to_nanos(end)?.to_string())
            .query("limit", &limit.to_string())
            .query("direction", direction.as_str());
        for (name, value) in &self.headers {
            request = request.set(name, value);
        }

        let body = match request.call() {
            Ok(resp) => resp
                .into_string()
                .map_err(|e| Error::Upstream(format!("failed to read response body: {}", e)))?,
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                return Err(Error::UpstreamStatus {
                    status,
                    body: truncate_body(body),
                });
            }
            Err(err) => return Err(Error::Upstream(err.to_string())),
        };

        let lines = decode_query_range(&body)?;
        debug!(url = %url, limit, returned = lines.len(), "query_range");
        Ok(lines)
    }
}

impl LogFetcher for LokiClient {
    fn fetch(
        &self,
        query: &str,
        window: TimeWindow,
        limit: usize,
        direction: Direction,
    ) -> Result<Vec<LogLine>> {
        self.query_range(query, window.start, window.end, limit, direction)
    }
}
