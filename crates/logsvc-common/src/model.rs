//! Request and response types shared by the CLI, the serve loop and the core pipeline.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Upper bound on `max_lines` accepted per request.
pub const MAX_LINES_LIMIT: usize = 100;

/// Default `max_lines` when the request omits it.
pub const DEFAULT_MAX_LINES: usize = 100;

/// Accepted range for `window_seconds`.
pub const MIN_WINDOW_SECONDS: u64 = 10;
pub const MAX_WINDOW_SECONDS: u64 = 3600;

/// Default window size.
pub const DEFAULT_WINDOW_SECONDS: u64 = 300;

/// A single log line as returned by the backend.
///
/// `ts` is kept in the backend's native string form and never reparsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub ts: String,
    pub line: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl LogLine {
    pub fn new(ts: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            ts: ts.into(),
            line: line.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// A copy of this line carrying different text, same timestamp and labels.
    pub fn with_text(&self, line: String) -> Self {
        Self {
            ts: self.ts.clone(),
            line,
            labels: self.labels.clone(),
        }
    }
}

/// Chronological direction in which a retrieval walks its time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Most recent lines first.
    #[default]
    Backward,
    /// Earliest lines first.
    Forward,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Backward => "backward",
            Direction::Forward => "forward",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "backward" | "backwards" => Ok(Direction::Backward),
            "forward" | "forwards" => Ok(Direction::Forward),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// Parse a timestamp, treating values without an offset as UTC.
///
/// Accepts RFC 3339 (`2024-05-01T10:00:00Z`, `2024-05-01T12:00:00+02:00`),
/// naive date-times with `T` or space separator and optional fractional
/// seconds, and bare dates (midnight UTC).
pub fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(format!("unrecognized timestamp: {}", value))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Outer time range of a retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub start: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

fn default_max_lines() -> usize {
    DEFAULT_MAX_LINES
}

fn default_window_seconds() -> u64 {
    DEFAULT_WINDOW_SECONDS
}

/// A retrieval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Tenant key; also the value of the cluster label.
    pub cluster_id: String,

    /// Cluster config to use instead of the service default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_config_path: Option<PathBuf>,

    /// Components to query; empty means all components from the cluster config.
    #[serde(default)]
    pub components: Vec<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    pub time_range: TimeRange,

    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
}

impl QueryRequest {
    /// Check request-shape constraints that need no configuration.
    pub fn validate(&self) -> Result<()> {
        if self.cluster_id.trim().is_empty() {
            return Err(Error::InvalidRequest("cluster_id is required".into()));
        }
        if self.max_lines == 0 || self.max_lines > MAX_LINES_LIMIT {
            return Err(Error::InvalidRequest(format!(
                "max_lines must be in [1, {}], got {}",
                MAX_LINES_LIMIT, self.max_lines
            )));
        }
        if !(MIN_WINDOW_SECONDS..=MAX_WINDOW_SECONDS).contains(&self.window_seconds) {
            return Err(Error::InvalidRequest(format!(
                "window_seconds must be in [{}, {}], got {}",
                MIN_WINDOW_SECONDS, MAX_WINDOW_SECONDS, self.window_seconds
            )));
        }
        if self.time_range.end < self.time_range.start {
            return Err(Error::InvalidRequest(format!(
                "time_range end {} is before start {}",
                self.time_range.end.to_rfc3339(),
                self.time_range.start.to_rfc3339()
            )));
        }
        Ok(())
    }
}

/// A retrieval response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub lines: Vec<LogLine>,
    /// True when the line count hit the requested cap.
    pub truncated: bool,
}

impl QueryResponse {
    pub fn new(lines: Vec<LogLine>, max_lines: usize) -> Self {
        let truncated = lines.len() >= max_lines;
        Self { lines, truncated }
    }
}

/// File format for exported lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl ExportFormat {
    /// File extension used for the export file.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Text => "text",
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "markdown",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Request to write previously retrieved lines to a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub format: ExportFormat,
    pub lines: Vec<LogLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub path: String,
}
