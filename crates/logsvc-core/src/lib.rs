//! Log Retrieval Service Core Library
//!
//! This library provides the retrieval pipeline and its surfaces:
//! - LogQL compilation from stream labels and keywords
//! - Windowed retrieval over a time range with a shrinking line budget
//! - Per-cluster token-bucket admission control
//! - The Loki `query_range` client
//! - Export of retrieved lines to files
//! - The HTTP serve loop, logging setup and CLI exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod admission;
pub mod exit_codes;
pub mod export;
pub mod logging;
pub mod loki;
pub mod query;
pub mod serve;
pub mod service;
pub mod window;

pub use admission::TokenBucketLimiter;
pub use exit_codes::ExitCode;
pub use loki::LokiClient;
pub use query::{build_logql, escape_value};
pub use serve::{route, run_blocking, ApiServer, HttpReply};
pub use service::{Connector, LokiConnector, QueryService};
pub use window::{query_with_slicing, LogFetcher, TimeWindow};
