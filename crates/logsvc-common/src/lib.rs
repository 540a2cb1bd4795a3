//! Log retrieval service common types and errors.
//!
//! This crate provides the types shared across the workspace:
//! - Log lines, time ranges, retrieval requests and responses
//! - Export requests and formats
//! - The unified error type with stable codes
//! - Output formats for CLI commands

pub mod error;
pub mod model;
pub mod output;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError};
pub use model::{
    parse_timestamp, Direction, ExportFormat, ExportRequest, ExportResponse, LogLine,
    QueryRequest, QueryResponse, TimeRange, DEFAULT_MAX_LINES, DEFAULT_WINDOW_SECONDS,
    MAX_LINES_LIMIT, MAX_WINDOW_SECONDS, MIN_WINDOW_SECONDS,
};
pub use output::OutputFormat;
