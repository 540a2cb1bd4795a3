//! Standard event names used in logging.
//!
//! Every pipeline log record carries an `event` field with one of these
//! names, so JSONL consumers can filter without parsing messages.

/// Standard event names used in logging.
pub mod event_names {
    // Lifecycle
    pub const SERVICE_READY: &str = "service.ready";
    pub const SERVE_STARTED: &str = "serve.started";
    pub const SERVE_STOPPED: &str = "serve.stopped";

    // Query pipeline
    pub const QUERY_ADMITTED: &str = "query.admitted";
    pub const QUERY_REJECTED: &str = "query.rejected";
    pub const QUERY_FAILED: &str = "query.failed";
    pub const QUERY_FINISHED: &str = "query.finished";

    // HTTP surface
    pub const HTTP_REQUEST: &str = "http.request";
}

#[cfg(test)]
mod tests {
    use super::event_names::*;

    #[test]
    fn test_event_names_are_dotted() {
        for name in [
            SERVICE_READY,
            SERVE_STARTED,
            SERVE_STOPPED,
            QUERY_ADMITTED,
            QUERY_REJECTED,
            QUERY_FAILED,
            QUERY_FINISHED,
            HTTP_REQUEST,
        ] {
            let (stage, action) = name.split_once('.').expect("dotted name");
            assert!(!stage.is_empty() && !action.is_empty(), "bad name {}", name);
        }
    }
}
