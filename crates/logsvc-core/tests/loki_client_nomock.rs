//! No-mock tests for the Loki client against a real HTTP listener.
//!
//! Covers the wire contract of `query_range` (path, parameters, tenant and
//! auth headers), error mapping for non-2xx, malformed and unreachable
//! backends, and windowed retrieval driving the real client.

mod support;

use chrono::{DateTime, TimeZone, Utc};
use logsvc_common::{Direction, Error};
use logsvc_config::ClusterConfig;
use logsvc_core::loki::{to_nanos, LokiClient, QUERY_RANGE_PATH};
use logsvc_core::window::query_with_slicing;
use std::collections::BTreeMap;
use std::time::Duration;
use support::stub_loki::{cluster_config_json, streams_body, StubLoki};

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_714_557_600 + secs, 0).unwrap()
}

fn client_for(stub: &StubLoki) -> LokiClient {
    let config = ClusterConfig::from_str(&cluster_config_json(&stub.base_url())).unwrap();
    LokiClient::from_config(&config.loki)
}

// ============================================================================
// Wire contract
// ============================================================================

#[test]
fn sends_query_range_parameters_and_headers() {
    let values = vec![
        ("1714557600000000001".to_string(), "first".to_string()),
        ("1714557600000000002".to_string(), "second".to_string()),
    ];
    let stub = StubLoki::fixed(200, streams_body(&[("app", "pd")], &values));
    let client = client_for(&stub);

    let query = r#"{cluster_id="c1",app="pd"} |= "error""#;
    let lines = client
        .query_range(query, t(0), t(300), 25, Direction::Backward)
        .unwrap();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].ts, "1714557600000000001");
    assert_eq!(lines[1].line, "second");
    assert_eq!(lines[0].labels.get("app").map(String::as_str), Some("pd"));

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method, "GET");
    assert_eq!(req.path, QUERY_RANGE_PATH);
    assert_eq!(req.param("query"), Some(query));
    assert_eq!(req.param_i64("start"), to_nanos(t(0)).unwrap());
    assert_eq!(req.param_i64("end"), to_nanos(t(300)).unwrap());
    assert_eq!(req.param("limit"), Some("25"));
    assert_eq!(req.param("direction"), Some("backward"));
    assert_eq!(req.header("X-Scope-OrgID"), Some("team-a"));
    assert_eq!(req.header("Authorization"), Some("Bearer s3cr3t"));
}

#[test]
fn forward_direction_is_forwarded() {
    let stub = StubLoki::fixed(200, r#"{"data":{"result":[]}}"#);
    let client = client_for(&stub);
    client
        .query_range("{app=\"pd\"}", t(0), t(10), 1, Direction::Forward)
        .unwrap();
    assert_eq!(stub.requests()[0].param("direction"), Some("forward"));
}

#[test]
fn empty_payload_decodes_to_no_lines() {
    let stub = StubLoki::fixed(200, r#"{"status":"success"}"#);
    let lines = client_for(&stub)
        .query_range("{app=\"pd\"}", t(0), t(10), 10, Direction::Backward)
        .unwrap();
    assert!(lines.is_empty());
}

// ============================================================================
// Error mapping
// ============================================================================

#[test]
fn non_2xx_maps_to_upstream_status() {
    let stub = StubLoki::fixed(503, "ingester unavailable");
    let err = client_for(&stub)
        .query_range("{app=\"pd\"}", t(0), t(10), 10, Direction::Backward)
        .unwrap_err();

    match err {
        Error::UpstreamStatus { status, ref body } => {
            assert_eq!(status, 503);
            assert!(body.contains("ingester unavailable"));
        }
        other => panic!("expected UpstreamStatus, got {:?}", other),
    }
    assert_eq!(err.http_status(), 502);
    assert!(err.is_recoverable());
}

#[test]
fn bad_query_status_is_not_recoverable() {
    let stub = StubLoki::fixed(400, "parse error at line 1");
    let err = client_for(&stub)
        .query_range("{", t(0), t(10), 10, Direction::Backward)
        .unwrap_err();
    assert!(matches!(err, Error::UpstreamStatus { status: 400, .. }));
    assert!(!err.is_recoverable());
}

#[test]
fn malformed_payload_maps_to_upstream_payload() {
    let stub = StubLoki::fixed(200, "<html>gateway</html>");
    let err = client_for(&stub)
        .query_range("{app=\"pd\"}", t(0), t(10), 10, Direction::Backward)
        .unwrap_err();
    assert!(matches!(err, Error::UpstreamPayload(_)), "{:?}", err);
}

#[test]
fn unreachable_backend_maps_to_upstream() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = LokiClient::new(
        &format!("http://127.0.0.1:{}", port),
        BTreeMap::new(),
        Duration::from_secs(2),
    );
    let err = client
        .query_range("{app=\"pd\"}", t(0), t(10), 10, Direction::Backward)
        .unwrap_err();
    assert!(matches!(err, Error::Upstream(_)), "{:?}", err);
}

#[test]
fn slow_backend_hits_deadline() {
    let stub = StubLoki::start(|_| {
        std::thread::sleep(Duration::from_millis(1500));
        (200, r#"{"data":{"result":[]}}"#.to_string())
    });
    let client = LokiClient::new(&stub.base_url(), BTreeMap::new(), Duration::from_millis(200));
    let err = client
        .query_range("{app=\"pd\"}", t(0), t(10), 10, Direction::Backward)
        .unwrap_err();
    assert!(matches!(err, Error::Upstream(_)), "{:?}", err);
}

// ============================================================================
// Windowed retrieval over HTTP
// ============================================================================

#[test]
fn slicing_walks_windows_backward_with_shrinking_limit() {
    let stub = StubLoki::generating(2);
    let client = client_for(&stub);

    let lines = query_with_slicing(
        &client,
        "{app=\"pd\"}",
        t(0),
        t(1000),
        5,
        300,
        Direction::Backward,
    )
    .unwrap();
    assert_eq!(lines.len(), 5);

    let requests = stub.requests();
    let windows: Vec<(i64, i64, i64)> = requests
        .iter()
        .map(|r| (r.param_i64("start"), r.param_i64("end"), r.param_i64("limit")))
        .collect();
    let ns = |secs: i64| to_nanos(t(secs)).unwrap();
    assert_eq!(
        windows,
        vec![
            (ns(700), ns(1000), 5),
            (ns(400), ns(700), 3),
            (ns(100), ns(400), 1),
        ]
    );
}

#[test]
fn slicing_covers_whole_range_when_sparse() {
    let stub = StubLoki::generating(0);
    let client = client_for(&stub);

    let lines = query_with_slicing(
        &client,
        "{app=\"pd\"}",
        t(0),
        t(1000),
        100,
        300,
        Direction::Forward,
    )
    .unwrap();
    assert!(lines.is_empty());

    let bounds: Vec<(i64, i64)> = stub
        .requests()
        .iter()
        .map(|r| (r.param_i64("start"), r.param_i64("end")))
        .collect();
    let ns = |secs: i64| to_nanos(t(secs)).unwrap();
    assert_eq!(
        bounds,
        vec![
            (ns(0), ns(300)),
            (ns(300), ns(600)),
            (ns(600), ns(900)),
            (ns(900), ns(1000)),
        ]
    );
}

#[test]
fn failing_window_fails_whole_retrieval() {
    let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = std::sync::Arc::clone(&calls);
    let stub = StubLoki::start(move |req| {
        let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if n == 0 {
            let end = req.param_i64("end").to_string();
            (200, streams_body(&[], &[(end, "ok".to_string())]))
        } else {
            (500, "boom".to_string())
        }
    });
    let client = client_for(&stub);

    let err = query_with_slicing(
        &client,
        "{app=\"pd\"}",
        t(0),
        t(1000),
        10,
        300,
        Direction::Backward,
    )
    .unwrap_err();
    assert!(matches!(err, Error::UpstreamStatus { status: 500, .. }));
    assert_eq!(stub.requests().len(), 2);
}
