//! In-process Loki stand-in built on tiny_http.
//!
//! Records every request and answers with whatever the handler returns.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// A request as seen by the stub.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub params: Vec<(String, String)>,
    /// Header names lowercased.
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn param_i64(&self, name: &str) -> i64 {
        self.param(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| panic!("missing numeric param {}", name))
    }
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode one `application/x-www-form-urlencoded` component.
fn form_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi * 16 + lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn parse_url(url: &str) -> (String, Vec<(String, String)>) {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let params = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (form_decode(k), form_decode(v))
        })
        .collect();
    (path.to_string(), params)
}

type Handler = dyn Fn(&RecordedRequest) -> (u16, String) + Send + Sync;

pub struct StubLoki {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl StubLoki {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static,
    {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind stub loki");
        let addr = server.server_addr().to_ip().expect("ip listener");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handler: Arc<Handler> = Arc::new(handler);
        let recorded = Arc::clone(&requests);
        let stop = Arc::clone(&shutdown);
        let thread = thread::spawn(move || loop {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            let request = match server.recv_timeout(Duration::from_millis(100)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };
            if stop.load(Ordering::SeqCst) {
                break;
            }
            let (path, params) = parse_url(request.url());
            let seen = RecordedRequest {
                method: request.method().to_string(),
                path,
                params,
                headers: request
                    .headers()
                    .iter()
                    .map(|h| {
                        (
                            h.field.as_str().as_str().to_ascii_lowercase(),
                            h.value.as_str().to_string(),
                        )
                    })
                    .collect(),
            };
            let (status, body) = handler(&seen);
            recorded.lock().unwrap().push(seen);
            let _ = request
                .respond(tiny_http::Response::from_string(body).with_status_code(status));
        });

        Self {
            addr,
            requests,
            shutdown,
            thread: Some(thread),
        }
    }

    /// Stub answering every request with `status` and `body`.
    pub fn fixed(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::start(move |_| (status, body.clone()))
    }

    /// Stub returning `per_window.min(limit)` lines per request, stamped at
    /// the window end.
    pub fn generating(per_window: usize) -> Self {
        Self::start(move |req| {
            let end = req.param_i64("end");
            let limit = req.param_i64("limit") as usize;
            let values: Vec<(String, String)> = (0..per_window.min(limit))
                .map(|i| (end.to_string(), format!("line {} token=abc{}", i, i)))
                .collect();
            (200, streams_body(&[("app", "pd")], &values))
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for StubLoki {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = std::net::TcpStream::connect(self.addr);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// A `query_range` success payload with one stream.
pub fn streams_body(labels: &[(&str, &str)], values: &[(String, String)]) -> String {
    let stream: serde_json::Map<String, serde_json::Value> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
        .collect();
    let values: Vec<serde_json::Value> = values
        .iter()
        .map(|(ts, line)| serde_json::json!([ts, line]))
        .collect();
    serde_json::json!({
        "status": "success",
        "data": {
            "resultType": "streams",
            "result": [{ "stream": stream, "values": values }]
        }
    })
    .to_string()
}

/// Cluster config JSON pointing at `base_url`.
pub fn cluster_config_json(base_url: &str) -> String {
    serde_json::json!({
        "loki": {
            "base_url": base_url,
            "tenant_header": "X-Scope-OrgID",
            "tenant": "team-a",
            "auth": { "type": "token", "token": "s3cr3t" },
            "timeout_seconds": 5
        },
        "labels": { "cluster": "cluster_id", "component": "app" },
        "components": ["pd"]
    })
    .to_string()
}
