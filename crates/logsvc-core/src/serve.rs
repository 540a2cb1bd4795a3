//! HTTP surface for the query service.
//!
//! Routes:
//! - `GET /health` → `{"status":"ok"}`
//! - `POST /api/query` → [`QueryRequest`] in, [`QueryResponse`] out
//! - `POST /api/export` → [`ExportRequest`] in, [`ExportResponse`] out
//!
//! Errors are returned as [`StructuredError`] JSON with the status from
//! [`Error::http_status`]; rate-limited responses carry `Retry-After`.
//!
//! [`QueryResponse`]: logsvc_common::QueryResponse
//! [`ExportResponse`]: logsvc_common::ExportResponse

use crate::logging::event_names;
use crate::service::QueryService;
use logsvc_common::{Error, ExportRequest, QueryRequest, Result, StructuredError};
use serde::Serialize;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tiny_http::Method;
use tracing::{debug, error, info, warn};

/// Largest request body read from a client.
const MAX_BODY_BYTES: u64 = 8 * 1024 * 1024;

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_secs(1);

/// A routed response, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
    /// Seconds for the `Retry-After` header, if any.
    pub retry_after: Option<u64>,
}

impl HttpReply {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self {
                status,
                body,
                retry_after: None,
            },
            Err(e) => Self::error(&Error::Json(e)),
        }
    }

    fn error(err: &Error) -> Self {
        Self {
            status: err.http_status(),
            body: StructuredError::from(err).to_json(),
            retry_after: err.retry_after_header(),
        }
    }

    fn plain_error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: serde_json::json!({ "error": message }).to_string(),
            retry_after: None,
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    Ok(serde_json::from_str(body)?)
}

/// Dispatch one request to the service.
pub fn route(service: &QueryService, method: &Method, url: &str, body: &str) -> HttpReply {
    let path = url.split('?').next().unwrap_or(url);

    match (method, path) {
        (Method::Get, "/health") => HttpReply::json(200, &serde_json::json!({ "status": "ok" })),
        (Method::Post, "/api/query") => {
            match parse_body::<QueryRequest>(body).and_then(|req| service.query(&req)) {
                Ok(response) => HttpReply::json(200, &response),
                Err(err) => HttpReply::error(&err),
            }
        }
        (Method::Post, "/api/export") => {
            match parse_body::<ExportRequest>(body).and_then(|req| service.export(req)) {
                Ok(response) => HttpReply::json(200, &response),
                Err(err) => HttpReply::error(&err),
            }
        }
        (_, "/health" | "/api/query" | "/api/export") => {
            HttpReply::plain_error(405, "method not allowed")
        }
        _ => HttpReply::plain_error(404, "not found"),
    }
}

fn respond(request: tiny_http::Request, reply: HttpReply) {
    let mut response = tiny_http::Response::from_string(reply.body).with_status_code(reply.status);
    if let Ok(header) = "Content-Type: application/json".parse::<tiny_http::Header>() {
        response = response.with_header(header);
    }
    if let Some(secs) = reply.retry_after {
        if let Ok(header) = tiny_http::Header::from_bytes(&b"Retry-After"[..], secs.to_string()) {
            response = response.with_header(header);
        }
    }
    if let Err(e) = request.respond(response) {
        warn!(error = %e, "failed to send response");
    }
}

fn handle(service: &QueryService, mut request: tiny_http::Request) {
    let started = Instant::now();
    let method = request.method().clone();
    let url = request.url().to_string();

    let mut body = String::new();
    let reply = match request
        .as_reader()
        .take(MAX_BODY_BYTES)
        .read_to_string(&mut body)
    {
        Ok(_) => route(service, &method, &url, &body),
        Err(e) => HttpReply::error(&Error::InvalidRequest(format!(
            "unreadable request body: {}",
            e
        ))),
    };

    info!(
        event = event_names::HTTP_REQUEST,
        method = %method,
        url = %url,
        status = reply.status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request served"
    );
    respond(request, reply);
}

/// Accept until `shutdown` is set; each request runs on its own worker thread.
fn serve_loop(server: tiny_http::Server, service: Arc<QueryService>, shutdown: &AtomicBool) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let request = match server.recv_timeout(ACCEPT_POLL) {
            Ok(Some(req)) => req,
            Ok(None) => continue,
            Err(e) => {
                if !shutdown.load(Ordering::SeqCst) {
                    error!(error = %e, "accept error");
                }
                break;
            }
        };

        if shutdown.load(Ordering::SeqCst) {
            respond(request, HttpReply::plain_error(503, "shutting down"));
            break;
        }

        debug!(method = %request.method(), url = %request.url(), "request accepted");
        let worker_service = Arc::clone(&service);
        let spawned = thread::Builder::new()
            .name("logsvc-worker".to_string())
            .spawn(move || handle(&worker_service, request));
        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn request worker");
        }
    }
}

fn bind(addr: SocketAddr) -> Result<(tiny_http::Server, SocketAddr)> {
    let server = tiny_http::Server::http(addr).map_err(|e| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("failed to bind {}: {}", addr, e),
        ))
    })?;
    let bound = server.server_addr().to_ip().unwrap_or(addr);
    Ok((server, bound))
}

/// Handle to an HTTP server running on a background thread.
pub struct ApiServer {
    shutdown: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
    addr: SocketAddr,
}

impl ApiServer {
    /// Bind `addr` (port 0 picks a free port) and serve on a background thread.
    pub fn start(addr: SocketAddr, service: Arc<QueryService>) -> Result<Self> {
        let (server, bound) = bind(addr)?;
        info!(event = event_names::SERVE_STARTED, addr = %bound, "http server started");

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("logsvc-serve".to_string())
            .spawn(move || serve_loop(server, service, &shutdown_clone))?;

        Ok(Self {
            shutdown,
            thread: Some(thread),
            addr: bound,
        })
    }

    /// Bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting and wait for the accept loop to exit.
    pub fn shutdown(mut self) {
        self.stop();
        info!(event = event_names::SERVE_STOPPED, addr = %self.addr, "http server stopped");
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // unblock a pending accept
        let _ = std::net::TcpStream::connect(self.addr);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Serve on the calling thread until the process exits.
pub fn run_blocking(addr: SocketAddr, service: Arc<QueryService>) -> Result<()> {
    let (server, bound) = bind(addr)?;
    info!(event = event_names::SERVE_STARTED, addr = %bound, "http server started");
    let never = AtomicBool::new(false);
    serve_loop(server, service, &never);
    info!(event = event_names::SERVE_STOPPED, addr = %bound, "http server stopped");
    Ok(())
}
