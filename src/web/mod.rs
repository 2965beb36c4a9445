//! HTTP front end for the dashboard.
//!
//! A blocking `tiny_http` listener shared by a fixed pool of worker threads.
//! Each worker pulls the next request off the listener and handles it start
//! to finish; requests share nothing but the immutable [`Dashboard`].
//!
//! Routes:
//! - `GET /` (and `/index.html`): HTML page with one SVG chart per panel
//! - `GET /latest.json`: newest sample per tracked fact
//! - `GET /health`: liveness, without touching the store

mod api;
mod page;

use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::dashboard::Dashboard;
use crate::facts::FactError;

const JSON: &str = "application/json; charset=utf-8";
const HTML: &str = "text/html; charset=utf-8";

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Bind the listener without serving yet.
///
/// Binding to port `0` picks a free port; read it back with
/// `server.server_addr()`.
pub fn bind(addr: &str) -> Result<Server> {
    Server::http(addr).map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))
}

/// Serve `dashboard` on `addr` with `workers` threads. Blocks until every
/// worker exits, which in practice means until the process is killed.
pub fn serve(dashboard: Dashboard, addr: &str, workers: usize) -> Result<()> {
    let server = bind(addr)?;
    tracing::info!(message = "dashboard listening", address = %addr, workers = workers);
    run(server, Arc::new(dashboard), workers)
}

/// Run worker threads over an already-bound listener.
///
/// A panic inside a handler is answered with a 500 and the worker keeps
/// serving. If a worker thread still dies, `run` reports it as an error
/// once the others have exited.
pub fn run(server: Server, dashboard: Arc<Dashboard>, workers: usize) -> Result<()> {
    let server = Arc::new(server);

    let count = workers.max(1);
    let mut workers = Vec::with_capacity(count);
    for id in 0..count {
        let server = Arc::clone(&server);
        let dashboard = Arc::clone(&dashboard);
        let worker = thread::Builder::new()
            .name(format!("http-worker-{id}"))
            .spawn(move || {
                for request in server.incoming_requests() {
                    handle(request, &dashboard);
                }
            })
            .context("failed to spawn HTTP worker")?;
        workers.push(worker);
    }

    let mut crashed = 0;
    for worker in workers {
        if worker.join().is_err() {
            tracing::error!(message = "HTTP worker panicked");
            crashed += 1;
        }
    }

    anyhow::ensure!(crashed == 0, "{crashed} of {count} HTTP workers panicked");
    Ok(())
}

/// Answer a single request and write an access log line.
fn handle(request: Request, dashboard: &Dashboard) {
    let started = Instant::now();
    let method = request.method().clone();
    let url = request.url().to_string();

    let reply = respond(&method, &url, dashboard, Utc::now());
    let status = reply.status;

    if let Err(e) = request.respond(reply.into_response()) {
        tracing::warn!(message = "failed to write response", path = %url, error = %e);
    }

    tracing::info!(
        message = "request",
        method = %method,
        path = %url,
        status = status,
        elapsed_ms = started.elapsed().as_millis() as u64,
    );
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// [`dispatch`], turning a handler panic into a 500.
pub(crate) fn respond(method: &Method, url: &str, dashboard: &Dashboard, now: DateTime<Utc>) -> Reply {
    panic::catch_unwind(AssertUnwindSafe(|| dispatch(method, url, dashboard, now))).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_default();
        tracing::error!(message = "handler panicked", method = %method, path = %url, reason = %reason);
        Reply::internal_error()
    })
}

/// Dispatch an incoming request to the appropriate handler.
pub(crate) fn dispatch(method: &Method, url: &str, dashboard: &Dashboard, now: DateTime<Utc>) -> Reply {
    // Strip query string for path matching
    let path = url.split('?').next().unwrap_or(url);

    let result = match (method, path) {
        (&Method::Get, "/") | (&Method::Get, "/index.html") => Ok(page::render_dashboard(dashboard, now)),
        (&Method::Get, "/latest.json") => api::get_latest(dashboard, now),
        (&Method::Get, "/health") => api::get_health(dashboard),
        _ => Ok(Reply::not_found()),
    };

    result.unwrap_or_else(|e| Reply::from_error(&e))
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// A finished response, independent of the transport.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: JSON,
            body: body.into_bytes(),
        }
    }

    pub fn html(body: String) -> Self {
        Self {
            status: 200,
            content_type: HTML,
            body: body.into_bytes(),
        }
    }

    fn not_found() -> Self {
        Self::json(404, r#"{"error": "not found"}"#.to_string())
    }

    fn internal_error() -> Self {
        Self::json(500, r#"{"error": "internal error"}"#.to_string())
    }

    /// Map an error to a JSON body; store errors keep their own status.
    fn from_error(err: &anyhow::Error) -> Self {
        let status = err
            .downcast_ref::<FactError>()
            .map(FactError::status_code)
            .unwrap_or(500);
        tracing::error!(message = "request failed", status = status, error = %err);
        Self::json(status, serde_json::json!({ "error": err.to_string() }).to_string())
    }

    fn into_response(self) -> Response<Cursor<Vec<u8>>> {
        let mut response = Response::from_data(self.body).with_status_code(StatusCode(self.status));
        if let Ok(header) = Header::from_bytes("Content-Type", self.content_type) {
            response = response.with_header(header);
        }
        response
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
