//! Local HTTP server for range-request tests.
//!
//! Serves in-memory files under `/{name}`. With range support enabled a
//! `Range: bytes=a-b` request gets a 206 with the requested slice; otherwise
//! the whole body comes back with 200, like a server that ignores ranges. A
//! misaligned server answers 206 one byte after the requested start.
//! `/slow/{name}` waits before answering so timeouts can be exercised.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How long `/slow/{name}` sleeps before responding
pub const SLOW_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeMode {
    Honour,
    Ignore,
    Misaligned,
}

struct ServerState {
    files: HashMap<String, Bytes>,
    mode: RangeMode,
    requests: AtomicUsize,
}

/// A running server bound to an ephemeral localhost port.
///
/// The server task is aborted when the handle is dropped.
pub struct RangeServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    handle: JoinHandle<()>,
}

impl RangeServer {
    /// Serve `files` with range support
    pub async fn spawn<I, N>(files: I) -> Self
    where
        I: IntoIterator<Item = (N, Vec<u8>)>,
        N: Into<String>,
    {
        Self::start(files, RangeMode::Honour).await
    }

    /// Serve `files`, always answering 200 with the full body
    pub async fn spawn_ignoring_ranges<I, N>(files: I) -> Self
    where
        I: IntoIterator<Item = (N, Vec<u8>)>,
        N: Into<String>,
    {
        Self::start(files, RangeMode::Ignore).await
    }

    /// Serve `files`, answering range requests from the wrong offset
    pub async fn spawn_misaligned_ranges<I, N>(files: I) -> Self
    where
        I: IntoIterator<Item = (N, Vec<u8>)>,
        N: Into<String>,
    {
        Self::start(files, RangeMode::Misaligned).await
    }

    async fn start<I, N>(files: I, mode: RangeMode) -> Self
    where
        I: IntoIterator<Item = (N, Vec<u8>)>,
        N: Into<String>,
    {
        let state = Arc::new(ServerState {
            files: files.into_iter().map(|(name, body)| (name.into(), Bytes::from(body))).collect(),
            mode,
            requests: AtomicUsize::new(0),
        });

        let router = Router::new()
            .route("/{name}", get(serve_file))
            .route("/slow/{name}", get(serve_slow))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test server");
        let addr = listener.local_addr().expect("test server has no local address");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("test server stopped: {}", e);
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// URL of a served file
    pub fn url(&self, name: &str) -> String {
        format!("http://{}/{}", self.addr, name)
    }

    /// URL of a served file that answers only after [`SLOW_DELAY`]
    pub fn slow_url(&self, name: &str) -> String {
        format!("http://{}/slow/{}", self.addr, name)
    }

    /// Requests received so far, across all routes
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }
}

impl Drop for RangeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_slow(
    state: State<Arc<ServerState>>,
    name: Path<String>,
    headers: HeaderMap,
) -> Response {
    tokio::time::sleep(SLOW_DELAY).await;
    serve_file(state, name, headers).await
}

async fn serve_file(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);

    let Some(body) = state.files.get(&name) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let len = body.len() as u64;

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_range)
        .filter(|_| state.mode != RangeMode::Ignore);

    let Some((start, end)) = range else {
        return (StatusCode::OK, body.clone()).into_response();
    };

    let start = if state.mode == RangeMode::Misaligned { start + 1 } else { start };
    let end = end.map_or(len.saturating_sub(1), |end| end.min(len.saturating_sub(1)));
    if start >= len || end < start {
        return (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{}", len))],
        )
            .into_response();
    }

    tracing::debug!(file = %name, start, end, "serving range");

    (
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, len)),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
        body.slice(start as usize..=end as usize),
    )
        .into_response()
}

/// `bytes=a-b` or `bytes=a-`; suffix and multi-part ranges are not supported
fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let range = value.strip_prefix("bytes=")?;
    let (start, end) = range.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = match end.trim() {
        "" => None,
        end => Some(end.parse().ok()?),
    };
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("bytes=0-99"), Some((0, Some(99))));
        assert_eq!(parse_range("bytes=100-"), Some((100, None)));
        assert_eq!(parse_range("bytes=-5"), None);
        assert_eq!(parse_range("items=0-1"), None);
    }
}
