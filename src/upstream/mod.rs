//! Upstream connection subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ServiceEndpoint[] → pool.rs connect()
//!         → connection.rs: RpcChannel (tonic, lazy) + HttpClient (reqwest)
//!         → required endpoint fails → abort startup
//!
//! Forwarding (routing/router.rs):
//!     UpstreamRequest → Upstream::forward(service)
//!         → HttpClient::send (permit, timeout)
//!         → UpstreamResponse | ForwardError
//!
//! Probing (health/probe.rs):
//!     ConnectionHandle → RpcChannel::ready + HttpClient::get_status
//! ```
//!
//! # Design Decisions
//! - One handle per service, opened at startup, closed at shutdown
//! - Reconnection is left to tonic/reqwest; handles are never rebuilt
//! - Forwarding sits behind the `Upstream` trait so routing can be tested
//!   without sockets

pub mod connection;
pub mod pool;

use std::future::Future;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use thiserror::Error;

pub use connection::{
    ConnectError, ConnectionHandle, ConnectionSettings, HttpClient, RpcChannel, RpcReadyError, StatusCheckError,
};
pub use pool::ConnectionPool;

/// A request re-targeted at a backend service.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    /// Rewritten path, including the query string when present.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A fully buffered backend response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Transport-level forwarding failure.
#[derive(Debug, Clone, Error)]
pub enum ForwardError {
    #[error("upstream request timed out")]
    Timeout,

    #[error("no HTTP client for service {0:?}")]
    NoClient(String),

    #[error("upstream transport error: {0}")]
    Transport(String),
}

impl ForwardError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ForwardError::Timeout)
    }
}

impl From<reqwest::Error> for ForwardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ForwardError::Timeout
        } else {
            ForwardError::Transport(err.to_string())
        }
    }
}

/// Headers that describe one hop and are never relayed, plus the ones the
/// client recomputes for the rewritten request.
const HOP_BY_HOP: [&str; 10] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Remove hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Something that can deliver a request to a named backend service.
pub trait Upstream: Send + Sync + 'static {
    fn forward(
        &self,
        service: &str,
        request: UpstreamRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, ForwardError>> + Send;
}
