//! Single health check against one service.
//!
//! A probe runs two steps in order and fails if either fails:
//! 1. RPC readiness over the held channel, when the service has one
//! 2. `GET /health` on the HTTP client, when it has one; anything but 200
//!    is a failure
//!
//! Both steps are bounded by the probe timeout. Timeouts are reported as
//! their own error kind.

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use thiserror::Error;
use tokio::time;

use crate::upstream::{ConnectionHandle, StatusCheckError};

/// Why a probe failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("health check timed out after {0:?}")]
    Timeout(Duration),

    #[error("gRPC channel not ready: {0}")]
    RpcUnavailable(String),

    #[error("health endpoint unreachable: {0}")]
    Transport(String),

    #[error("health endpoint returned {0}")]
    Status(StatusCode),

    #[error("health path cannot be resolved: {0}")]
    InvalidPath(String),
}

impl ProbeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout(_))
    }
}

/// Outcome of one probe.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub success: bool,
    pub latency: Duration,
    pub error: Option<ProbeError>,
}

impl ProbeResult {
    fn ok(latency: Duration) -> Self {
        Self {
            success: true,
            latency,
            error: None,
        }
    }

    fn failed(latency: Duration, error: ProbeError) -> Self {
        Self {
            success: false,
            latency,
            error: Some(error),
        }
    }
}

/// Health probe with a fixed path and timeout.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    path: String,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe one service.
    pub async fn check(&self, handle: &ConnectionHandle) -> ProbeResult {
        let start = Instant::now();
        match self.run(handle).await {
            Ok(()) => ProbeResult::ok(start.elapsed()),
            Err(e) => ProbeResult::failed(start.elapsed(), e),
        }
    }

    async fn run(&self, handle: &ConnectionHandle) -> Result<(), ProbeError> {
        if let Some(rpc) = handle.rpc() {
            match time::timeout(self.timeout, rpc.ready()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(ProbeError::RpcUnavailable(e.to_string())),
                Err(_) => return Err(ProbeError::Timeout(self.timeout)),
            }
        }

        if let Some(http) = handle.http() {
            match http.get_status(&self.path, self.timeout).await {
                Ok(StatusCode::OK) => {}
                Ok(status) => return Err(ProbeError::Status(status)),
                Err(StatusCheckError::Path(e)) => return Err(ProbeError::InvalidPath(e.to_string())),
                Err(StatusCheckError::Request(e)) if e.is_timeout() => return Err(ProbeError::Timeout(self.timeout)),
                Err(StatusCheckError::Request(e)) => return Err(ProbeError::Transport(e.to_string())),
            }
        }

        Ok(())
    }
}
