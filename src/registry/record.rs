//! Service health state machine.
//!
//! # States
//! - Starting: registered, not probed yet
//! - Healthy: last probe succeeded, receives traffic
//! - Disconnected: failing, below the threshold
//! - Unhealthy: failed `threshold` times in a row
//!
//! # State Transitions
//! ```text
//! any → Healthy:        one successful probe (failures reset to 0)
//! any → Disconnected:   failed probe, failures < threshold
//! any → Unhealthy:      failed probe, failures >= threshold
//! ```
//!
//! # Invariants
//! - `consecutive_failures == 0` whenever status is Healthy
//! - `consecutive_failures >= threshold` whenever status is Unhealthy

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::registry::endpoint::ServiceEndpoint;

/// Health status of one backend service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Starting,
    Healthy,
    Disconnected,
    Unhealthy,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Starting => "starting",
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Disconnected => "disconnected",
            ServiceStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable health state of one service, owned by the registry.
#[derive(Debug, Clone)]
pub struct ServiceRecord {
    pub endpoint: Arc<ServiceEndpoint>,
    pub status: ServiceStatus,
    pub last_health_check: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl ServiceRecord {
    /// New record in the `Starting` state.
    pub fn new(endpoint: Arc<ServiceEndpoint>) -> Self {
        Self {
            endpoint,
            status: ServiceStatus::Starting,
            last_health_check: None,
            consecutive_failures: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.endpoint.name
    }

    pub fn is_healthy(&self) -> bool {
        self.status == ServiceStatus::Healthy
    }

    pub(crate) fn apply_success(&mut self, at: DateTime<Utc>) {
        self.status = ServiceStatus::Healthy;
        self.consecutive_failures = 0;
        self.last_health_check = Some(at);
    }

    pub(crate) fn apply_failure(&mut self, at: DateTime<Utc>, threshold: u32) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_health_check = Some(at);
        self.status = if self.consecutive_failures >= threshold {
            ServiceStatus::Unhealthy
        } else {
            ServiceStatus::Disconnected
        };
    }
}
