//! Periodic and on-demand health checking.
//!
//! # Responsibilities
//! - Sweep every registered service on a fixed interval
//! - Run a single check on demand (admin endpoint)
//! - Feed both into the registry through one recording path

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::{HealthProbe, ProbeResult};
use crate::observability::metrics;
use crate::registry::{RegistryError, ServiceRegistry, ServiceStatus};
use crate::upstream::ConnectionPool;

/// Result of checking one service, as returned by the manual trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub service: String,
    pub status: ServiceStatus,
    pub message: String,
}

/// Totals from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub healthy: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SweepSummary {
    pub fn all_healthy(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

enum Checked {
    Healthy,
    Failed,
    Skipped,
}

/// Drives health probes and records their results.
pub struct HealthSupervisor {
    registry: Arc<ServiceRegistry>,
    pool: Arc<ConnectionPool>,
    probe: HealthProbe,
    failure_threshold: u32,
    interval: Duration,
    enabled: bool,
}

impl HealthSupervisor {
    pub fn new(registry: Arc<ServiceRegistry>, pool: Arc<ConnectionPool>, config: &HealthCheckConfig) -> Self {
        Self {
            registry,
            pool,
            probe: HealthProbe::new(config.path.clone(), Duration::from_secs(config.timeout_secs)),
            failure_threshold: config.failure_threshold,
            interval: Duration::from_secs(config.interval_secs),
            enabled: config.enabled,
        }
    }

    /// Probe every registered service concurrently.
    pub async fn sweep(&self) -> SweepSummary {
        let names = self.registry.names();
        let results = join_all(names.iter().map(|name| self.check(name))).await;

        let mut summary = SweepSummary::default();
        for result in results {
            match result {
                Ok((Checked::Healthy, _)) => summary.healthy += 1,
                Ok((Checked::Failed, _)) => summary.failed += 1,
                Ok((Checked::Skipped, _)) => summary.skipped += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "Service disappeared during sweep");
                    summary.skipped += 1;
                }
            }
        }

        tracing::debug!(
            healthy = summary.healthy,
            failed = summary.failed,
            skipped = summary.skipped,
            "Health sweep complete"
        );
        summary
    }

    /// Check one service now.
    pub async fn check_one(&self, name: &str) -> Result<CheckOutcome, RegistryError> {
        let (_, outcome) = self.check(name).await?;
        Ok(outcome)
    }

    async fn check(&self, name: &str) -> Result<(Checked, CheckOutcome), RegistryError> {
        if !self.registry.contains(name) {
            return Err(RegistryError::UnknownService(name.to_string()));
        }

        let Some(handle) = self.pool.get(name) else {
            tracing::debug!(service = %name, "No connection established, skipping health check");
            let status = self
                .registry
                .status(name)
                .ok_or_else(|| RegistryError::UnknownService(name.to_string()))?;
            return Ok((
                Checked::Skipped,
                CheckOutcome {
                    service: name.to_string(),
                    status,
                    message: format!("Health check skipped for {name}: no connection established"),
                },
            ));
        };

        let result = self.probe.check(&handle).await;
        let status = self.record(name, &result)?;

        let outcome = match &result.error {
            None => (
                Checked::Healthy,
                CheckOutcome {
                    service: name.to_string(),
                    status,
                    message: format!("Health check completed for {name}"),
                },
            ),
            Some(e) => (
                Checked::Failed,
                CheckOutcome {
                    service: name.to_string(),
                    status,
                    message: format!("Health check failed for {name}: {e}"),
                },
            ),
        };
        Ok(outcome)
    }

    /// Apply a probe result to the registry.
    fn record(&self, name: &str, result: &ProbeResult) -> Result<ServiceStatus, RegistryError> {
        let now = Utc::now();
        metrics::record_probe(name, result.success, result.latency);

        let record = if result.success {
            let record = self.registry.record_success(name, now)?;
            tracing::info!(
                service = %name,
                response_time = ?result.latency,
                "Service is healthy"
            );
            record
        } else {
            let record = self.registry.record_failure(name, now, self.failure_threshold)?;
            let error = result
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default();
            if record.status == ServiceStatus::Unhealthy {
                tracing::error!(
                    service = %name,
                    failures = record.consecutive_failures,
                    error = %error,
                    "Service marked as unhealthy"
                );
            } else {
                tracing::warn!(
                    service = %name,
                    failures = record.consecutive_failures,
                    threshold = self.failure_threshold,
                    error = %error,
                    "Health check failed"
                );
            }
            record
        };

        metrics::record_service_health(name, record.is_healthy());
        Ok(record.status)
    }

    /// Run the periodic sweep until shutdown.
    ///
    /// The first sweep happens one interval after the call; the startup sweep
    /// is run separately before traffic is accepted.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        if !self.enabled {
            tracing::info!("Periodic health checks disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            path = %self.probe.path(),
            "Health supervisor starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health supervisor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
