//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, service
//! - `gateway_request_duration_seconds` (histogram): latency per service
//! - `gateway_probe_duration_seconds` (histogram): probe latency per service
//! - `gateway_probe_failures_total` (counter): failed probes per service
//! - `gateway_service_healthy` (gauge): 1=healthy, 0=not healthy
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Local endpoints are labelled `service="gateway"`

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Label used for requests served by the gateway itself.
pub const LOCAL_SERVICE: &str = "gateway";

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one completed client request.
pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "service" => service.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "service" => service.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record one probe result.
pub fn record_probe(service: &str, success: bool, latency: Duration) {
    histogram!("gateway_probe_duration_seconds", "service" => service.to_string()).record(latency.as_secs_f64());
    if !success {
        counter!("gateway_probe_failures_total", "service" => service.to_string()).increment(1);
    }
}

pub fn record_service_health(service: &str, healthy: bool) {
    gauge!("gateway_service_healthy", "service" => service.to_string()).set(if healthy { 1.0 } else { 0.0 });
}
