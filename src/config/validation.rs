//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics and returns every
//! problem found, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::Method;
use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address {0:?}")]
    BindAddress(String),

    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),

    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("duplicate service {0:?}")]
    DuplicateService(String),

    #[error("service {0:?} has neither a gRPC nor an HTTP port")]
    NoTransport(String),

    #[error("service {0:?} uses port 0")]
    ZeroPort(String),

    #[error("route prefix {0:?} must start with '/'")]
    RoutePrefix(String),

    #[error("route {prefix:?} has an invalid upstream prefix {upstream:?}")]
    UpstreamPrefix { prefix: String, upstream: String },

    #[error("route {prefix:?} has an invalid method override {method:?}")]
    RouteMethod { prefix: String, method: String },

    #[error("health_check.{0} must be greater than zero")]
    HealthCheck(&'static str),

    #[error("timeouts.{0} must be greater than zero")]
    Timeout(&'static str),

    #[error("http_pool.max_connections must be greater than zero")]
    PoolSize,
}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for service in &config.services {
        if service.name.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceName);
            continue;
        }
        if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        if service.grpc_port.is_none() && service.http_port.is_none() {
            errors.push(ValidationError::NoTransport(service.name.clone()));
        }
        if service.grpc_port == Some(0) || service.http_port == Some(0) {
            errors.push(ValidationError::ZeroPort(service.name.clone()));
        }
    }

    for route in &config.routes {
        if !route.prefix.starts_with('/') {
            errors.push(ValidationError::RoutePrefix(route.prefix.clone()));
        }
        if !valid_upstream_prefix(&route.upstream_prefix) {
            errors.push(ValidationError::UpstreamPrefix {
                prefix: route.prefix.clone(),
                upstream: route.upstream_prefix.clone(),
            });
        }
        if let Some(method) = &route.method {
            if Method::from_bytes(method.as_bytes()).is_err() {
                errors.push(ValidationError::RouteMethod {
                    prefix: route.prefix.clone(),
                    method: method.clone(),
                });
            }
        }
    }

    let hc = &config.health_check;
    if hc.interval_secs == 0 {
        errors.push(ValidationError::HealthCheck("interval_secs"));
    }
    if hc.timeout_secs == 0 {
        errors.push(ValidationError::HealthCheck("timeout_secs"));
    }
    if hc.failure_threshold == 0 {
        errors.push(ValidationError::HealthCheck("failure_threshold"));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Timeout("connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Timeout("request_secs"));
    }
    if config.http_pool.max_connections == 0 {
        errors.push(ValidationError::PoolSize);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A rooted, non-root directory path with no empty or dot segments, so the
/// forwarded path can never name another host or climb above it.
fn valid_upstream_prefix(prefix: &str) -> bool {
    let Some(inner) = prefix
        .strip_prefix('/')
        .and_then(|p| p.strip_suffix('/'))
    else {
        return false;
    };
    !inner.is_empty()
        && !inner.contains('\\')
        && inner
            .split('/')
            .all(|segment| !matches!(segment, "" | "." | ".."))
}
