//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::registry::ServiceEndpoint;

/// Root configuration for the API gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Host used for every service that does not set its own.
    pub default_host: String,

    /// Backend service definitions.
    pub services: Vec<ServiceConfig>,

    /// Ordered prefix rules mapping inbound paths to services.
    pub routes: Vec<RouteConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeouts for forwarded calls.
    pub timeouts: TimeoutConfig,

    /// Per-service HTTP client pool sizing.
    pub http_pool: HttpPoolConfig,

    /// Per-service RPC channel settings.
    pub rpc: RpcConfig,

    /// Startup gating policy.
    pub startup: StartupConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            default_host: "localhost".to_string(),
            services: default_services(),
            routes: default_routes(),
            health_check: HealthCheckConfig::default(),
            timeouts: TimeoutConfig::default(),
            http_pool: HttpPoolConfig::default(),
            rpc: RpcConfig::default(),
            startup: StartupConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Resolve the configured services into immutable endpoints.
    pub fn endpoints(&self) -> Vec<ServiceEndpoint> {
        self.services
            .iter()
            .map(|svc| svc.to_endpoint(&self.default_host))
            .collect()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Maximum inbound body size buffered for forwarding, in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// Backend service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique service name (registry key).
    pub name: String,

    /// Service host. Falls back to `default_host`.
    #[serde(default)]
    pub host: Option<String>,

    /// gRPC port. No RPC channel is opened when unset.
    #[serde(default)]
    pub grpc_port: Option<u16>,

    /// HTTP port. No HTTP client is opened when unset.
    #[serde(default)]
    pub http_port: Option<u16>,

    /// Whether a failed initial connection aborts startup.
    #[serde(default)]
    pub required: bool,

    /// Human readable name used in error messages ("AI Kernel").
    #[serde(default)]
    pub display_name: Option<String>,

    /// Short description for the services listing.
    #[serde(default)]
    pub description: Option<String>,
}

impl ServiceConfig {
    fn builtin(
        name: &str,
        display_name: &str,
        description: &str,
        grpc_port: u16,
        http_port: u16,
        required: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            host: None,
            grpc_port: Some(grpc_port),
            http_port: Some(http_port),
            required,
            display_name: Some(display_name.to_string()),
            description: Some(description.to_string()),
        }
    }

    /// Build the immutable endpoint for this service.
    pub fn to_endpoint(&self, default_host: &str) -> ServiceEndpoint {
        ServiceEndpoint {
            name: self.name.clone(),
            host: self
                .host
                .clone()
                .unwrap_or_else(|| default_host.to_string()),
            grpc_port: self.grpc_port,
            http_port: self.http_port,
            required: self.required,
            display_name: self.display_name.clone().unwrap_or_else(|| self.name.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| "Backend microservice".to_string()),
        }
    }
}

fn default_services() -> Vec<ServiceConfig> {
    vec![
        ServiceConfig::builtin("ai-kernel", "AI Kernel", "Central AI orchestration and reasoning engine", 50051, 8001, true),
        ServiceConfig::builtin("identity", "Identity", "Authentication and user management", 50052, 8002, true),
        ServiceConfig::builtin("cv-engine", "CV Engine", "Extended CV and portfolio generation", 50053, 8003, true),
        ServiceConfig::builtin("conversational", "Conversational", "AI Copilot and chat functionality", 50054, 8004, false),
        ServiceConfig::builtin("analytics", "Analytics", "Data processing and insights", 50055, 8005, false),
        ServiceConfig::builtin("automation", "Automation", "Workflow and network automation", 50056, 8006, false),
        ServiceConfig::builtin("vision", "Vision", "Computer vision and media processing", 50057, 8007, false),
        ServiceConfig::builtin("plugin", "Plugin", "Plugin management and extensibility", 50058, 8008, false),
    ]
}

/// Prefix rule mapping inbound paths to a backend service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Inbound path prefix, including the trailing slash.
    pub prefix: String,

    /// Target service name.
    pub service: String,

    /// Prefix prepended to the remainder of the path upstream.
    pub upstream_prefix: String,

    /// Forces the upstream method. The inbound method is kept when unset.
    #[serde(default)]
    pub method: Option<String>,
}

impl RouteConfig {
    pub fn new(prefix: &str, service: &str, upstream_prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            service: service.to_string(),
            upstream_prefix: upstream_prefix.to_string(),
            method: None,
        }
    }
}

fn default_routes() -> Vec<RouteConfig> {
    vec![
        RouteConfig::new("/api/v1/ai/", "ai-kernel", "/api/v2/ai/"),
        RouteConfig::new("/api/v2/ai/", "ai-kernel", "/api/v2/ai/"),
        RouteConfig::new("/api/v1/auth/", "identity", "/api/v1/auth/"),
        RouteConfig::new("/api/v1/users/", "identity", "/api/v1/users/"),
        RouteConfig::new("/api/v1/cv/", "cv-engine", "/api/v1/cv/"),
        RouteConfig::new("/api/v2/cv/", "cv-engine", "/api/v1/cv/"),
        RouteConfig::new("/api/v1/analytics/", "analytics", "/api/v1/analytics/"),
        RouteConfig::new("/api/v2/analytics/", "analytics", "/api/v1/analytics/"),
    ]
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the periodic sweep. Startup and manual checks always run.
    pub enabled: bool,

    /// Sweep interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Path probed on each service's HTTP port.
    pub path: String,

    /// Consecutive failures before a service is marked unhealthy.
    pub failure_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
            path: "/health".to_string(),
            failure_threshold: 3,
        }
    }
}

/// Timeout configuration for forwarded calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            request_secs: 30,
        }
    }
}

/// HTTP client pool sizing, per service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpPoolConfig {
    /// Maximum concurrent in-flight forwarded requests.
    pub max_connections: usize,

    /// Maximum idle keep-alive connections kept open.
    pub max_idle_connections: usize,
}

impl Default for HttpPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
            max_idle_connections: 20,
        }
    }
}

/// RPC channel configuration, per service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Open RPC channels at all.
    pub enabled: bool,

    /// HTTP/2 keepalive ping interval in seconds.
    pub keepalive_interval_secs: u64,

    /// Keepalive ping acknowledgement timeout in seconds.
    pub keepalive_timeout_secs: u64,

    /// Send keepalive pings while no calls are in flight.
    pub keepalive_while_idle: bool,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keepalive_interval_secs: 30,
            keepalive_timeout_secs: 5,
            keepalive_while_idle: true,
        }
    }
}

/// Startup gating policy.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Abort startup when a required service is not healthy after the
    /// initial sweep. When false the gateway starts degraded.
    pub fail_on_unhealthy_required: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
