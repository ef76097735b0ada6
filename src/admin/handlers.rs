use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::http::response::detail;
use crate::http::server::AppState;
use crate::registry::{RegistryError, ServiceEndpoint, ServiceRecord, ServiceStatus};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NOT_INITIALIZED: &str = "not_initialized";

/// One configured service and its registry record, if registered.
struct ServiceView {
    endpoint: Arc<ServiceEndpoint>,
    record: Option<ServiceRecord>,
}

impl ServiceView {
    fn status(&self) -> &'static str {
        self.record
            .as_ref()
            .map_or(NOT_INITIALIZED, |r| r.status.as_str())
    }

    fn last_health_check(&self) -> Option<DateTime<Utc>> {
        self.record.as_ref().and_then(|r| r.last_health_check)
    }

    fn failures(&self) -> u32 {
        self.record.as_ref().map_or(0, |r| r.consecutive_failures)
    }
}

/// Configured services in declared order.
fn service_views(state: &AppState) -> Vec<ServiceView> {
    let snapshot = state.registry.snapshot();
    state
        .config
        .services
        .iter()
        .map(|service| match snapshot.get(&service.name) {
            Some(record) => ServiceView {
                endpoint: record.endpoint.clone(),
                record: Some(record.clone()),
            },
            None => ServiceView {
                endpoint: Arc::new(service.to_endpoint(&state.config.default_host)),
                record: None,
            },
        })
        .collect()
}

fn service_names(state: &AppState) -> Vec<String> {
    state.config.services.iter().map(|s| s.name.clone()).collect()
}

fn uptime_secs(started_at: DateTime<Utc>) -> f64 {
    (Utc::now() - started_at).num_milliseconds() as f64 / 1000.0
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub status: &'static str,
    pub host: String,
    pub grpc_port: Option<u16>,
    pub http_port: Option<u16>,
    pub last_health_check: Option<DateTime<Utc>>,
    pub health_check_failures: u32,
    pub required: bool,
}

#[derive(Serialize)]
pub struct GatewayHealth {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime: f64,
    pub timestamp: DateTime<Utc>,
    pub services: BTreeMap<String, ServiceHealth>,
}

pub async fn gateway_health(State(state): State<AppState>) -> Json<GatewayHealth> {
    let services = service_views(&state)
        .into_iter()
        .map(|view| {
            let health = ServiceHealth {
                status: view.status(),
                host: view.endpoint.host.clone(),
                grpc_port: view.endpoint.grpc_port,
                http_port: view.endpoint.http_port,
                last_health_check: view.last_health_check(),
                health_check_failures: view.failures(),
                required: view.endpoint.required,
            };
            (view.endpoint.name.clone(), health)
        })
        .collect();

    Json(GatewayHealth {
        status: "healthy",
        service: "api-gateway",
        version: VERSION,
        uptime: uptime_secs(state.started_at),
        timestamp: Utc::now(),
        services,
    })
}

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "API Gateway",
        "description": "Unified HTTP entry point for the platform's microservices",
        "version": VERSION,
        "health": "/health",
        "services": service_names(&state),
    }))
}

pub async fn info_v1(State(state): State<AppState>) -> Json<Value> {
    let microservices: BTreeMap<String, Value> = service_views(&state)
        .into_iter()
        .map(|view| {
            let entry = json!({
                "host": view.endpoint.host,
                "grpc_port": view.endpoint.grpc_port,
                "http_port": view.endpoint.http_port,
                "status": view.status(),
                "required": view.endpoint.required,
            });
            (view.endpoint.name.clone(), entry)
        })
        .collect();

    Json(json!({
        "name": "API Gateway",
        "version": VERSION,
        "description": "Microservices-based platform gateway",
        "uptime": uptime_secs(state.started_at),
        "start_time": state.started_at,
        "endpoints": {
            "health": "/health",
            "info": "/api/v1/info",
            "services": "/api/v2/services",
            "registry": "/api/v2/services/registry",
        },
        "microservices": microservices,
    }))
}

pub async fn info_v2(State(state): State<AppState>) -> Json<Value> {
    let routes: Vec<Value> = state
        .config
        .routes
        .iter()
        .map(|r| json!({ "prefix": r.prefix, "service": r.service }))
        .collect();

    Json(json!({
        "name": "API Gateway v2",
        "version": VERSION,
        "architecture": "Microservices",
        "communication": "gRPC + REST",
        "services": service_names(&state),
        "routes": routes,
    }))
}

#[derive(Serialize)]
pub struct ServiceListing {
    pub description: String,
    pub host: String,
    pub grpc_port: Option<u16>,
    pub http_port: Option<u16>,
    pub status: &'static str,
    pub required: bool,
}

pub async fn list_services(State(state): State<AppState>) -> Json<Value> {
    let services: BTreeMap<String, ServiceListing> = service_views(&state)
        .into_iter()
        .map(|view| {
            let listing = ServiceListing {
                description: view.endpoint.description.clone(),
                host: view.endpoint.host.clone(),
                grpc_port: view.endpoint.grpc_port,
                http_port: view.endpoint.http_port,
                status: view.status(),
                required: view.endpoint.required,
            };
            (view.endpoint.name.clone(), listing)
        })
        .collect();

    Json(json!({ "services": services }))
}

#[derive(Serialize)]
pub struct RegistryEntry {
    pub name: String,
    pub host: String,
    pub grpc_port: Option<u16>,
    pub http_port: Option<u16>,
    pub status: &'static str,
    pub last_health_check: Option<DateTime<Utc>>,
    pub health_check_failures: u32,
    pub grpc_connected: bool,
    pub http_connected: bool,
    pub required: bool,
}

#[derive(Serialize)]
pub struct RegistryDump {
    pub total_services: usize,
    pub healthy_services: usize,
    pub unhealthy_services: usize,
    pub services: BTreeMap<String, RegistryEntry>,
}

pub async fn service_registry(State(state): State<AppState>) -> Json<RegistryDump> {
    let views = service_views(&state);
    let count = |status: ServiceStatus| {
        views
            .iter()
            .filter(|v| v.record.as_ref().is_some_and(|r| r.status == status))
            .count()
    };
    let healthy_services = count(ServiceStatus::Healthy);
    let unhealthy_services = count(ServiceStatus::Unhealthy);

    let services: BTreeMap<String, RegistryEntry> = views
        .iter()
        .map(|view| {
            let name = view.endpoint.name.clone();
            let entry = RegistryEntry {
                name: name.clone(),
                host: view.endpoint.host.clone(),
                grpc_port: view.endpoint.grpc_port,
                http_port: view.endpoint.http_port,
                status: view.status(),
                last_health_check: view.last_health_check(),
                health_check_failures: view.failures(),
                grpc_connected: state.pool.has_rpc(&name),
                http_connected: state.pool.has_http(&name),
                required: view.endpoint.required,
            };
            (name, entry)
        })
        .collect();

    Json(RegistryDump {
        total_services: services.len(),
        healthy_services,
        unhealthy_services,
        services,
    })
}

pub async fn trigger_health_check(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.supervisor.check_one(&name).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(RegistryError::UnknownService(name)) => {
            detail(StatusCode::NOT_FOUND, format!("Service {name} not found"))
        }
        Err(e) => {
            tracing::error!(service = %name, error = %e, "Manual health check failed");
            detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
