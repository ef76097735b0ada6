//! Gateway-local endpoints.
//!
//! These are served by the gateway itself and never forwarded: its own
//! health, descriptive info, the service listing, the registry dump and the
//! manual health-check trigger.

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;

use self::handlers::*;
use crate::http::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(gateway_health))
        .route("/api/v1/info", get(info_v1))
        .route("/api/v2/info", get(info_v2))
        .route("/api/v2/services", get(list_services))
        .route("/api/v2/services/registry", get(service_registry))
        .route("/api/v2/services/{name}/health-check", post(trigger_health_check))
}
