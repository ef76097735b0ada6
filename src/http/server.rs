//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with local endpoints and the routing middleware
//! - Wire up middleware (tracing, body limit, request ID, access log)
//! - Serve on a listener until the shutdown signal fires

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::config::GatewayConfig;
use crate::health::HealthSupervisor;
use crate::http::request::{access_log, MakeRequestUuidV4, RoutedService};
use crate::http::response::{detail, relay};
use crate::registry::ServiceRegistry;
use crate::routing::Router as ServiceRouter;
use crate::upstream::ConnectionPool;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ServiceRouter<ConnectionPool>>,
    pub registry: Arc<ServiceRegistry>,
    pub pool: Arc<ConnectionPool>,
    pub supervisor: Arc<HealthSupervisor>,
    pub config: Arc<GatewayConfig>,
    pub started_at: DateTime<Utc>,
}

/// HTTP front end of the gateway.
pub struct HttpServer {
    app: axum::Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let app = Self::build_router(state);
        Self { app }
    }

    /// The fully layered application, for driving without a socket.
    pub fn app(&self) -> axum::Router {
        self.app.clone()
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Outermost first: request ID, trace span, body limit (with its
    /// rejection rendered as JSON), access log,
    /// routing middleware, then local handlers.
    fn build_router(state: AppState) -> axum::Router {
        let max_body_size = state.config.listener.max_body_size;

        admin::routes()
            .fallback(not_found)
            .layer(middleware::from_fn_with_state(state.clone(), route_request))
            .layer(middleware::from_fn(access_log))
            .layer(RequestBodyLimitLayer::new(max_body_size))
            .layer(middleware::map_response(json_body_limit))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
            .with_state(state)
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server stopping, no longer accepting connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Dispatch routed prefixes to their backend; everything else falls through
/// to the local handlers.
async fn route_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(service) = state.router.service_for(request.uri().path()).map(str::to_string) else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.config.listener.max_body_size).await {
        Ok(body) => body,
        Err(e) if is_length_limit(&e) => {
            tracing::warn!(service = %service, "Request body exceeds limit");
            return detail(StatusCode::PAYLOAD_TOO_LARGE, BODY_TOO_LARGE);
        }
        Err(e) => {
            tracing::warn!(service = %service, error = %e, "Failed to read request body");
            return detail(StatusCode::BAD_REQUEST, "Failed to read request body");
        }
    };

    let mut response = match state.router.route(parts.method, &parts.uri, parts.headers, body).await {
        Ok(upstream) => relay(upstream),
        Err(e) => e.into_response(),
    };
    response.extensions_mut().insert(RoutedService(service));
    response
}

const BODY_TOO_LARGE: &str = "Request body too large";

/// Whether a body read failed on the size limit rather than on the client.
fn is_length_limit(err: &axum::Error) -> bool {
    let mut source = Some(err as &(dyn Error + 'static));
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// `RequestBodyLimitLayer` answers a declared oversized `Content-Length`
/// with plain text before any handler runs.
async fn json_body_limit(response: Response) -> Response {
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE && response.extensions().get::<RoutedService>().is_none() {
        return detail(StatusCode::PAYLOAD_TOO_LARGE, BODY_TOO_LARGE);
    }
    response
}

async fn not_found() -> Response {
    detail(StatusCode::NOT_FOUND, "Not Found")
}
