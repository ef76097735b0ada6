//! Request handling.
//!
//! # Responsibilities
//! - Name the request ID header and read it back for logging
//! - Log every request with timing, and stamp timing headers on the response
//! - Record request metrics, labelled with the backend that served it
//!
//! # Design Decisions
//! - Request ID is set by tower-http before this middleware runs
//! - The routing middleware tags responses with [`RoutedService`]; untagged
//!   responses were served locally

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::observability::metrics;

/// Request ID header name.
pub const X_REQUEST_ID: &str = "x-request-id";

pub static X_PROCESS_TIME: HeaderName = HeaderName::from_static("x-process-time");
pub static X_SERVICE_NAME: HeaderName = HeaderName::from_static("x-service-name");

/// Value of `x-service-name` on every response.
pub const GATEWAY_NAME: &str = "api-gateway";

/// Response extension naming the backend a request was routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedService(pub String);

/// Generates a UUID v4 request ID for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request ID, if one is present and printable.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

/// Access log middleware.
pub async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request_id(request.headers()).unwrap_or("unknown").to_string();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        client = %client,
        user_agent = %user_agent,
        "Gateway request started"
    );

    let mut response = next.run(request).await;
    let elapsed = start.elapsed();
    let status = response.status();
    let service = response
        .extensions()
        .get::<RoutedService>()
        .map(|s| s.0.clone())
        .unwrap_or_else(|| metrics::LOCAL_SERVICE.to_string());

    metrics::record_request(method.as_str(), status.as_u16(), &service, start);

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status_code = status.as_u16(),
        service = %service,
        process_time = %format!("{:.3}s", elapsed.as_secs_f64()),
        "Gateway request completed"
    );

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&elapsed.as_secs_f64().to_string()) {
        headers.insert(X_PROCESS_TIME.clone(), value);
    }
    headers.insert(X_SERVICE_NAME.clone(), HeaderValue::from_static(GATEWAY_NAME));
    response
}
