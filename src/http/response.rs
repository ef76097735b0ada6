//! Response handling and transformation.
//!
//! # Responsibilities
//! - Relay a buffered backend response to the client
//! - Render gateway errors as `{"detail": ...}` JSON
//!
//! # Design Decisions
//! - Hop-by-hop headers stripped automatically
//! - An empty backend body becomes `{}`, except where HTTP forbids a body

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::routing::RouteError;
use crate::upstream::{strip_hop_by_hop, UpstreamResponse};

/// `{"detail": message}` with the given status.
pub fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        detail(self.status_code(), self.to_string())
    }
}

/// Convert a backend response into a client response.
pub fn relay(upstream: UpstreamResponse) -> Response {
    let UpstreamResponse {
        status,
        mut headers,
        body,
    } = upstream;
    strip_hop_by_hop(&mut headers);

    let bodyless = status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED;
    let body = if body.is_empty() && !bodyless {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Bytes::from_static(b"{}")
    } else {
        body
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
