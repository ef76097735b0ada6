//! End-to-end tests: startup, routing and local endpoints against mock
//! backends.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use api_gateway::config::GatewayConfig;
use api_gateway::lifecycle::{Gateway, Shutdown, StartupError};
use api_gateway::registry::ServiceStatus;

mod common;
use common::{config_with, service, MockBackend, MockReply};

async fn send(app: &axum::Router, method: Method, uri: &str, body: &str) -> (StatusCode, HeaderMap, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, value)
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, HeaderMap, Value) {
    send(app, Method::GET, uri, "").await
}

/// ai-kernel, cv-engine healthy; analytics failing its probes; no identity.
struct Fixture {
    ai_kernel: MockBackend,
    cv_engine: MockBackend,
    analytics: MockBackend,
    gateway: Gateway,
    app: axum::Router,
}

impl Fixture {
    async fn start() -> Self {
        let ai_kernel = MockBackend::healthy().await;
        let cv_engine = MockBackend::start(|req| match req.path() {
            "/health" => MockReply::ok(r#"{"status":"healthy"}"#),
            "/api/v1/cv/templates" => MockReply::ok(r#"{"templates":["modern","classic"]}"#),
            "/api/v1/cv/drafts" => MockReply::status(201, ""),
            _ => MockReply::status(404, r#"{"detail":"Not Found"}"#),
        })
        .await;
        let analytics = MockBackend::start(|req| match req.path() {
            "/health" => MockReply::status(503, r#"{"status":"down"}"#),
            _ => MockReply::ok(r#"{"report":[]}"#),
        })
        .await;

        let config = config_with(vec![
            service("ai-kernel", "AI Kernel", ai_kernel.port(), true),
            service("cv-engine", "CV Engine", cv_engine.port(), true),
            service("analytics", "Analytics", analytics.port(), false),
        ]);
        let gateway = Gateway::start(config, Shutdown::new()).await.unwrap();
        let app = gateway.server().app();

        Self {
            ai_kernel,
            cv_engine,
            analytics,
            gateway,
            app,
        }
    }
}

#[tokio::test]
async fn test_startup_sweep_populates_registry() {
    let fx = Fixture::start().await;
    let registry = &fx.gateway.state().registry;

    assert_eq!(registry.status("ai-kernel"), Some(ServiceStatus::Healthy));
    assert_eq!(registry.status("cv-engine"), Some(ServiceStatus::Healthy));
    assert_eq!(registry.status("analytics"), Some(ServiceStatus::Disconnected));
    assert_eq!(fx.cv_engine.health_checks(), 1);

    fx.gateway.close().await;
}

#[tokio::test]
async fn test_routes_to_healthy_service_verbatim() {
    let fx = Fixture::start().await;

    let (status, headers, body) = get(&fx.app, "/api/v1/cv/templates").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "templates": ["modern", "classic"] }));
    assert_eq!(headers["x-backend"], "mock");
    assert_eq!(headers["x-service-name"], "api-gateway");
    assert!(headers.contains_key("x-process-time"));

    let forwarded = fx.cv_engine.forwarded();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].method, "GET");
    assert_eq!(forwarded[0].target, "/api/v1/cv/templates");
    assert!(forwarded[0].header("x-request-id").is_some());
}

#[tokio::test]
async fn test_v2_prefix_and_backend_status_relayed() {
    let fx = Fixture::start().await;

    let (status, _, body) = send(&fx.app, Method::POST, "/api/v2/cv/drafts", r#"{"title":"cv"}"#).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({}));

    let (status, _, body) = get(&fx.app, "/api/v2/cv/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Not Found" }));

    let targets: Vec<_> = fx.cv_engine.forwarded().into_iter().map(|r| r.target).collect();
    assert_eq!(targets, vec!["/api/v1/cv/drafts", "/api/v1/cv/unknown"]);
    assert_eq!(fx.cv_engine.forwarded()[0].body, br#"{"title":"cv"}"#.to_vec());
}

#[tokio::test]
async fn test_unhealthy_service_is_not_contacted() {
    let fx = Fixture::start().await;
    fx.gateway.state().supervisor.sweep().await;
    fx.gateway.state().supervisor.sweep().await;
    assert_eq!(fx.gateway.state().registry.status("analytics"), Some(ServiceStatus::Unhealthy));

    let (status, headers, body) = get(&fx.app, "/api/v1/analytics/report").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "detail": "Service analytics is not available" }));
    assert_eq!(headers["x-service-name"], "api-gateway");
    assert!(fx.analytics.forwarded().is_empty());
}

#[tokio::test]
async fn test_unregistered_service_returns_not_found() {
    let fx = Fixture::start().await;

    let (status, _, body) = get(&fx.app, "/api/v1/users/me").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Service identity not found" }));
}

#[tokio::test]
async fn test_ai_kernel_rewrite_keeps_method_and_query() {
    let fx = Fixture::start().await;

    let (status, _, body) = send(&fx.app, Method::PUT, "/api/v1/ai/sessions/9?stream=false", r#"{"q":1}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "path": "/api/v2/ai/sessions/9?stream=false" }));

    let forwarded = fx.ai_kernel.forwarded();
    assert_eq!(forwarded[0].method, "PUT");
    assert_eq!(forwarded[0].body, br#"{"q":1}"#.to_vec());
}

#[tokio::test]
async fn test_unmapped_path_is_not_found() {
    let fx = Fixture::start().await;

    let (status, _, body) = get(&fx.app, "/api/v3/whatever").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Not Found" }));
}

#[tokio::test]
async fn test_gateway_health_endpoint() {
    let fx = Fixture::start().await;

    let (status, headers, body) = get(&fx.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "api-gateway");
    assert_eq!(body["services"]["cv-engine"]["status"], "healthy");
    assert_eq!(body["services"]["analytics"]["status"], "disconnected");
    assert_eq!(body["services"]["analytics"]["health_check_failures"], 1);
    assert_eq!(body["services"]["ai-kernel"]["required"], true);
    assert!(body["services"]["cv-engine"]["last_health_check"].is_string());
}

#[tokio::test]
async fn test_info_and_listing_endpoints() {
    let fx = Fixture::start().await;

    let (status, _, root) = get(&fx.app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(root["services"], json!(["ai-kernel", "cv-engine", "analytics"]));

    let (_, _, v1) = get(&fx.app, "/api/v1/info").await;
    assert_eq!(v1["microservices"]["analytics"]["required"], false);
    assert!(v1["start_time"].is_string());

    let (_, _, v2) = get(&fx.app, "/api/v2/info").await;
    assert_eq!(v2["communication"], "gRPC + REST");
    assert_eq!(v2["routes"].as_array().unwrap().len(), 8);

    let (_, _, listing) = get(&fx.app, "/api/v2/services").await;
    assert_eq!(listing["services"]["cv-engine"]["http_port"], fx.cv_engine.port());
    assert_eq!(listing["services"]["cv-engine"]["grpc_port"], Value::Null);
}

#[tokio::test]
async fn test_registry_dump() {
    let fx = Fixture::start().await;

    let (status, _, body) = get(&fx.app, "/api/v2/services/registry").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_services"], 3);
    assert_eq!(body["healthy_services"], 2);
    assert_eq!(body["unhealthy_services"], 0);

    let cv = &body["services"]["cv-engine"];
    assert_eq!(cv["name"], "cv-engine");
    assert_eq!(cv["host"], "127.0.0.1");
    assert_eq!(cv["grpc_connected"], false);
    assert_eq!(cv["http_connected"], true);
    assert_eq!(cv["health_check_failures"], 0);
}

#[tokio::test]
async fn test_manual_health_check_endpoint() {
    let fx = Fixture::start().await;

    let (status, _, body) = send(&fx.app, Method::POST, "/api/v2/services/cv-engine/health-check", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "service": "cv-engine",
            "status": "healthy",
            "message": "Health check completed for cv-engine",
        })
    );

    let (_, _, body) = send(&fx.app, Method::POST, "/api/v2/services/analytics/health-check", "").await;
    assert_eq!(body["status"], "disconnected");
    assert_eq!(fx.gateway.state().registry.get("analytics").unwrap().consecutive_failures, 2);

    let (status, _, body) = send(&fx.app, Method::POST, "/api/v2/services/billing/health-check", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Service billing not found" }));
}

#[tokio::test]
async fn test_forward_timeout() {
    let backend = MockBackend::start(|req| match req.path() {
        "/health" => MockReply::ok("{}"),
        _ => MockReply::ok("{}").delayed(Duration::from_secs(3)),
    })
    .await;
    let mut config = config_with(vec![service("ai-kernel", "AI Kernel", backend.port(), true)]);
    config.timeouts.request_secs = 1;
    let gateway = Gateway::start(config, Shutdown::new()).await.unwrap();
    let app = gateway.server().app();

    let (status, _, body) = send(&app, Method::POST, "/api/v2/ai/chat", r#"{"prompt":"hi"}"#).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body, json!({ "detail": "AI Kernel service timeout" }));
}

#[tokio::test]
async fn test_forward_transport_error() {
    let backend = MockBackend::start(|req| match req.path() {
        "/health" => MockReply::ok("{}"),
        _ => MockReply::hang_up(),
    })
    .await;
    let config = config_with(vec![service("cv-engine", "CV Engine", backend.port(), true)]);
    let gateway = Gateway::start(config, Shutdown::new()).await.unwrap();
    let app = gateway.server().app();

    let (status, _, body) = get(&app, "/api/v1/cv/templates").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "detail": "Error communicating with cv-engine" }));
}

#[tokio::test]
async fn test_body_over_limit_is_rejected() {
    let backend = MockBackend::healthy().await;
    let mut config = config_with(vec![service("cv-engine", "CV Engine", backend.port(), true)]);
    config.listener.max_body_size = 16;
    let gateway = Gateway::start(config, Shutdown::new()).await.unwrap();
    let app = gateway.server().app();

    let (status, _, body) = send(&app, Method::POST, "/api/v1/cv/drafts", &"x".repeat(64)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, json!({ "detail": "Request body too large" }));
    assert!(backend.forwarded().is_empty());
}

#[tokio::test]
async fn test_declared_oversized_body_is_rejected_as_json() {
    let backend = MockBackend::healthy().await;
    let mut config = config_with(vec![service("cv-engine", "CV Engine", backend.port(), true)]);
    config.listener.max_body_size = 16;
    let gateway = Gateway::start(config, Shutdown::new()).await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_task = tokio::spawn(gateway.server().run(listener, gateway.shutdown().subscribe()));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .post(format!("http://{addr}/api/v1/cv/drafts"))
        .header("content-type", "application/json")
        .body("x".repeat(64))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 413);
    assert_eq!(res.headers()["content-type"], "application/json");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "detail": "Request body too large" }));
    assert!(backend.forwarded().is_empty());
    drop(client);

    gateway.shutdown().trigger();
    tokio::time::timeout(Duration::from_secs(5), server_task)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    gateway.close().await;
}

#[tokio::test]
async fn test_aborted_body_is_a_bad_request() {
    let fx = Fixture::start().await;
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(br#"{"title":"#)),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away")),
    ];
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/cv/drafts")
        .body(Body::from_stream(futures_util::stream::iter(chunks)))
        .unwrap();

    let response = fx.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "detail": "Failed to read request body" }));
    assert!(fx.cv_engine.forwarded().is_empty());
}

#[tokio::test]
async fn test_degraded_start_recovers_after_check() {
    let backend = MockBackend::start(|_| MockReply::status(500, "{}")).await;
    let config = config_with(vec![service("cv-engine", "CV Engine", backend.port(), true)]);

    let gateway = Gateway::start(config, Shutdown::new()).await.unwrap();
    assert_eq!(gateway.state().registry.status("cv-engine"), Some(ServiceStatus::Disconnected));

    let app = gateway.server().app();
    let (status, _, _) = get(&app, "/api/v1/cv/templates").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    gateway.close().await;
}

#[tokio::test]
async fn test_fail_fast_on_unhealthy_required() {
    let backend = MockBackend::start(|_| MockReply::status(500, "{}")).await;
    let mut config = config_with(vec![service("cv-engine", "CV Engine", backend.port(), true)]);
    config.startup.fail_on_unhealthy_required = true;

    let err = Gateway::start(config, Shutdown::new()).await.err().unwrap();
    assert!(matches!(err, StartupError::RequiredUnhealthy(ref names) if names == &["cv-engine".to_string()]));
}

#[tokio::test]
async fn test_required_connection_failure_aborts_startup() {
    let mut broken = service("identity", "Identity", 8002, true);
    broken.host = Some("bad host".to_string());
    let config = config_with(vec![broken]);

    let err = Gateway::start(config, Shutdown::new()).await.err().unwrap();
    assert!(matches!(err, StartupError::Connect(_)));
}

#[tokio::test]
async fn test_serve_and_shutdown_over_socket() {
    let backend = MockBackend::healthy().await;
    let config = config_with(vec![service("cv-engine", "CV Engine", backend.port(), true)]);
    let gateway = Gateway::start(config, Shutdown::new()).await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = gateway.server();
    let server_task = tokio::spawn(server.run(listener, gateway.shutdown().subscribe()));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!("http://{addr}/api/v2/cv/templates?page=2"))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-request-id"], "req-42");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "path": "/api/v1/cv/templates?page=2" }));
    assert_eq!(backend.forwarded()[0].header("x-request-id"), Some("req-42"));
    drop(client);

    gateway.shutdown().trigger();
    tokio::time::timeout(Duration::from_secs(5), server_task)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
    gateway.close().await;
}

#[tokio::test]
async fn test_close_releases_connections_held_by_live_state() {
    let fx = Fixture::start().await;
    let state = fx.gateway.state().clone();
    let app = fx.app.clone();
    assert!(state.pool.has_http("cv-engine"));

    fx.gateway.close().await;

    assert!(state.pool.is_empty());
    assert!(!state.pool.has_http("cv-engine"));
    let (status, _, body) = get(&app, "/api/v1/cv/templates").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "detail": "Error communicating with cv-engine" }));
    assert!(fx.cv_engine.forwarded().is_empty());
}

#[test]
fn test_default_config_is_the_full_deployment() {
    let config = GatewayConfig::default();
    let required: Vec<_> = config
        .services
        .iter()
        .filter(|s| s.required)
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(config.services.len(), 8);
    assert_eq!(required, vec!["ai-kernel", "identity", "cv-engine"]);
}
