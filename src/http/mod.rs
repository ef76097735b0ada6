//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span, body limit)
//!     → request.rs (access log, timing headers, request metrics)
//!     → server.rs routing middleware
//!         ├─ routed prefix → routing::Router → response.rs relay / error
//!         └─ otherwise     → admin handlers, or 404 fallback
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RoutedService, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
