//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     GatewayConfig → ServiceEndpoint[] → store.rs register() (Starting)
//!
//! Health results (health/supervisor.rs):
//!     success → record_success() → Healthy, failures reset
//!     failure → record_failure() → Disconnected | Unhealthy
//!
//! Readers (routing, admin endpoints):
//!     get() / snapshot() → owned copies, never the live record
//! ```
//!
//! # Design Decisions
//! - One record per service, created at startup, never removed
//! - Each transition is applied under the record's lock in one step
//! - Threshold is passed per call so the policy stays testable

pub mod endpoint;
pub mod record;
pub mod store;

pub use endpoint::ServiceEndpoint;
pub use record::{ServiceRecord, ServiceStatus};
pub use store::{RegistryError, RegistrySnapshot, ServiceRegistry};
