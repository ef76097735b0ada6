//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, or defaults)
//!     → loader.rs (<NAME>_HOST / _GRPC_PORT / _HTTP_PORT overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; service addresses never change at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, apply_process_env, load_config, ConfigError};
pub use schema::{
    GatewayConfig, HealthCheckConfig, HttpPoolConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RouteConfig, RpcConfig, ServiceConfig, StartupConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
