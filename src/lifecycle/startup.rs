//! Startup orchestration.
//!
//! # Responsibilities
//! - Open connections for every configured service
//! - Register services and run the initial health sweep
//! - Apply the startup gating policy for required services
//! - Start the periodic health supervisor
//! - Tear everything down in reverse order
//!
//! # Design Decisions
//! - A required service whose connection cannot be set up is fatal
//! - Unhealthy required services after the first sweep are fatal only when
//!   `startup.fail_on_unhealthy_required` is set; otherwise the gateway
//!   starts degraded and routes to them once they recover
//! - Subsystems initialize in order, not concurrently
//! - The listener is bound by the caller, after `start` returns

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::GatewayConfig;
use crate::health::HealthSupervisor;
use crate::http::server::AppState;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::registry::{RegistryError, ServiceRegistry};
use crate::routing::{RouteTable, Router};
use crate::upstream::{ConnectError, ConnectionPool, ConnectionSettings};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("service registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("required service connection failed: {0}")]
    Connect(#[from] ConnectError),

    #[error("required services not healthy after startup: {}", .0.join(", "))]
    RequiredUnhealthy(Vec<String>),
}

/// A started gateway: shared state plus the background supervisor.
pub struct Gateway {
    state: AppState,
    shutdown: Shutdown,
    supervisor_task: JoinHandle<()>,
}

impl Gateway {
    /// Bring up every subsystem short of the listener.
    pub async fn start(config: GatewayConfig, shutdown: Shutdown) -> Result<Self, StartupError> {
        let config = Arc::new(config);
        let endpoints = config.endpoints();

        let settings = ConnectionSettings::from_config(&config);
        let pool = Arc::new(ConnectionPool::connect(&endpoints, &settings)?);
        tracing::info!(connections = pool.len(), services = endpoints.len(), "Connection pool ready");

        let registry = Arc::new(ServiceRegistry::new());
        for endpoint in endpoints {
            registry.register(endpoint)?;
        }

        let supervisor = Arc::new(HealthSupervisor::new(
            registry.clone(),
            pool.clone(),
            &config.health_check,
        ));
        let summary = supervisor.sweep().await;
        tracing::info!(
            healthy = summary.healthy,
            failed = summary.failed,
            skipped = summary.skipped,
            "Initial health check complete"
        );

        let unhealthy_required: Vec<String> = registry
            .snapshot()
            .iter()
            .filter(|r| r.endpoint.required && !r.is_healthy())
            .map(|r| r.name().to_string())
            .collect();
        if !unhealthy_required.is_empty() {
            if config.startup.fail_on_unhealthy_required {
                tracing::error!(services = ?unhealthy_required, "Required services unhealthy, aborting startup");
                return Err(StartupError::RequiredUnhealthy(unhealthy_required));
            }
            tracing::warn!(services = ?unhealthy_required, "Required services unhealthy, starting in degraded mode");
        }

        let table = RouteTable::from_config(&config.routes);
        tracing::info!(routes = table.rules().len(), "Route table compiled");
        let router = Arc::new(Router::new(table, registry.clone(), pool.clone()));

        let supervisor_task = tokio::spawn(supervisor.clone().run(shutdown.subscribe()));

        let state = AppState {
            router,
            registry,
            pool,
            supervisor,
            config,
            started_at: Utc::now(),
        };

        Ok(Self {
            state,
            shutdown,
            supervisor_task,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// HTTP front end over this gateway's state.
    pub fn server(&self) -> HttpServer {
        HttpServer::new(self.state.clone())
    }

    /// Stop the supervisor and close every connection.
    ///
    /// Call after the HTTP server has drained. Clones of the state that
    /// outlive this call see an empty pool.
    pub async fn close(self) {
        let Gateway {
            state,
            shutdown,
            supervisor_task,
        } = self;

        shutdown.trigger();
        if let Err(e) = supervisor_task.await {
            tracing::warn!(error = %e, "Health supervisor task ended abnormally");
        }

        state.pool.close();
        tracing::info!("Gateway closed");
    }
}
