//! API gateway.
//!
//! Fronts a set of backend microservices with one HTTP surface, tracks
//! their health, and refuses to forward to services that are not healthy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                   API GATEWAY                    │
//!                        │                                                  │
//!   Client Request       │  ┌─────────┐    ┌─────────┐    ┌─────────────┐   │
//!   ─────────────────────┼─▶│  http   │───▶│ routing │───▶│  upstream   │───┼──▶ Backend
//!                        │  │ server  │    │ router  │    │    pool     │   │    (HTTP)
//!                        │  └────┬────┘    └────┬────┘    └──────┬──────┘   │
//!                        │       │ local        │ status          │ probe    │
//!                        │       ▼              ▼                 ▼          │
//!                        │  ┌─────────┐    ┌──────────┐    ┌─────────────┐   │
//!                        │  │  admin  │───▶│ registry │◀───│   health    │───┼──▶ Backend
//!                        │  │handlers │    │          │    │ supervisor  │   │    (gRPC/HTTP)
//!                        │  └─────────┘    └──────────┘    └─────────────┘   │
//!                        │                                                  │
//!                        │   config · lifecycle · observability             │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::{apply_process_env, load_config, validate_config, GatewayConfig};
use api_gateway::lifecycle::{spawn_signal_handler, Gateway, Shutdown};
use api_gateway::observability::{init_logging, init_metrics};

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "Health-aware API gateway for backend microservices", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    apply_process_env(&mut config)?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Err(errors) = validate_config(&config) {
        for e in &errors {
            eprintln!("configuration error: {e}");
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        routes = config.routes.len(),
        health_interval_secs = config.health_check.interval_secs,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        if let Err(e) = init_metrics(addr) {
            tracing::error!(error = %e, "Failed to start metrics exporter, continuing without metrics");
        }
    }

    let shutdown = Shutdown::new();
    let bind_address = config.listener.bind_address.clone();

    let gateway = match Gateway::start(config, shutdown.clone()).await {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    spawn_signal_handler(shutdown.clone());
    let served = gateway.server().run(listener, shutdown.subscribe()).await;

    gateway.close().await;
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}
