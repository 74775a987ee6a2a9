//! Edge gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ TraceLayer ─▶ CorrelationLayer ─▶ TimeoutLayer ─▶ routes
//!                                   (id, started)                       │
//!                                                                       ├─ GET  /health
//!                                                                       ├─ GET  /health/services ─▶ HealthAggregator
//!                                                                       │                           ├─▶ probe A ─▶ backend A
//!                                                                       │                           ├─▶ probe B ─▶ backend B
//!                                                                       │                           └─▶ probe N ─▶ backend N
//!                                                                       └─ POST /auth/token ─▶ IdentityVerifier ─▶ TokenIssuer
//!     Client Response
//!     ◀────────────── (completed, x-correlation-id) ◀──────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_gateway::config::{load_config, load_from_env};
use edge_gateway::lifecycle::{signals, Shutdown};
use edge_gateway::observability::{logging, metrics};
use edge_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "Correlation, health aggregation and token issuance for an API gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults plus environment
    /// overrides are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability)?;

    tracing::info!("edge-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        probe_timeout_ms = config.health_check.timeout_ms,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let server = match HttpServer::new(config.clone()) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Token issuer unavailable, refusing to start");
            return Err(e.into());
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
