//! Brokerage Engine Binary
//!
//! Starts the HTTP/WebSocket server over an in-process ledger.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin brokerage-engine
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `VAULT_SECRET_KEY`: Secret the credential encryption key is derived from
//!
//! ## Optional
//! - `ENGINE_BIND_ADDRESS`: Bind address (default: 0.0.0.0)
//! - `ENGINE_HTTP_PORT`: HTTP/WebSocket port (default: 8080)
//! - `STREAM_TICK_INTERVAL_MS`: Tick cadence (default: 2000)
//! - `STREAM_CLIENT_BUFFER`: Per-subscriber queue bound (default: 64)
//! - `STREAM_WRITE_TIMEOUT_MS`: Socket write bound (default: 5000)
//! - `CONNECTION_TOKEN_TTL_HOURS`: Session token lifetime (default: 24)
//! - `OAUTH_CLIENT_ID`: Client id on OAuth URLs (default: brokerage-engine)
//! - `LEDGER_CROSSING_POLICY`: split | blend (default: split)
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use brokerage_engine::infrastructure::telemetry;
use brokerage_engine::{
    AppState, BrokerAdapter, ConnectionRegistry, CredentialVault, EngineConfig, HttpServer, MarketDataSource,
    OrderEngine, PositionLedger, SimulatedBroker, StreamConfig, StreamHub, SyntheticMarketData,
    init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Brokerage Engine");

    let _metrics_handle = init_metrics().context("failed to install metrics recorder")?;

    let config = EngineConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let vault = CredentialVault::new(config.vault_secret.expose())
        .context("failed to initialize credential vault")?;

    let market_data: Arc<dyn MarketDataSource> = Arc::new(SyntheticMarketData::new());
    let broker: Arc<dyn BrokerAdapter> = Arc::new(SimulatedBroker::new(Arc::clone(&market_data)));

    let registry = Arc::new(ConnectionRegistry::new(
        vault,
        Arc::clone(&broker),
        config.connections.clone(),
    ));
    let engine = Arc::new(OrderEngine::new(
        broker,
        Arc::new(PositionLedger::new()),
        config.ledger.crossing_policy,
    ));
    let hub = Arc::new(StreamHub::new(
        market_data,
        StreamConfig::from(config.stream),
    ));

    let shutdown_token = CancellationToken::new();
    let server = HttpServer::new(
        config.server.socket_addr(),
        AppState::new(registry, engine, Arc::clone(&hub)),
        shutdown_token.clone(),
    );
    let mut server_task = tokio::spawn(server.run());

    tracing::info!("Brokerage engine ready");

    tokio::select! {
        result = &mut server_task => {
            hub.shutdown();
            return result
                .context("HTTP server task panicked")?
                .context("HTTP server failed");
        }
        () = await_shutdown() => {}
    }

    hub.shutdown();
    shutdown_token.cancel();
    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, server_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server error during shutdown"),
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server task panicked"),
        Err(_) => tracing::warn!("Graceful shutdown timed out"),
    }

    tracing::info!("Brokerage engine stopped");
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &EngineConfig) {
    tracing::info!(
        addr = %config.server.socket_addr(),
        tick_interval_ms = config.stream.tick_interval.as_millis(),
        client_buffer = config.stream.client_buffer,
        crossing_policy = config.ledger.crossing_policy.as_str(),
        "Configuration loaded"
    );
    tracing::debug!(
        token_ttl_hours = config.connections.token_ttl.num_hours(),
        oauth_client_id = %config.connections.oauth_client_id,
        write_timeout_ms = config.stream.write_timeout.as_millis(),
        "Connection and stream settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
