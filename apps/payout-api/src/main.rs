//! Payout API server binary.

use std::sync::Arc;

use payout_api::{build_router, ApiConfig, AppState};
use payout_db::{Database, DbConfig};
use payout_settlement::{ManualTransferProvider, SettlementConfig, SettlementService};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting payout API server...");

    let api_config = ApiConfig::load()?;
    let settlement_config = SettlementConfig::load(api_config.settlement_config_path.clone())?;
    info!(
        addr = %api_config.socket_addr(),
        db_path = %settlement_config.database.path.display(),
        cadence = %settlement_config.settlement.cadence,
        "Configuration loaded"
    );

    let db = Database::new(
        DbConfig::new(&settlement_config.database.path).max_connections(settlement_config.database.max_connections),
    )
    .await?;
    info!("Database ready");

    // Operators move funds from the CSV export and confirm through the webhook
    let service = SettlementService::new(db.clone(), &settlement_config, Arc::new(ManualTransferProvider));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new(
        Arc::new(service),
        settlement_config.settlement.batch_concurrency,
        shutdown_rx,
    );
    let app = build_router(state);

    let listener = TcpListener::bind(api_config.socket_addr()).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler. Also tells running batches to stop
/// between partners.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);
}
