use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use tally::api::{start_server, AppState};
use tally::config::Config;
use tally::metrics::MetricsRegistry;
use tally::storage::RocksDbStorage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tally=info".parse()?))
        .init();

    tracing::info!("tally starting...");

    let config = Config::from_env();

    let storage = Arc::new(RocksDbStorage::open_with_sync(
        &config.storage.data_dir,
        config.storage.sync_writes,
    )?);
    if !config.storage.sync_writes {
        tracing::warn!("TALLY_SYNC_WRITES is off; certificate records may be lost on OS crash");
    }

    let state = Arc::new(AppState::new(storage, Arc::new(MetricsRegistry::new())));

    start_server(config.server, state, shutdown_signal()).await?;

    tracing::info!("tally stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
