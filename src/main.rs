//! Sheet tracker server entry point.
//!
//! Usage: `sheet-tracker [CONFIG]`. Without an argument the configuration
//! path is taken from `SHEET_TRACKER_CONFIG`, then `sheet-tracker.toml`.

use anyhow::{Context, Result};
use sheet_tracker::server::{self, AppState};
use sheet_tracker::{telemetry, ChangeTrigger, Config, Ingestor, Store};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("SHEET_TRACKER_CONFIG"))
        .map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;
    telemetry::init_tracing(&config.logging).context("Failed to initialise logging")?;

    let store = Arc::new(
        Store::open(&config.database)
            .with_context(|| format!("Failed to open database {}", config.database.display()))?,
    );
    let ingestor = Arc::new(
        Ingestor::from_config(store.clone(), &config).context("Invalid ingestion settings")?,
    );

    // a failed first run is logged by the pipeline; stale data keeps being served
    let initial = ingestor.clone();
    let _ = tokio::task::spawn_blocking(move || initial.run())
        .await
        .context("Initial ingestion panicked")?;

    let trigger = config
        .watch
        .enabled
        .then(|| ChangeTrigger::spawn(ingestor.clone(), &config.watch));

    let state = AppState::new(store, Arc::new(config));
    server::serve(state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for shutdown signal");
        }
        info!("Shutdown signal received");
    })
    .await
    .context("Server error")?;

    if let Some(trigger) = trigger {
        trigger.shutdown().await;
    }
    Ok(())
}
