// SPDX-License-Identifier: GPL-3.0-only
mod api;
mod bridge;
mod config;
mod delivery;
mod logging;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use api::HttpServer;
use bridge::{AssetPackBridge, BridgeOptions};
use config::Config;
use delivery::HttpAssetPackManager;
use logging::setup_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    setup_logging(&config.log_level, config.log_json)?;

    info!("Starting PadBridgeDaemon v{}", env!("CARGO_PKG_VERSION"));

    tokio::fs::create_dir_all(&config.packs_dir).await?;

    let manager = Arc::new(HttpAssetPackManager::from_config(&config)?);
    info!(
        packs_dir = %config.packs_dir.display(),
        base_url = %config.delivery_base_url,
        "Asset pack manager initialized"
    );

    let bridge = Arc::new(AssetPackBridge::new(
        manager,
        BridgeOptions {
            event_backlog_warn_threshold: config.event_backlog_warn_threshold,
        },
    ));

    // Start HTTP server
    let http_server = HttpServer::new(Arc::clone(&bridge), config.local_api_bind);
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.serve().await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("All services started. Waiting for shutdown signal...");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal (Ctrl+C)");
        }
        Err(err) => {
            error!(error = %err, "Unable to listen for shutdown signal");
        }
    }

    info!("Initiating graceful shutdown...");

    http_task.abort();
    let _ = http_task.await;

    let pending = bridge.pending_events();
    if pending > 0 {
        info!(pending, "Dropping undrained pack events");
    }

    info!("Shutdown complete");
    Ok(())
}
