//! # Inventory Cache Sweeper
//!
//! Periodically deletes every `user:*:inventory` snapshot so stale entries
//! never outlive one sweep interval, whatever their TTL.
//!
//! ## Usage
//! ```bash
//! # Run forever, sweeping every CACHE_SWEEP_INTERVAL_SECS (default 3600)
//! REDIS_URL=redis://127.0.0.1:6379 cargo run -p emporium-engine --bin cache-sweeper
//!
//! # Sweep once and exit
//! cargo run -p emporium-engine --bin cache-sweeper -- --once
//! ```

use emporium_cache::{InventoryCache, RedisCache};
use emporium_engine::EngineConfig;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(true)
        .init();

    let once = std::env::args().any(|arg| arg == "--once");

    let config = EngineConfig::load()?;
    info!(
        interval_secs = config.cache_sweep_interval.as_secs(),
        once,
        "Starting inventory cache sweeper"
    );

    let cache = RedisCache::connect(&config.redis_url).await?;

    if once {
        let deleted = cache.sweep().await?;
        info!(deleted, "Sweep complete");
        return Ok(());
    }

    let mut ticker = interval(config.cache_sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // A failed sweep is retried on the next tick.
                if let Err(err) = cache.sweep().await {
                    error!(error = %err, "Inventory cache sweep failed");
                }
            }
            _ = &mut shutdown => break,
        }
    }

    info!("Sweeper shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
