//! # emporium-engine: Purchase Orchestrator
//!
//! Atomic purchase / consumption / top-up operations over a relational store
//! and a derived cache.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Emporium Engine                                  │
//! │                                                                         │
//! │  request layer ──► PurchaseService<S: Store>                           │
//! │                      │            │                                     │
//! │                      │            └──► Arc<dyn InventoryCache>          │
//! │                      │                 Arc<dyn IdempotencyStore>        │
//! │                      ▼                     (Redis / memory)             │
//! │                 S::Unit (one per call)                                  │
//! │                 (PostgreSQL / memory)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`purchase`] - `purchase`, `use_consumable`, `add_funds`
//! - [`inventory`] - Cached inventory read path and popularity report
//! - [`config`] - Environment configuration
//! - [`error`] - `EngineError`
//!
//! ## Usage
//! ```rust,ignore
//! let config = EngineConfig::load()?;
//! let service = emporium_engine::connect(&config).await?;
//! service.add_funds(user_id, 500, "req-1").await?;
//! service.purchase(user_id, product_id).await?;
//! ```

pub mod config;
pub mod error;
pub mod inventory;
pub mod purchase;

use std::sync::Arc;
use tracing::info;

use emporium_cache::RedisCache;
use emporium_db::Database;

pub use config::{ConfigError, EngineConfig, EngineSettings};
pub use error::{EngineError, EngineResult};
pub use purchase::PurchaseService;

/// Connects to PostgreSQL and Redis and builds the production service.
pub async fn connect(config: &EngineConfig) -> EngineResult<PurchaseService<Database>> {
    let db = Database::new(config.db_config()).await?;
    let cache = Arc::new(RedisCache::connect(&config.redis_url).await?);

    info!("Purchase engine ready");
    Ok(PurchaseService::new(db, cache.clone(), cache.clone(), config.settings)
        .with_report_cache(cache))
}
