//! # Inventory Read Path
//!
//! Read-through access to a user's inventory snapshot.
//!
//! ```text
//! get_inventory(user)
//!      │
//!      ▼
//! cache GET user:<id>:inventory ── hit ──► snapshot
//!      │ miss (or cache down)
//!      ▼
//! cache GET user:<id>:inventory:gen ──► g
//!      │
//!      ▼
//! store: account exists? ── no ──► AccountNotFound
//!      │
//!      ▼
//! store: inventory JOIN products (no locks)
//!      │
//!      ▼
//! cache SET ... EX <ttl> if gen == g ──► snapshot
//! ```
//!
//! A commit that lands between the store read and the populate bumps the
//! generation, so the pre-commit snapshot is returned to this caller but never
//! cached.
//!
//! Never called inside a unit of work. The cache is derived data, so a cache
//! failure on this path degrades to a store read instead of failing the call.

use chrono::Utc;
use tracing::{debug, warn};

use emporium_core::{
    popular_products_cache_key, CoreError, InventorySnapshot, ProductPopularity, UserId,
};
use emporium_db::Store;

use crate::error::EngineResult;
use crate::purchase::PurchaseService;

impl<S: Store> PurchaseService<S> {
    /// Returns the user's inventory, served from cache when possible.
    pub async fn get_inventory(&self, user_id: UserId) -> EngineResult<InventorySnapshot> {
        match self.inventory_cache().get(user_id).await {
            Ok(Some(snapshot)) => {
                debug!(user_id = %user_id, "Inventory served from cache");
                return Ok(snapshot);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "Inventory cache read failed, using store");
            }
        }

        // Read before the store so a commit after this point is detected.
        let generation = match self.inventory_cache().generation(user_id).await {
            Ok(generation) => Some(generation),
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "Inventory cache generation read failed");
                None
            }
        };

        if self.store().get_account(user_id).await?.is_none() {
            return Err(CoreError::AccountNotFound(user_id).into());
        }

        let items = self.store().inventory_for_user(user_id).await?;
        let snapshot = InventorySnapshot::from_items(items);

        if let Some(generation) = generation {
            match self
                .inventory_cache()
                .populate(
                    user_id,
                    &snapshot,
                    self.settings().inventory_cache_ttl,
                    generation,
                )
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    debug!(user_id = %user_id, "Inventory changed during read, snapshot not cached");
                }
                Err(err) => {
                    warn!(user_id = %user_id, error = %err, "Inventory cache populate failed");
                }
            }
        }

        debug!(
            user_id = %user_id,
            consumables = snapshot.consumables.len(),
            permanents = snapshot.permanents.len(),
            "Inventory built from store"
        );
        Ok(snapshot)
    }

    /// Products with the most completed purchases in the trailing window.
    ///
    /// Served from the report cache when one is configured. A negative
    /// `limit` is treated as 0.
    ///
    /// ## Arguments
    /// * `window` - How far back to look (the reports use 7 days)
    /// * `limit` - Maximum number of products
    pub async fn popular_products(
        &self,
        window: chrono::Duration,
        limit: i64,
    ) -> EngineResult<Vec<ProductPopularity>> {
        let limit = limit.max(0);
        let key = popular_products_cache_key(window.num_seconds(), limit);

        if let Some(cache) = self.report_cache() {
            match cache.get_popular(&key).await {
                Ok(Some(report)) => {
                    debug!(key = %key, "Popular products served from cache");
                    return Ok(report);
                }
                Ok(None) => {}
                Err(err) => warn!(key = %key, error = %err, "Report cache read failed"),
            }
        }

        let since = Utc::now() - window;
        let report = self.store().popular_products(since, limit).await?;

        if let Some(cache) = self.report_cache() {
            if let Err(err) = cache
                .put_popular(&key, &report, self.settings().popular_products_cache_ttl)
                .await
            {
                warn!(key = %key, error = %err, "Report cache write failed");
            }
        }

        Ok(report)
    }
}
