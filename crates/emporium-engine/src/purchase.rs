//! # Purchase Orchestrator
//!
//! The three state-changing operations. Each runs inside exactly one unit of
//! work and either commits in full or leaves no trace.
//!
//! ## Purchase Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  purchase(user, product)                                                │
//! │                                                                         │
//! │  begin ──► lock Account ─────────────── missing ──► AccountNotFound     │
//! │              │                                                          │
//! │              ▼                                                          │
//! │            read Product (incl. inactive) ── missing ──► ProductNotFound │
//! │              │                          └─ inactive ──► ProductInactive │
//! │              ▼                                                          │
//! │            debit price ──────────────── balance < price ──► Insufficient│
//! │              │                                                          │
//! │              ├── CONSUMABLE: lock entry, +1 (or create with 1)          │
//! │              └── PERMANENT:  exists under lock ──► AlreadyOwned         │
//! │                              else create with 1                         │
//! │              │                                                          │
//! │              ▼                                                          │
//! │            log PENDING ──► COMPLETED                                    │
//! │              │                                                          │
//! │              ▼                                                          │
//! │            commit ──► invalidate user:<id>:inventory                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lock Order
//! Account → Catalog (no lock) → Inventory, in every operation. Concurrent
//! purchases by one user therefore queue on the account row.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use emporium_cache::{IdempotencyStore, InventoryCache, ReportCache};
use emporium_core::validation::{validate_idempotency_key, validate_top_up_amount};
use emporium_core::{
    Account, CoreError, ProductId, ProductType, PurchaseReceipt, PurchaseStatus, UseReceipt,
    UserId,
};
use emporium_db::{LockKind, Store, UnitOfWork};

use crate::config::EngineSettings;
use crate::error::EngineResult;

// =============================================================================
// Service
// =============================================================================

/// Orchestrates purchases, consumption and top-ups over an injected store
/// and cache.
///
/// ## Example
/// ```rust,ignore
/// let service = PurchaseService::new(store, cache.clone(), cache, EngineSettings::default());
/// let receipt = service.purchase(user_id, product_id).await?;
/// ```
pub struct PurchaseService<S: Store> {
    store: S,
    inventory_cache: Arc<dyn InventoryCache>,
    idempotency: Arc<dyn IdempotencyStore>,
    report_cache: Option<Arc<dyn ReportCache>>,
    settings: EngineSettings,
}

impl<S: Store> std::fmt::Debug for PurchaseService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurchaseService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<S: Store> PurchaseService<S> {
    /// Creates a service.
    ///
    /// ## Arguments
    /// * `store` - Relational store (PostgreSQL `Database` or `MemoryStore`)
    /// * `inventory_cache` - Snapshot cache, invalidated after every commit
    /// * `idempotency` - Top-up replay markers
    /// * `settings` - TTLs and the top-up cap
    pub fn new(
        store: S,
        inventory_cache: Arc<dyn InventoryCache>,
        idempotency: Arc<dyn IdempotencyStore>,
        settings: EngineSettings,
    ) -> Self {
        PurchaseService {
            store,
            inventory_cache,
            idempotency,
            report_cache: None,
            settings,
        }
    }

    /// Caches popular-products reports for `settings.popular_products_cache_ttl`.
    ///
    /// Without one, every report is computed from the store.
    pub fn with_report_cache(mut self, report_cache: Arc<dyn ReportCache>) -> Self {
        self.report_cache = Some(report_cache);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub(crate) fn inventory_cache(&self) -> &dyn InventoryCache {
        self.inventory_cache.as_ref()
    }

    pub(crate) fn report_cache(&self) -> Option<&dyn ReportCache> {
        self.report_cache.as_deref()
    }

    // =========================================================================
    // purchase
    // =========================================================================

    /// Buys one unit of a product.
    ///
    /// ## Returns
    /// * `Ok(PurchaseReceipt)` - Debited, granted and logged atomically
    /// * `Err(EngineError::Domain)` - AccountNotFound, ProductNotFound,
    ///   ProductInactive, InsufficientFunds or AlreadyOwned; nothing persisted
    /// * `Err(EngineError::Database)` - Store failure; unit rolled back
    pub async fn purchase(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> EngineResult<PurchaseReceipt> {
        debug!(user_id = %user_id, product_id = %product_id, "Purchase requested");

        let mut unit = self.store.begin().await?;
        let outcome = Self::purchase_in(&mut unit, user_id, product_id).await;
        let receipt = finish(unit, outcome).await?;

        self.invalidate_after_commit(user_id).await;

        info!(
            user_id = %user_id,
            product_id = %product_id,
            amount = receipt.amount_spent,
            "Purchase completed"
        );
        Ok(receipt)
    }

    async fn purchase_in(
        unit: &mut S::Unit,
        user_id: UserId,
        product_id: ProductId,
    ) -> EngineResult<PurchaseReceipt> {
        let mut account = unit
            .account(user_id, LockKind::Exclusive)
            .await?
            .ok_or(CoreError::AccountNotFound(user_id))?;

        let product = unit
            .product(product_id, true)
            .await?
            .ok_or(CoreError::ProductNotFound(product_id))?;

        if !product.is_active {
            return Err(CoreError::ProductInactive(product_id).into());
        }

        account.apply_delta(-product.price)?;
        unit.update_balance(&account).await?;

        match product.product_type {
            ProductType::Consumable => {
                match unit
                    .inventory(user_id, product_id, LockKind::Exclusive)
                    .await?
                {
                    Some(mut entry) => {
                        entry.increment(1);
                        unit.update_inventory(&entry).await?;
                    }
                    None => {
                        unit.add_inventory(user_id, product_id, 1).await?;
                    }
                }
            }
            ProductType::Permanent => {
                if unit.inventory_exists(user_id, product_id).await? {
                    return Err(CoreError::AlreadyOwned {
                        user_id,
                        product_id,
                    }
                    .into());
                }
                unit.add_inventory(user_id, product_id, 1).await?;
            }
        }

        let mut txn = unit
            .create_transaction(user_id, product_id, product.price)
            .await?;
        unit.mark_completed(&mut txn).await?;

        Ok(PurchaseReceipt {
            status: PurchaseStatus::Ok,
            user_id,
            product_id,
            amount_spent: product.price,
        })
    }

    // =========================================================================
    // use_consumable
    // =========================================================================

    /// Consumes one unit of a consumable the user holds.
    ///
    /// Works for inactive products too: retiring a product from sale does not
    /// take it away from its holders. The entry is deleted when it reaches
    /// zero.
    pub async fn use_consumable(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> EngineResult<UseReceipt> {
        debug!(user_id = %user_id, product_id = %product_id, "Use requested");

        let mut unit = self.store.begin().await?;
        let outcome = Self::use_in(&mut unit, user_id, product_id).await;
        let receipt = finish(unit, outcome).await?;

        self.invalidate_after_commit(user_id).await;

        info!(
            user_id = %user_id,
            product_id = %product_id,
            remaining = receipt.remaining,
            "Consumable used"
        );
        Ok(receipt)
    }

    async fn use_in(
        unit: &mut S::Unit,
        user_id: UserId,
        product_id: ProductId,
    ) -> EngineResult<UseReceipt> {
        let product = unit
            .product(product_id, true)
            .await?
            .ok_or(CoreError::ProductNotFound(product_id))?;

        if !product.is_consumable() {
            return Err(CoreError::ProductNotConsumable(product_id).into());
        }

        let mut entry = unit
            .inventory(user_id, product_id, LockKind::Exclusive)
            .await?
            .ok_or(CoreError::InventoryNotFound {
                user_id,
                product_id,
            })?;

        let remaining = entry.decrement(1)?;

        if entry.is_depleted() {
            unit.delete_inventory(&entry).await?;
        } else {
            unit.update_inventory(&entry).await?;
        }

        Ok(UseReceipt {
            product_id,
            remaining: remaining.max(0),
        })
    }

    // =========================================================================
    // add_funds
    // =========================================================================

    /// Credits an account exactly once per idempotency key.
    ///
    /// The key is reserved with an atomic set-if-absent before the store is
    /// touched, so two concurrent requests with the same key cannot both
    /// credit. The reservation is released on every failure (including a
    /// cancelled call) and kept for the idempotency TTL after a commit.
    ///
    /// ## Returns
    /// * `Ok(Account)` - The account after the credit
    /// * `Err(IdempotencyConflict)` - Key already used (or in flight)
    /// * `Err(InvalidTopUpAmount)` - `amount <= 0`
    /// * `Err(AccountNotFound)` - No such user
    pub async fn add_funds(
        &self,
        user_id: UserId,
        amount: i64,
        idempotency_key: &str,
    ) -> EngineResult<Account> {
        debug!(user_id = %user_id, amount, "Top-up requested");

        validate_idempotency_key(idempotency_key)?;

        let reserved = self
            .idempotency
            .reserve(idempotency_key, self.settings.idempotency_ttl)
            .await?;
        if !reserved {
            info!(user_id = %user_id, "Duplicate top-up rejected");
            return Err(CoreError::IdempotencyConflict {
                key: idempotency_key.to_string(),
            }
            .into());
        }

        let reservation = Reservation::new(Arc::clone(&self.idempotency), idempotency_key);

        match self.credit(user_id, amount).await {
            Ok(account) => {
                reservation.keep();
                info!(user_id = %user_id, amount, balance = account.balance, "Top-up completed");
                Ok(account)
            }
            Err(err) => {
                reservation.release().await;
                Err(err)
            }
        }
    }

    async fn credit(&self, user_id: UserId, amount: i64) -> EngineResult<Account> {
        if amount <= 0 {
            return Err(CoreError::InvalidTopUpAmount { amount }.into());
        }
        validate_top_up_amount(amount, self.settings.max_top_up_amount)?;

        let mut unit = self.store.begin().await?;
        let outcome = Self::credit_in(&mut unit, user_id, amount).await;
        finish(unit, outcome).await
    }

    async fn credit_in(unit: &mut S::Unit, user_id: UserId, amount: i64) -> EngineResult<Account> {
        let mut account = unit
            .account(user_id, LockKind::Exclusive)
            .await?
            .ok_or(CoreError::AccountNotFound(user_id))?;

        account.apply_delta(amount)?;
        unit.update_balance(&account).await?;

        Ok(account)
    }

    // =========================================================================
    // Cache coherency
    // =========================================================================

    /// Drops the user's snapshot. Runs only after a successful commit.
    ///
    /// A failure here is logged and swallowed: the write is already durable
    /// and the snapshot TTL bounds how long it can be stale.
    async fn invalidate_after_commit(&self, user_id: UserId) {
        if let Err(err) = self.inventory_cache.invalidate(user_id).await {
            error!(
                user_id = %user_id,
                error = %err,
                "Inventory cache invalidation failed after commit"
            );
        }
    }
}

/// Commits on success, rolls back on failure.
async fn finish<U: UnitOfWork, T>(unit: U, outcome: EngineResult<T>) -> EngineResult<T> {
    match outcome {
        Ok(value) => {
            unit.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = unit.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

// =============================================================================
// Idempotency Reservation
// =============================================================================

/// A reserved idempotency marker.
///
/// Dropped while still armed (the call was cancelled), it releases the
/// marker from a background task.
struct Reservation {
    store: Arc<dyn IdempotencyStore>,
    key: String,
    armed: bool,
}

impl Reservation {
    fn new(store: Arc<dyn IdempotencyStore>, key: &str) -> Self {
        Reservation {
            store,
            key: key.to_string(),
            armed: true,
        }
    }

    /// Keeps the marker for its TTL.
    fn keep(mut self) {
        self.armed = false;
    }

    /// Removes the marker so the key can be retried.
    async fn release(mut self) {
        self.armed = false;
        if let Err(err) = self.store.release(&self.key).await {
            warn!(error = %err, "Failed to release idempotency marker");
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let store = Arc::clone(&self.store);
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = store.release(&key).await {
                        warn!(error = %err, "Failed to release idempotency marker");
                    }
                });
            }
            Err(_) => warn!("Idempotency marker left reserved: no runtime to release it"),
        }
    }
}
