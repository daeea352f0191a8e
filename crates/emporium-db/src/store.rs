//! # Store Abstraction
//!
//! The seam between the purchase engine and persistence.
//!
//! ## Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Store / UnitOfWork                               │
//! │                                                                         │
//! │  Store (shared, Clone)                                                 │
//! │  ├── begin() ──────────────► UnitOfWork (owned by one operation)       │
//! │  │                            ├── account(.., LockKind)                │
//! │  │                            ├── product(.., include_inactive)        │
//! │  │                            ├── inventory(.., LockKind)              │
//! │  │                            ├── add/update/delete_inventory          │
//! │  │                            ├── create_transaction / mark_*          │
//! │  │                            └── commit(self) | rollback(self) | drop │
//! │  │                                                                      │
//! │  └── non-locking reads: get_account, inventory_for_user, ...           │
//! │                                                                         │
//! │  Implementations:                                                       │
//! │  ├── Database     (postgres.rs) SELECT ... FOR UPDATE                  │
//! │  └── MemoryStore  (memory.rs)   per-row async mutex                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Unit of Work Contract
//! - Writes become visible to other units only after [`UnitOfWork::commit`].
//! - An exclusive lock is held until the unit commits, rolls back or is
//!   dropped. Dropping a unit (including dropping the future that owns it)
//!   rolls it back.
//! - Locks are re-entrant within one unit.
//! - Callers acquire locks in the order Account → Inventory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use emporium_core::{
    Account, InventoryEntry, OwnedItem, Product, ProductId, ProductPopularity, Transaction,
    TransactionStatus, UserId,
};

use crate::error::DbResult;

/// Row locking mode for reads inside a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockKind {
    /// Plain read, no lock taken.
    #[default]
    None,
    /// Exclusive row lock held until the unit ends.
    Exclusive,
}

impl LockKind {
    #[inline]
    pub fn is_exclusive(self) -> bool {
        matches!(self, LockKind::Exclusive)
    }
}

/// A source of units of work plus non-locking reads.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Unit: UnitOfWork;

    /// Opens a new unit of work.
    async fn begin(&self) -> DbResult<Self::Unit>;

    /// Non-locking account read.
    async fn get_account(&self, user_id: UserId) -> DbResult<Option<Account>>;

    /// All inventory entries of a user, joined with the product type.
    async fn inventory_for_user(&self, user_id: UserId) -> DbResult<Vec<OwnedItem>>;

    /// Transaction log entries of a user, oldest first.
    async fn transactions_for_user(&self, user_id: UserId) -> DbResult<Vec<Transaction>>;

    /// Products ranked by completed purchases since `since`.
    async fn popular_products(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<ProductPopularity>>;
}

/// One atomic unit: everything staged here commits together or not at all.
#[async_trait]
pub trait UnitOfWork: Send {
    // -------------------------------------------------------------------------
    // Account store
    // -------------------------------------------------------------------------

    /// Reads an account, locking it when `lock` is exclusive.
    async fn account(&mut self, user_id: UserId, lock: LockKind) -> DbResult<Option<Account>>;

    /// Persists the balance of an account read in this unit.
    async fn update_balance(&mut self, account: &Account) -> DbResult<()>;

    // -------------------------------------------------------------------------
    // Catalog store
    // -------------------------------------------------------------------------

    /// Reads a product. Inactive products are returned only when
    /// `include_inactive` is set.
    async fn product(
        &mut self,
        product_id: ProductId,
        include_inactive: bool,
    ) -> DbResult<Option<Product>>;

    // -------------------------------------------------------------------------
    // Inventory ledger
    // -------------------------------------------------------------------------

    /// Reads an inventory entry. An exclusive lock is taken on the
    /// (user, product) key even when no entry exists.
    async fn inventory(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        lock: LockKind,
    ) -> DbResult<Option<InventoryEntry>>;

    /// True if an entry exists, checked under an exclusive lock.
    async fn inventory_exists(&mut self, user_id: UserId, product_id: ProductId) -> DbResult<bool> {
        Ok(self
            .inventory(user_id, product_id, LockKind::Exclusive)
            .await?
            .is_some())
    }

    /// Inserts a new entry. The caller has checked absence under lock.
    async fn add_inventory(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> DbResult<InventoryEntry>;

    /// Persists the quantity of an entry read in this unit.
    async fn update_inventory(&mut self, entry: &InventoryEntry) -> DbResult<()>;

    /// Removes an entry.
    async fn delete_inventory(&mut self, entry: &InventoryEntry) -> DbResult<()>;

    // -------------------------------------------------------------------------
    // Transaction log
    // -------------------------------------------------------------------------

    /// Appends a PENDING record.
    async fn create_transaction(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        amount: i64,
    ) -> DbResult<Transaction>;

    /// Moves a PENDING record to `status`.
    ///
    /// Fails with `DbError::NotFound` if the record is no longer pending.
    /// On success `txn.status` is updated as well.
    async fn finish_transaction(
        &mut self,
        txn: &mut Transaction,
        status: TransactionStatus,
    ) -> DbResult<()>;

    async fn mark_completed(&mut self, txn: &mut Transaction) -> DbResult<()> {
        self.finish_transaction(txn, TransactionStatus::Completed)
            .await
    }

    async fn mark_failed(&mut self, txn: &mut Transaction) -> DbResult<()> {
        self.finish_transaction(txn, TransactionStatus::Failed).await
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Makes every staged write visible and releases all locks.
    async fn commit(self) -> DbResult<()>;

    /// Discards every staged write and releases all locks.
    async fn rollback(self) -> DbResult<()>;
}
