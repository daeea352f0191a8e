//! # In-Memory Store
//!
//! A [`Store`] with the same unit-of-work semantics as PostgreSQL, for tests
//! and local runs without a database.
//!
//! ## Row Locks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock table: RowKey ──► Arc<tokio::sync::Mutex<()>>                    │
//! │                                                                         │
//! │  RowKey::Account(user)            ≈ SELECT ... FOR UPDATE on accounts  │
//! │  RowKey::Inventory(user, product) ≈ row lock on inventory, also taken  │
//! │                                     when the row does not exist yet    │
//! │                                                                         │
//! │  A unit holds OwnedMutexGuards until commit / rollback / drop.         │
//! │  Re-locking a key the unit already holds is a no-op.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Visibility
//! Writes are staged inside the unit and applied to the shared tables in one
//! step at commit, before any lock is released. A dropped unit never touches
//! the shared tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::store::{LockKind, Store, UnitOfWork};
use emporium_core::{
    Account, InventoryEntry, NewProduct, OwnedItem, Product, ProductId, ProductPopularity,
    Transaction, TransactionStatus, UserId,
};

// =============================================================================
// Shared State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Account(UserId),
    Inventory(UserId, ProductId),
}

#[derive(Debug, Default)]
struct Tables {
    next_account_id: i64,
    next_product_id: i64,
    accounts: BTreeMap<UserId, Account>,
    products: BTreeMap<ProductId, Product>,
    inventory: BTreeMap<(UserId, ProductId), InventoryEntry>,
    transactions: Vec<Transaction>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    locks: Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>,
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<RowKey, Arc<RowMutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory relational store.
///
/// Clones share the same tables and lock table.
///
/// ## Example
/// ```rust,ignore
/// let store = MemoryStore::new();
/// let account = store.create_account(500);
/// let product = store.create_product(NewProduct::active("Potion", 100, ProductType::Consumable));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
    lock_timeout: Option<Duration>,
}

impl MemoryStore {
    /// Creates an empty store whose lock waits are unbounded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds lock waits, mirroring PostgreSQL's `lock_timeout`.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Registers an account with an opening balance.
    pub fn create_account(&self, balance: i64) -> Account {
        let mut tables = self.shared.tables();
        tables.next_account_id += 1;

        let account = Account {
            id: UserId::new(tables.next_account_id),
            balance,
            created_at: Utc::now(),
        };
        tables.accounts.insert(account.id, account.clone());

        debug!(user_id = %account.id, balance, "Created in-memory account");
        account
    }

    /// Adds a product to the catalog.
    pub fn create_product(&self, product: NewProduct) -> Product {
        let mut tables = self.shared.tables();
        tables.next_product_id += 1;

        let product = Product {
            id: ProductId::new(tables.next_product_id),
            name: product.name,
            price: product.price,
            product_type: product.product_type,
            is_active: product.is_active,
        };
        tables.products.insert(product.id, product.clone());
        product
    }

    /// Activates or retires a product.
    pub fn set_product_active(&self, product_id: ProductId, active: bool) -> DbResult<()> {
        let mut tables = self.shared.tables();
        let product = tables
            .products
            .get_mut(&product_id)
            .ok_or_else(|| DbError::not_found("Product", product_id.to_string()))?;
        product.is_active = active;
        Ok(())
    }

    /// Writes an inventory row directly, bypassing units and rules.
    ///
    /// Lets tests set up states the engine never produces (e.g. quantity 0).
    pub fn put_inventory(&self, user_id: UserId, product_id: ProductId, quantity: i64) -> InventoryEntry {
        let entry = InventoryEntry::new(user_id, product_id, quantity);
        self.shared
            .tables()
            .inventory
            .insert((user_id, product_id), entry.clone());
        entry
    }

    /// Committed inventory row, if any.
    pub fn inventory_entry(&self, user_id: UserId, product_id: ProductId) -> Option<InventoryEntry> {
        self.shared
            .tables()
            .inventory
            .get(&(user_id, product_id))
            .cloned()
    }

    /// Number of committed transaction log rows.
    pub fn transaction_count(&self) -> usize {
        self.shared.tables().transactions.len()
    }

    /// Number of keys currently present in the lock table.
    pub fn lock_table_len(&self) -> usize {
        self.shared.locks().len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Unit = MemoryUnit;

    async fn begin(&self) -> DbResult<MemoryUnit> {
        Ok(MemoryUnit {
            shared: Arc::clone(&self.shared),
            lock_timeout: self.lock_timeout,
            guards: HashMap::new(),
            accounts: HashMap::new(),
            inventory: HashMap::new(),
            transactions: Vec::new(),
        })
    }

    async fn get_account(&self, user_id: UserId) -> DbResult<Option<Account>> {
        Ok(self.shared.tables().accounts.get(&user_id).cloned())
    }

    async fn inventory_for_user(&self, user_id: UserId) -> DbResult<Vec<OwnedItem>> {
        let tables = self.shared.tables();

        let items = tables
            .inventory
            .range((user_id, ProductId::new(i64::MIN))..=(user_id, ProductId::new(i64::MAX)))
            .filter_map(|(_, entry)| {
                tables.products.get(&entry.product_id).map(|product| OwnedItem {
                    entry: entry.clone(),
                    product_type: product.product_type,
                })
            })
            .collect();

        Ok(items)
    }

    async fn transactions_for_user(&self, user_id: UserId) -> DbResult<Vec<Transaction>> {
        Ok(self
            .shared
            .tables()
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn popular_products(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<ProductPopularity>> {
        let tables = self.shared.tables();

        let mut totals: BTreeMap<ProductId, i64> = BTreeMap::new();
        for txn in tables
            .transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Completed && t.created_at >= since)
        {
            *totals.entry(txn.product_id).or_insert(0) += 1;
        }

        let mut ranked: Vec<ProductPopularity> = totals
            .into_iter()
            .map(|(product_id, total)| ProductPopularity { product_id, total })
            .collect();
        ranked.sort_by(|a, b| b.total.cmp(&a.total).then(a.product_id.cmp(&b.product_id)));
        ranked.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));

        Ok(ranked)
    }
}

// =============================================================================
// Memory Unit
// =============================================================================

/// A unit of work over a [`MemoryStore`].
///
/// Staged inventory writes use `None` for a deleted row.
pub struct MemoryUnit {
    shared: Arc<Shared>,
    lock_timeout: Option<Duration>,
    guards: HashMap<RowKey, OwnedMutexGuard<()>>,
    accounts: HashMap<UserId, Account>,
    inventory: HashMap<(UserId, ProductId), Option<InventoryEntry>>,
    transactions: Vec<Transaction>,
}

impl std::fmt::Debug for MemoryUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryUnit")
            .field("locks_held", &self.guards.len())
            .field("staged_accounts", &self.accounts.len())
            .field("staged_inventory", &self.inventory.len())
            .field("staged_transactions", &self.transactions.len())
            .finish()
    }
}

impl MemoryUnit {
    async fn acquire(&mut self, key: RowKey) -> DbResult<()> {
        if self.guards.contains_key(&key) {
            return Ok(());
        }

        let handle = Arc::clone(self.shared.locks().entry(key).or_default());

        let guard = match self.lock_timeout {
            Some(limit) => tokio::time::timeout(limit, handle.lock_owned())
                .await
                .map_err(|_| {
                    DbError::LockTimeout(format!(
                        "{:?} not acquired within {}ms",
                        key,
                        limit.as_millis()
                    ))
                })?,
            None => handle.lock_owned().await,
        };

        self.guards.insert(key, guard);
        Ok(())
    }

    fn current_account(&self, user_id: UserId) -> Option<Account> {
        match self.accounts.get(&user_id) {
            Some(staged) => Some(staged.clone()),
            None => self.shared.tables().accounts.get(&user_id).cloned(),
        }
    }

    fn current_inventory(&self, user_id: UserId, product_id: ProductId) -> Option<InventoryEntry> {
        match self.inventory.get(&(user_id, product_id)) {
            Some(staged) => staged.clone(),
            None => self
                .shared
                .tables()
                .inventory
                .get(&(user_id, product_id))
                .cloned(),
        }
    }

    fn check_references(&self, user_id: UserId, product_id: ProductId) -> DbResult<()> {
        let tables = self.shared.tables();

        if !tables.accounts.contains_key(&user_id) {
            return Err(DbError::ForeignKeyViolation {
                message: format!("account {} does not exist", user_id),
            });
        }
        if !tables.products.contains_key(&product_id) {
            return Err(DbError::ForeignKeyViolation {
                message: format!("product {} does not exist", product_id),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn account(&mut self, user_id: UserId, lock: LockKind) -> DbResult<Option<Account>> {
        if lock.is_exclusive() {
            self.acquire(RowKey::Account(user_id)).await?;
        }

        Ok(self.current_account(user_id))
    }

    async fn update_balance(&mut self, account: &Account) -> DbResult<()> {
        self.acquire(RowKey::Account(account.id)).await?;

        if self.current_account(account.id).is_none() {
            return Err(DbError::not_found("Account", account.id.to_string()));
        }
        if account.balance < 0 {
            return Err(DbError::CheckViolation {
                constraint: "accounts_balance_check".to_string(),
            });
        }

        self.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn product(
        &mut self,
        product_id: ProductId,
        include_inactive: bool,
    ) -> DbResult<Option<Product>> {
        Ok(self
            .shared
            .tables()
            .products
            .get(&product_id)
            .filter(|p| include_inactive || p.is_active)
            .cloned())
    }

    async fn inventory(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        lock: LockKind,
    ) -> DbResult<Option<InventoryEntry>> {
        if lock.is_exclusive() {
            self.acquire(RowKey::Inventory(user_id, product_id)).await?;
        }

        Ok(self.current_inventory(user_id, product_id))
    }

    async fn add_inventory(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> DbResult<InventoryEntry> {
        self.acquire(RowKey::Inventory(user_id, product_id)).await?;

        if self.current_inventory(user_id, product_id).is_some() {
            return Err(DbError::duplicate(
                "inventory_pkey",
                format!("{}/{}", user_id, product_id),
            ));
        }
        self.check_references(user_id, product_id)?;
        if quantity < 0 {
            return Err(DbError::CheckViolation {
                constraint: "inventory_quantity_check".to_string(),
            });
        }

        let entry = InventoryEntry::new(user_id, product_id, quantity);
        self.inventory
            .insert((user_id, product_id), Some(entry.clone()));
        Ok(entry)
    }

    async fn update_inventory(&mut self, entry: &InventoryEntry) -> DbResult<()> {
        self.acquire(RowKey::Inventory(entry.user_id, entry.product_id))
            .await?;

        if self
            .current_inventory(entry.user_id, entry.product_id)
            .is_none()
        {
            return Err(DbError::not_found(
                "InventoryEntry",
                format!("{}/{}", entry.user_id, entry.product_id),
            ));
        }
        if entry.quantity < 0 {
            return Err(DbError::CheckViolation {
                constraint: "inventory_quantity_check".to_string(),
            });
        }

        self.inventory
            .insert((entry.user_id, entry.product_id), Some(entry.clone()));
        Ok(())
    }

    async fn delete_inventory(&mut self, entry: &InventoryEntry) -> DbResult<()> {
        self.acquire(RowKey::Inventory(entry.user_id, entry.product_id))
            .await?;
        self.inventory.insert((entry.user_id, entry.product_id), None);
        Ok(())
    }

    async fn create_transaction(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        amount: i64,
    ) -> DbResult<Transaction> {
        self.check_references(user_id, product_id)?;

        let txn = Transaction::pending(user_id, product_id, amount);
        self.transactions.push(txn.clone());
        Ok(txn)
    }

    /// Only records created in this unit can be finished here.
    async fn finish_transaction(
        &mut self,
        txn: &mut Transaction,
        status: TransactionStatus,
    ) -> DbResult<()> {
        let staged = self
            .transactions
            .iter_mut()
            .find(|t| t.id == txn.id)
            .ok_or_else(|| DbError::not_found("Pending transaction", txn.id.to_string()))?;

        staged
            .transition(status)
            .map_err(|_| DbError::not_found("Pending transaction", txn.id.to_string()))?;

        txn.status = status;
        Ok(())
    }

    async fn commit(mut self) -> DbResult<()> {
        {
            let mut tables = self.shared.tables();

            for (id, account) in self.accounts.drain() {
                tables.accounts.insert(id, account);
            }
            for (key, entry) in self.inventory.drain() {
                match entry {
                    Some(entry) => {
                        tables.inventory.insert(key, entry);
                    }
                    None => {
                        tables.inventory.remove(&key);
                    }
                }
            }
            tables.transactions.append(&mut self.transactions);
        }

        debug!(locks = self.guards.len(), "In-memory unit committed");
        Ok(())
    }

    async fn rollback(self) -> DbResult<()> {
        debug!(locks = self.guards.len(), "In-memory unit rolled back");
        Ok(())
    }
}

impl Drop for MemoryUnit {
    fn drop(&mut self) {
        let held: Vec<RowKey> = self.guards.keys().copied().collect();
        self.guards.clear();

        // Forget lock handles nobody else is holding or waiting on.
        let mut locks = self.shared.locks();
        for key in held {
            if locks.get(&key).is_some_and(|h| Arc::strong_count(h) == 1) {
                locks.remove(&key);
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
