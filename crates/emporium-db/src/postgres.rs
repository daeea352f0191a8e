//! # PostgreSQL Store
//!
//! [`Store`] for [`Database`]: every unit of work is one database
//! transaction on a pooled connection.
//!
//! ## Unit Lifecycle
//! ```text
//! begin()  ──► BEGIN
//!              SET LOCAL lock_timeout = '<n>ms'
//!   ...        SELECT ... FOR UPDATE / INSERT / UPDATE / DELETE
//! commit() ──► COMMIT
//! drop     ──► ROLLBACK (sqlx::Transaction rolls back when dropped)
//! ```
//! A lock wait longer than the timeout fails with SQLSTATE 55P03, which
//! surfaces as [`DbError::LockTimeout`](crate::error::DbError::LockTimeout).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Postgres;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::{
    AccountRepository, CatalogRepository, InventoryRepository, TransactionRepository,
};
use crate::store::{LockKind, Store, UnitOfWork};
use emporium_core::{
    Account, InventoryEntry, OwnedItem, Product, ProductId, ProductPopularity, Transaction,
    TransactionStatus, UserId,
};

/// A unit of work backed by a PostgreSQL transaction.
pub struct PgUnitOfWork {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PgUnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgUnitOfWork").finish_non_exhaustive()
    }
}

#[async_trait]
impl Store for Database {
    type Unit = PgUnitOfWork;

    async fn begin(&self) -> DbResult<PgUnitOfWork> {
        let mut tx = self.pool().begin().await?;

        // SET does not take bind parameters; the value is an integer we format.
        let statement = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout().as_millis()
        );
        sqlx::query(&statement).execute(&mut *tx).await?;

        debug!("Unit of work started");
        Ok(PgUnitOfWork { tx })
    }

    async fn get_account(&self, user_id: UserId) -> DbResult<Option<Account>> {
        AccountRepository::get(self.pool(), user_id, LockKind::None).await
    }

    async fn inventory_for_user(&self, user_id: UserId) -> DbResult<Vec<OwnedItem>> {
        InventoryRepository::list_for_user(self.pool(), user_id).await
    }

    async fn transactions_for_user(&self, user_id: UserId) -> DbResult<Vec<Transaction>> {
        TransactionRepository::list_for_user(self.pool(), user_id).await
    }

    async fn popular_products(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<ProductPopularity>> {
        TransactionRepository::popular_products(self.pool(), since, limit).await
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn account(&mut self, user_id: UserId, lock: LockKind) -> DbResult<Option<Account>> {
        AccountRepository::get(&mut *self.tx, user_id, lock).await
    }

    async fn update_balance(&mut self, account: &Account) -> DbResult<()> {
        AccountRepository::update_balance(&mut *self.tx, account).await
    }

    async fn product(
        &mut self,
        product_id: ProductId,
        include_inactive: bool,
    ) -> DbResult<Option<Product>> {
        CatalogRepository::get(&mut *self.tx, product_id, include_inactive).await
    }

    async fn inventory(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        lock: LockKind,
    ) -> DbResult<Option<InventoryEntry>> {
        InventoryRepository::get(&mut *self.tx, user_id, product_id, lock).await
    }

    async fn add_inventory(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> DbResult<InventoryEntry> {
        InventoryRepository::add(&mut *self.tx, user_id, product_id, quantity).await
    }

    async fn update_inventory(&mut self, entry: &InventoryEntry) -> DbResult<()> {
        InventoryRepository::update(&mut *self.tx, entry).await
    }

    async fn delete_inventory(&mut self, entry: &InventoryEntry) -> DbResult<()> {
        InventoryRepository::delete(&mut *self.tx, entry).await
    }

    async fn create_transaction(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        amount: i64,
    ) -> DbResult<Transaction> {
        TransactionRepository::create(&mut *self.tx, user_id, product_id, amount).await
    }

    async fn finish_transaction(
        &mut self,
        txn: &mut Transaction,
        status: TransactionStatus,
    ) -> DbResult<()> {
        let updated = TransactionRepository::set_status(&mut *self.tx, txn.id, status).await?;
        if !updated {
            return Err(DbError::not_found("Pending transaction", txn.id.to_string()));
        }

        txn.status = status;
        Ok(())
    }

    async fn commit(self) -> DbResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Unit of work committed");
        Ok(())
    }

    async fn rollback(self) -> DbResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        debug!("Unit of work rolled back");
        Ok(())
    }
}
