//! # Inventory Repository
//!
//! Database operations for the (user, product) inventory ledger.
//!
//! ## Locking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get(.., Exclusive) on an existing row  → row lock (FOR UPDATE)        │
//! │  get(.., Exclusive) on a missing row    → no row to lock; concurrent   │
//! │                                           first-inserts are already    │
//! │                                           serialized by the account    │
//! │                                           lock, and the primary key    │
//! │                                           (user_id, product_id) backs  │
//! │                                           it up with 23505             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::PgExecutor;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::store::LockKind;
use emporium_core::{InventoryEntry, OwnedItem, ProductId, UserId};

const SELECT_ENTRY: &str = r#"
    SELECT user_id, product_id, quantity, acquired_at
    FROM inventory
    WHERE user_id = $1 AND product_id = $2
"#;

const SELECT_ENTRY_FOR_UPDATE: &str = r#"
    SELECT user_id, product_id, quantity, acquired_at
    FROM inventory
    WHERE user_id = $1 AND product_id = $2
    FOR UPDATE
"#;

/// Repository for inventory database operations.
#[derive(Debug, Clone, Copy)]
pub struct InventoryRepository;

impl InventoryRepository {
    /// Gets the entry for a (user, product) pair.
    pub async fn get<'e, E>(
        executor: E,
        user_id: UserId,
        product_id: ProductId,
        lock: LockKind,
    ) -> DbResult<Option<InventoryEntry>>
    where
        E: PgExecutor<'e>,
    {
        debug!(user_id = %user_id, product_id = %product_id, ?lock, "Getting inventory entry");

        let sql = match lock {
            LockKind::None => SELECT_ENTRY,
            LockKind::Exclusive => SELECT_ENTRY_FOR_UPDATE,
        };

        let entry = sqlx::query_as::<_, InventoryEntry>(sql)
            .bind(user_id)
            .bind(product_id)
            .fetch_optional(executor)
            .await?;

        Ok(entry)
    }

    /// Inserts a new entry.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - An entry already exists
    pub async fn add<'e, E>(
        executor: E,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> DbResult<InventoryEntry>
    where
        E: PgExecutor<'e>,
    {
        debug!(user_id = %user_id, product_id = %product_id, quantity, "Adding inventory entry");

        let entry = sqlx::query_as::<_, InventoryEntry>(
            r#"
            INSERT INTO inventory (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING user_id, product_id, quantity, acquired_at
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(executor)
        .await?;

        Ok(entry)
    }

    /// Persists an entry's quantity.
    pub async fn update<'e, E>(executor: E, entry: &InventoryEntry) -> DbResult<()>
    where
        E: PgExecutor<'e>,
    {
        debug!(
            user_id = %entry.user_id,
            product_id = %entry.product_id,
            quantity = entry.quantity,
            "Updating inventory entry"
        );

        let result = sqlx::query(
            "UPDATE inventory SET quantity = $3 WHERE user_id = $1 AND product_id = $2",
        )
        .bind(entry.user_id)
        .bind(entry.product_id)
        .bind(entry.quantity)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(
                "InventoryEntry",
                format!("{}/{}", entry.user_id, entry.product_id),
            ));
        }

        Ok(())
    }

    /// Deletes an entry.
    pub async fn delete<'e, E>(executor: E, entry: &InventoryEntry) -> DbResult<()>
    where
        E: PgExecutor<'e>,
    {
        debug!(user_id = %entry.user_id, product_id = %entry.product_id, "Deleting inventory entry");

        sqlx::query("DELETE FROM inventory WHERE user_id = $1 AND product_id = $2")
            .bind(entry.user_id)
            .bind(entry.product_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Lists a user's entries joined with the product type, ordered by product.
    pub async fn list_for_user<'e, E>(executor: E, user_id: UserId) -> DbResult<Vec<OwnedItem>>
    where
        E: PgExecutor<'e>,
    {
        debug!(user_id = %user_id, "Listing inventory");

        let items = sqlx::query_as::<_, OwnedItem>(
            r#"
            SELECT i.user_id, i.product_id, i.quantity, i.acquired_at, p.product_type
            FROM inventory i
            INNER JOIN products p ON p.id = i.product_id
            WHERE i.user_id = $1
            ORDER BY i.product_id
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        debug!(count = items.len(), "Inventory listed");
        Ok(items)
    }
}
