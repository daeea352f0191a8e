//! # Transaction Repository
//!
//! The append-only purchase log.
//!
//! ## Status Guard
//! Terminal transitions are written as
//! `UPDATE ... WHERE id = $1 AND status = 'pending'`, so a COMPLETED or
//! FAILED row can never be rewritten even by a buggy caller.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use emporium_core::{ProductId, ProductPopularity, Transaction, TransactionStatus, UserId};

/// Repository for transaction log operations.
#[derive(Debug, Clone, Copy)]
pub struct TransactionRepository;

impl TransactionRepository {
    /// Appends a PENDING record.
    pub async fn create<'e, E>(
        executor: E,
        user_id: UserId,
        product_id: ProductId,
        amount: i64,
    ) -> DbResult<Transaction>
    where
        E: PgExecutor<'e>,
    {
        let id = Uuid::new_v4();
        debug!(txn_id = %id, user_id = %user_id, product_id = %product_id, amount, "Creating transaction");

        let txn = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (id, user_id, product_id, amount, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING id, user_id, product_id, amount, status, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(product_id)
        .bind(amount)
        .fetch_one(executor)
        .await?;

        Ok(txn)
    }

    /// Moves a PENDING record to `status`.
    ///
    /// ## Returns
    /// * `Ok(true)` - The row was pending and now carries `status`
    /// * `Ok(false)` - No pending row with this id
    pub async fn set_status<'e, E>(executor: E, id: Uuid, status: TransactionStatus) -> DbResult<bool>
    where
        E: PgExecutor<'e>,
    {
        debug!(txn_id = %id, status = %status, "Finishing transaction");

        let result = sqlx::query(
            "UPDATE transactions SET status = $2 WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(status)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Lists a user's transactions, oldest first.
    pub async fn list_for_user<'e, E>(executor: E, user_id: UserId) -> DbResult<Vec<Transaction>>
    where
        E: PgExecutor<'e>,
    {
        debug!(user_id = %user_id, "Listing transactions");

        let txns = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, user_id, product_id, amount, status, created_at
            FROM transactions
            WHERE user_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(txns)
    }

    /// Products ranked by number of COMPLETED purchases since `since`.
    ///
    /// Ties are broken by product id so the ranking is stable.
    pub async fn popular_products<'e, E>(
        executor: E,
        since: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<ProductPopularity>>
    where
        E: PgExecutor<'e>,
    {
        debug!(since = %since, limit, "Aggregating popular products");

        let rows = sqlx::query_as::<_, ProductPopularity>(
            r#"
            SELECT product_id, COUNT(*) AS total
            FROM transactions
            WHERE status = 'completed' AND created_at >= $1
            GROUP BY product_id
            ORDER BY total DESC, product_id
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }
}
