//! # Account Repository
//!
//! Database operations for user accounts.
//!
//! Balances are only ever written through [`AccountRepository::update_balance`]
//! after the row was read with [`LockKind::Exclusive`] in the same unit.

use sqlx::PgExecutor;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::store::LockKind;
use emporium_core::{Account, UserId};

const SELECT_ACCOUNT: &str = "SELECT id, balance, created_at FROM accounts WHERE id = $1";

const SELECT_ACCOUNT_FOR_UPDATE: &str =
    "SELECT id, balance, created_at FROM accounts WHERE id = $1 FOR UPDATE";

/// Repository for account database operations.
#[derive(Debug, Clone, Copy)]
pub struct AccountRepository;

impl AccountRepository {
    /// Gets an account by user id.
    ///
    /// ## Arguments
    /// * `lock` - `Exclusive` issues `SELECT ... FOR UPDATE`; the row stays
    ///   locked until the surrounding transaction ends
    ///
    /// ## Returns
    /// * `Ok(Some(Account))` - Account found
    /// * `Ok(None)` - No such user
    pub async fn get<'e, E>(executor: E, user_id: UserId, lock: LockKind) -> DbResult<Option<Account>>
    where
        E: PgExecutor<'e>,
    {
        debug!(user_id = %user_id, ?lock, "Getting account");

        let sql = match lock {
            LockKind::None => SELECT_ACCOUNT,
            LockKind::Exclusive => SELECT_ACCOUNT_FOR_UPDATE,
        };

        let account = sqlx::query_as::<_, Account>(sql)
            .bind(user_id)
            .fetch_optional(executor)
            .await?;

        Ok(account)
    }

    /// Persists an account's balance.
    ///
    /// The `CHECK (balance >= 0)` constraint backs the in-memory rule.
    pub async fn update_balance<'e, E>(executor: E, account: &Account) -> DbResult<()>
    where
        E: PgExecutor<'e>,
    {
        debug!(user_id = %account.id, balance = account.balance, "Updating balance");

        let result = sqlx::query("UPDATE accounts SET balance = $2 WHERE id = $1")
            .bind(account.id)
            .bind(account.balance)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Account", account.id.to_string()));
        }

        Ok(())
    }

    /// Registers a new account with an opening balance.
    pub async fn create<'e, E>(executor: E, balance: i64) -> DbResult<Account>
    where
        E: PgExecutor<'e>,
    {
        debug!(balance = balance, "Creating account");

        let account = sqlx::query_as::<_, Account>(
            "INSERT INTO accounts (balance) VALUES ($1) RETURNING id, balance, created_at",
        )
        .bind(balance)
        .fetch_one(executor)
        .await?;

        Ok(account)
    }

    /// Counts accounts.
    pub async fn count<'e, E>(executor: E) -> DbResult<i64>
    where
        E: PgExecutor<'e>,
    {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}
