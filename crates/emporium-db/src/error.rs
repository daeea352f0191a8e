//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  PostgreSQL Error (sqlx::Error)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Classified by SQLSTATE                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EngineError::Database (emporium-engine) ← Never reinterpreted         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Boundary layer maps to a 5xx-class response                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## SQLSTATE Mapping
//! ```text
//! 23505  unique_violation       → UniqueViolation
//! 23503  foreign_key_violation  → ForeignKeyViolation
//! 23514  check_violation        → CheckViolation
//! 55P03  lock_not_available     → LockTimeout
//! 40P01  deadlock_detected      → Deadlock
//! ```

use thiserror::Error;

/// Database operation errors.
///
/// Every variant is an infrastructure failure. Domain conditions such as
/// "not enough funds" are decided above this layer and never surface here.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - Updating a row that does not exist
    /// - Completing a transaction log entry that is no longer pending
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - A second inventory row for the same (user, product)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Inventory or transaction referencing a missing account/product
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (negative balance or quantity).
    #[error("Check constraint {constraint} violated")]
    CheckViolation { constraint: String },

    /// A row lock could not be acquired within the configured lock timeout.
    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    /// The database chose this unit as a deadlock victim.
    #[error("Deadlock detected: {0}")]
    Deadlock(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    ///
    /// ## When This Occurs
    /// - Invalid SQL in migration
    /// - Migration version conflict
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed (begin/commit/rollback).
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// True for failures caused by lock contention (timeout or deadlock).
    ///
    /// Callers may retry the whole operation; the unit has already been
    /// rolled back.
    pub fn is_contention(&self) -> bool {
        matches!(self, DbError::LockTimeout(_) | DbError::Deadlock(_))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Classified by SQLSTATE (see module docs)
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();

                match db_err.code().as_deref() {
                    Some("23505") => DbError::UniqueViolation {
                        field: constraint,
                        value: "unknown".to_string(),
                    },
                    Some("23503") => DbError::ForeignKeyViolation { message: msg },
                    Some("23514") => DbError::CheckViolation { constraint },
                    Some("55P03") => DbError::LockTimeout(msg),
                    Some("40P01") => DbError::Deadlock(msg),
                    _ => DbError::QueryFailed(msg),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
