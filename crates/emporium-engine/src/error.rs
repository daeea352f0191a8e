//! # Engine Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CoreError  (domain)          ──► EngineError::Domain   → kind()/code() │
//! │  DbError    (infrastructure)  ──► EngineError::Database → "DATABASE_ERROR"
//! │  CacheError (infrastructure)  ──► EngineError::Cache    → "CACHE_ERROR" │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Infrastructure errors pass through untouched; a lock timeout is never
//! turned into "insufficient funds" or any other domain answer.

use thiserror::Error;

use emporium_cache::CacheError;
use emporium_core::{CoreError, ErrorKind, ValidationError};
use emporium_db::DbError;

/// Errors returned by the purchase engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule rejected the request. Nothing was persisted.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// The relational store failed. The unit was rolled back.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// The cache failed.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Domain(CoreError::Validation(err))
    }
}

impl EngineError {
    /// Taxonomy bucket for domain failures; `None` for infrastructure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            EngineError::Domain(err) => Some(err.kind()),
            EngineError::Database(_) | EngineError::Cache(_) => None,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Domain(err) => err.code(),
            EngineError::Database(_) => "DATABASE_ERROR",
            EngineError::Cache(_) => "CACHE_ERROR",
        }
    }

    /// The domain failure, if this is one.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            EngineError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
