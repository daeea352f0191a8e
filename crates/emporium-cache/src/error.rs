//! Cache error types.

use thiserror::Error;

/// Cache infrastructure failures.
///
/// These never carry domain meaning; the engine passes them through as
/// `EngineError::Cache`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis command or connection failure.
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// A cached payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
