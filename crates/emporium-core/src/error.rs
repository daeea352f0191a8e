//! # Error Types
//!
//! Domain-specific error types for emporium-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  emporium-core errors (this file)                                      │
//! │  ├── CoreError        - Domain failures (typed, one per condition)     │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  emporium-db errors                                                    │
//! │  └── DbError          - Infrastructure: connection, lock timeout, SQL  │
//! │                                                                         │
//! │  emporium-cache errors                                                 │
//! │  └── CacheError       - Infrastructure: Redis, serialization           │
//! │                                                                         │
//! │  Flow: CoreError ─┐                                                    │
//! │        DbError ───┼──► EngineError ──► boundary layer (table lookup)   │
//! │        CacheError ┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Taxonomy
//! Every [`CoreError`] belongs to exactly one [`ErrorKind`]. The boundary
//! translates the kind (or the finer [`CoreError::code`]) to a transport
//! status without inspecting messages.

use thiserror::Error;

use crate::ids::{ProductId, UserId};

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification of domain failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Account, product or inventory entry is missing.
    NotFound,
    /// The request clashes with current state (funds, ownership, replay).
    Conflict,
    /// The request itself is unacceptable.
    InvalidInput,
}

// =============================================================================
// Core Error
// =============================================================================

/// Domain failures raised by the purchase engine.
///
/// Raising one of these inside a unit of work aborts the whole unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// No account exists for the user.
    #[error("User not found: {0}")]
    AccountNotFound(UserId),

    /// No product exists for the id.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The user holds no inventory entry for the product.
    #[error("Item not found in inventory: user {user_id}, product {product_id}")]
    InventoryNotFound {
        user_id: UserId,
        product_id: ProductId,
    },

    /// Balance does not cover the price.
    ///
    /// ## When This Occurs
    /// ```text
    /// purchase(user, product)
    ///      │
    ///      ▼
    /// lock account: balance=50
    ///      │
    ///      ▼
    /// price=100 > balance ──► InsufficientFunds { balance: 50, required: 100 }
    ///      │
    ///      ▼
    /// unit rolls back, nothing persisted
    /// ```
    #[error("Not enough funds for user {user_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        user_id: UserId,
        balance: i64,
        required: i64,
    },

    /// A permanent product is already in the user's inventory.
    #[error("Permanent product {product_id} already owned by user {user_id}")]
    AlreadyOwned {
        user_id: UserId,
        product_id: ProductId,
    },

    /// The idempotency key was already used for a top-up.
    #[error("Duplicate top-up request: {key}")]
    IdempotencyConflict { key: String },

    /// Top-up amount must be greater than zero.
    #[error("Amount must be greater than zero, got {amount}")]
    InvalidTopUpAmount { amount: i64 },

    /// The credit would overflow the balance column.
    #[error("Balance overflow for user {user_id}")]
    BalanceOverflow { user_id: UserId },

    /// The product is no longer sold.
    #[error("Product is inactive: {0}")]
    ProductInactive(ProductId),

    /// Only consumable products can be used.
    #[error("Product is not consumable: {0}")]
    ProductNotConsumable(ProductId),

    /// The inventory entry exists but holds nothing.
    #[error("Item quantity is zero: user {user_id}, product {product_id}")]
    InventoryEmpty {
        user_id: UserId,
        product_id: ProductId,
    },

    /// A transaction log entry was asked to leave a terminal state.
    #[error("Transaction {id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        id: String,
        from: String,
        to: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns the taxonomy bucket of this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::AccountNotFound(_)
            | CoreError::ProductNotFound(_)
            | CoreError::InventoryNotFound { .. } => ErrorKind::NotFound,

            CoreError::InsufficientFunds { .. }
            | CoreError::AlreadyOwned { .. }
            | CoreError::IdempotencyConflict { .. }
            | CoreError::InvalidStatusTransition { .. } => ErrorKind::Conflict,

            CoreError::InvalidTopUpAmount { .. }
            | CoreError::BalanceOverflow { .. }
            | CoreError::ProductInactive(_)
            | CoreError::ProductNotConsumable(_)
            | CoreError::InventoryEmpty { .. }
            | CoreError::Validation(_) => ErrorKind::InvalidInput,
        }
    }

    /// Stable machine-readable code for the boundary layer.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            CoreError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            CoreError::InventoryNotFound { .. } => "INVENTORY_NOT_FOUND",
            CoreError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            CoreError::AlreadyOwned { .. } => "ALREADY_OWNED",
            CoreError::IdempotencyConflict { .. } => "IDEMPOTENCY_CONFLICT",
            CoreError::InvalidTopUpAmount { .. } => "INVALID_TOP_UP_AMOUNT",
            CoreError::BalanceOverflow { .. } => "BALANCE_OVERFLOW",
            CoreError::ProductInactive(_) => "PRODUCT_INACTIVE",
            CoreError::ProductNotConsumable(_) => "PRODUCT_NOT_CONSUMABLE",
            CoreError::InventoryEmpty { .. } => "INVENTORY_EMPTY",
            CoreError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            CoreError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used by the request boundary before an operation is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
