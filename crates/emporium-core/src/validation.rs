//! # Validation Module
//!
//! Request-level input checks for the purchase engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request boundary (external)                                  │
//! │  ├── Path/header parsing                                               │
//! │  └── THIS MODULE: ids, top-up cap, idempotency key                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Orchestrator                                                 │
//! │  └── Domain rules (funds, ownership, amount > 0)                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (PostgreSQL)                                        │
//! │  ├── CHECK (balance >= 0), CHECK (quantity >= 0)                       │
//! │  └── UNIQUE (user_id, product_id)                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use emporium_core::validation::{validate_top_up_amount, validate_idempotency_key};
//!
//! validate_top_up_amount(100, 10_000).unwrap();
//! validate_idempotency_key("3f1c-topup").unwrap();
//! ```

use crate::error::ValidationError;
use crate::ids::{ProductId, UserId};
use crate::MAX_IDEMPOTENCY_KEY_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a raw user id and wraps it.
pub fn validate_user_id(id: i64) -> ValidationResult<UserId> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "user_id".to_string(),
        });
    }

    Ok(UserId::new(id))
}

/// Validates a raw product id and wraps it.
pub fn validate_product_id(id: i64) -> ValidationResult<ProductId> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "product_id".to_string(),
        });
    }

    Ok(ProductId::new(id))
}

// =============================================================================
// Amount Validators
// =============================================================================

/// Validates a top-up amount against the configured cap.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed `cap`
///
/// ## Example
/// ```rust
/// use emporium_core::validation::validate_top_up_amount;
///
/// assert!(validate_top_up_amount(10_000, 10_000).is_ok());
/// assert!(validate_top_up_amount(0, 10_000).is_err());
/// assert!(validate_top_up_amount(10_001, 10_000).is_err());
/// ```
pub fn validate_top_up_amount(amount: i64, cap: i64) -> ValidationResult<()> {
    if amount <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    if amount > cap {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 1,
            max: cap,
        });
    }

    Ok(())
}

/// Validates a product price.
///
/// Prices are strictly positive; free products are not sold through the engine.
pub fn validate_price(price: i64) -> ValidationResult<()> {
    if price <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Header Validators
// =============================================================================

/// Validates an `Idempotency-Key` header value.
///
/// ## Rules
/// - Must not be empty or whitespace
/// - At most 255 characters
/// - No control characters (the value becomes part of a cache key)
pub fn validate_idempotency_key(key: &str) -> ValidationResult<()> {
    if key.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "idempotency_key".to_string(),
        });
    }

    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(ValidationError::TooLong {
            field: "idempotency_key".to_string(),
            max: MAX_IDEMPOTENCY_KEY_LEN,
        });
    }

    if key.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: "idempotency_key".to_string(),
            reason: "must not contain control characters".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ids() {
        assert_eq!(validate_user_id(5).unwrap(), UserId::new(5));
        assert_eq!(validate_product_id(1).unwrap(), ProductId::new(1));

        assert!(validate_user_id(0).is_err());
        assert!(validate_user_id(-3).is_err());
        assert!(validate_product_id(0).is_err());
    }

    #[test]
    fn test_validate_top_up_amount() {
        assert!(validate_top_up_amount(1, 10_000).is_ok());
        assert!(validate_top_up_amount(10_000, 10_000).is_ok());

        assert!(matches!(
            validate_top_up_amount(0, 10_000),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_top_up_amount(10_001, 10_000),
            Err(ValidationError::OutOfRange { max: 10_000, .. })
        ));
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(100).is_ok());
        assert!(validate_price(0).is_err());
        assert!(validate_price(-1).is_err());
    }

    #[test]
    fn test_validate_idempotency_key() {
        assert!(validate_idempotency_key("k1").is_ok());
        assert!(validate_idempotency_key("550e8400-e29b-41d4-a716-446655440000").is_ok());

        assert!(validate_idempotency_key("").is_err());
        assert!(validate_idempotency_key("   ").is_err());
        assert!(validate_idempotency_key(&"a".repeat(256)).is_err());
        assert!(validate_idempotency_key("bad\nkey").is_err());
    }
}
