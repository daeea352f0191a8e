//! # Domain Types
//!
//! Core domain types used throughout the purchase engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Account      │   │    Product      │   │ InventoryEntry  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UserId)    │   │  id (ProductId) │   │  user_id   ┐key │       │
//! │  │  balance        │   │  price          │   │  product_id┘    │       │
//! │  │                 │   │  product_type   │   │  quantity       │       │
//! │  │                 │   │  is_active      │   │  acquired_at    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  Transaction    │   │TransactionStatus│   │  ProductType    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  Pending        │   │  Consumable     │       │
//! │  │  amount         │   │  Completed      │   │  Permanent      │       │
//! │  │  status         │   │  Failed         │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::ids::{ProductId, UserId};

// =============================================================================
// Account
// =============================================================================

/// A user's monetary account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Account {
    /// Owning user.
    pub id: UserId,

    /// Balance in the smallest currency unit. Never negative.
    pub balance: i64,

    /// When the account was registered.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Applies a signed balance change in memory.
    ///
    /// ## Rules
    /// - A negative `delta` (spend) must not take the balance below zero
    /// - A positive `delta` (top-up) must not overflow
    ///
    /// The account is left untouched when an error is returned.
    pub fn apply_delta(&mut self, delta: i64) -> CoreResult<()> {
        let next = self
            .balance
            .checked_add(delta)
            .ok_or(CoreError::BalanceOverflow { user_id: self.id })?;

        if next < 0 {
            return Err(CoreError::InsufficientFunds {
                user_id: self.id,
                balance: self.balance,
                required: delta.saturating_neg(),
            });
        }

        self.balance = next;
        Ok(())
    }

    /// Returns true if the balance covers `amount`.
    #[inline]
    pub fn can_afford(&self, amount: i64) -> bool {
        self.balance >= amount
    }
}

// =============================================================================
// Product
// =============================================================================

/// How ownership of a product behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "product_type", rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    /// Depletable count; bought many times, used one at a time.
    Consumable,
    /// Owned at most once per user; never depleted.
    Permanent,
}

impl Default for ProductType {
    fn default() -> Self {
        ProductType::Consumable
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Price in the smallest currency unit (always positive).
    pub price: i64,
    pub product_type: ProductType,
    /// Inactive products can no longer be bought but can still be used.
    pub is_active: bool,
}

impl Product {
    #[inline]
    pub fn is_consumable(&self) -> bool {
        self.product_type == ProductType::Consumable
    }

    #[inline]
    pub fn is_permanent(&self) -> bool {
        self.product_type == ProductType::Permanent
    }
}

/// A product that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: i64,
    pub product_type: ProductType,
    pub is_active: bool,
}

impl NewProduct {
    /// An active product of the given type.
    pub fn active(name: impl Into<String>, price: i64, product_type: ProductType) -> Self {
        NewProduct {
            name: name.into(),
            price,
            product_type,
            is_active: true,
        }
    }
}

// =============================================================================
// Inventory Entry
// =============================================================================

/// A user's holding of one product.
///
/// ## Invariants (enforced by the orchestrator)
/// - Permanent products: at most one entry per user, quantity fixed at 1
/// - Consumable products: one entry per pair, deleted when quantity hits 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryEntry {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub acquired_at: DateTime<Utc>,
}

impl InventoryEntry {
    /// A fresh entry acquired now.
    pub fn new(user_id: UserId, product_id: ProductId, quantity: i64) -> Self {
        InventoryEntry {
            user_id,
            product_id,
            quantity,
            acquired_at: Utc::now(),
        }
    }

    /// Adds `by` units in memory.
    pub fn increment(&mut self, by: i64) {
        self.quantity = self.quantity.saturating_add(by);
    }

    /// Removes `by` units in memory, returning the remaining quantity.
    ///
    /// Fails with `InventoryEmpty` instead of going negative.
    pub fn decrement(&mut self, by: i64) -> CoreResult<i64> {
        if self.quantity < by || self.quantity <= 0 {
            return Err(CoreError::InventoryEmpty {
                user_id: self.user_id,
                product_id: self.product_id,
            });
        }

        self.quantity -= by;
        Ok(self.quantity)
    }

    /// True once a consumable entry has nothing left and must be deleted.
    #[inline]
    pub fn is_depleted(&self) -> bool {
        self.quantity <= 0
    }
}

// =============================================================================
// Transaction Status
// =============================================================================

/// Status of a transaction log entry.
///
/// ## State Machine
/// ```text
///            ┌──────────► Completed   (commit path)
///  Pending ──┤
///            └──────────► Failed      (only if a unit ever commits a failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "transaction_status", rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    /// Returns true if moving to `next` is a legal transition.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Completed)
                | (TransactionStatus::Pending, TransactionStatus::Failed)
        )
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl Default for TransactionStatus {
    fn default() -> Self {
        TransactionStatus::Pending
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// An append-only record of a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub product_id: ProductId,
    /// Price charged.
    pub amount: i64,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// A new PENDING record.
    pub fn pending(user_id: UserId, product_id: ProductId, amount: i64) -> Self {
        Transaction {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            amount,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Moves the record to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: TransactionStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStatusTransition {
                id: self.id.to_string(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        self.status = next;
        Ok(())
    }
}

/// Aggregated count of completed purchases for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductPopularity {
    pub product_id: ProductId,
    pub total: i64,
}

// =============================================================================
// Operation Results
// =============================================================================

/// Outcome marker of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Ok,
}

/// Result of a successful purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub status: PurchaseStatus,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub amount_spent: i64,
}

/// Result of using one unit of a consumable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseReceipt {
    pub product_id: ProductId,
    pub remaining: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn account(balance: i64) -> Account {
        Account {
            id: UserId::new(1),
            balance,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_apply_delta_spend_and_top_up() {
        let mut acc = account(500);
        acc.apply_delta(-100).unwrap();
        assert_eq!(acc.balance, 400);

        acc.apply_delta(250).unwrap();
        assert_eq!(acc.balance, 650);
    }

    #[test]
    fn test_apply_delta_never_goes_negative() {
        let mut acc = account(50);
        let err = acc.apply_delta(-100).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientFunds {
                user_id: UserId::new(1),
                balance: 50,
                required: 100,
            }
        );
        assert_eq!(acc.balance, 50);
    }

    #[test]
    fn test_apply_delta_overflow() {
        let mut acc = account(i64::MAX - 1);
        assert!(matches!(
            acc.apply_delta(10),
            Err(CoreError::BalanceOverflow { .. })
        ));
        assert_eq!(acc.balance, i64::MAX - 1);
    }

    #[test]
    fn test_inventory_decrement_to_zero() {
        let mut entry = InventoryEntry::new(UserId::new(1), ProductId::new(2), 2);
        assert_eq!(entry.decrement(1).unwrap(), 1);
        assert!(!entry.is_depleted());
        assert_eq!(entry.decrement(1).unwrap(), 0);
        assert!(entry.is_depleted());
        assert!(matches!(
            entry.decrement(1),
            Err(CoreError::InventoryEmpty { .. })
        ));
        assert_eq!(entry.quantity, 0);
    }

    #[test]
    fn test_transaction_state_machine() {
        let mut txn = Transaction::pending(UserId::new(1), ProductId::new(2), 100);
        assert_eq!(txn.status, TransactionStatus::Pending);

        txn.transition(TransactionStatus::Completed).unwrap();
        assert!(txn.status.is_terminal());

        // Completed records are never mutated again
        assert!(txn.transition(TransactionStatus::Failed).is_err());
        assert!(txn.transition(TransactionStatus::Pending).is_err());
        assert_eq!(txn.status, TransactionStatus::Completed);
    }

    #[test]
    fn test_status_defaults_and_display() {
        assert_eq!(TransactionStatus::default(), TransactionStatus::Pending);
        assert_eq!(TransactionStatus::Completed.to_string(), "completed");
        assert_eq!(ProductType::default(), ProductType::Consumable);
    }

    #[test]
    fn test_receipt_serialization() {
        let receipt = PurchaseReceipt {
            status: PurchaseStatus::Ok,
            user_id: UserId::new(1),
            product_id: ProductId::new(2),
            amount_spent: 100,
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "ok",
                "user_id": 1,
                "product_id": 2,
                "amount_spent": 100
            })
        );
    }
}
