//! # Derived Inventory Snapshot
//!
//! The cached, recomputable view of a user's inventory. Never the source of
//! truth: the relational store is.
//!
//! ## Cache Key Conventions
//! ```text
//! user:<id>:inventory       JSON InventorySnapshot, TTL 5h
//! user:<id>:inventory:gen   invalidation counter, no TTL
//! idempotency:<key>         "1", TTL 24h
//! analytics:popular-products:<window secs>:<limit>   JSON report, TTL 1h
//! ```
//! The periodic sweep deletes everything matching [`INVENTORY_CACHE_PATTERN`];
//! generation counters do not match it and survive sweeps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ProductId, UserId};
use crate::types::{InventoryEntry, ProductType};

/// Glob pattern matching every inventory snapshot key.
pub const INVENTORY_CACHE_PATTERN: &str = "user:*:inventory";

/// Cache key of a user's inventory snapshot.
pub fn inventory_cache_key(user_id: UserId) -> String {
    format!("user:{}:inventory", user_id)
}

/// Cache key of the counter bumped on every invalidation of a user's snapshot.
///
/// A reader records it before querying the store and only populates if it is
/// unchanged, so a snapshot built before a commit is never cached after it.
pub fn inventory_generation_key(user_id: UserId) -> String {
    format!("user:{}:inventory:gen", user_id)
}

/// Cache key of a popular-products report.
pub fn popular_products_cache_key(window_secs: i64, limit: i64) -> String {
    format!("analytics:popular-products:{}:{}", window_secs, limit)
}

/// Cache key of a top-up idempotency marker.
pub fn idempotency_cache_key(key: &str) -> String {
    format!("idempotency:{}", key)
}

/// An inventory entry together with the type of its product.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OwnedItem {
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub entry: InventoryEntry,
    pub product_type: ProductType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumableItem {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermanentItem {
    pub product_id: ProductId,
    pub purchased_at: DateTime<Utc>,
}

/// A user's inventory split by product type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub consumables: Vec<ConsumableItem>,
    pub permanents: Vec<PermanentItem>,
}

impl InventorySnapshot {
    /// Builds a snapshot from store rows, ordered by product id.
    pub fn from_items(items: impl IntoIterator<Item = OwnedItem>) -> Self {
        let mut snapshot = InventorySnapshot::default();

        for item in items {
            match item.product_type {
                ProductType::Consumable => snapshot.consumables.push(ConsumableItem {
                    product_id: item.entry.product_id,
                    quantity: item.entry.quantity,
                }),
                ProductType::Permanent => snapshot.permanents.push(PermanentItem {
                    product_id: item.entry.product_id,
                    purchased_at: item.entry.acquired_at,
                }),
            }
        }

        snapshot.consumables.sort_by_key(|c| c.product_id);
        snapshot.permanents.sort_by_key(|p| p.product_id);
        snapshot
    }

    pub fn is_empty(&self) -> bool {
        self.consumables.is_empty() && self.permanents.is_empty()
    }

    /// Quantity held of a consumable, if any.
    pub fn quantity_of(&self, product_id: ProductId) -> Option<i64> {
        self.consumables
            .iter()
            .find(|c| c.product_id == product_id)
            .map(|c| c.quantity)
    }

    /// True if the permanent product is owned.
    pub fn owns(&self, product_id: ProductId) -> bool {
        self.permanents.iter().any(|p| p.product_id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_keys() {
        assert_eq!(inventory_cache_key(UserId::new(17)), "user:17:inventory");
        assert_eq!(idempotency_cache_key("abc"), "idempotency:abc");
        assert_eq!(
            inventory_generation_key(UserId::new(17)),
            "user:17:inventory:gen"
        );
        assert_eq!(
            popular_products_cache_key(604_800, 10),
            "analytics:popular-products:604800:10"
        );
    }

    #[test]
    fn test_snapshot_splits_by_type() {
        let user = UserId::new(1);
        let items = vec![
            OwnedItem {
                entry: InventoryEntry::new(user, ProductId::new(3), 1),
                product_type: ProductType::Permanent,
            },
            OwnedItem {
                entry: InventoryEntry::new(user, ProductId::new(2), 4),
                product_type: ProductType::Consumable,
            },
            OwnedItem {
                entry: InventoryEntry::new(user, ProductId::new(1), 1),
                product_type: ProductType::Consumable,
            },
        ];

        let snapshot = InventorySnapshot::from_items(items);
        assert_eq!(snapshot.consumables.len(), 2);
        assert_eq!(snapshot.consumables[0].product_id, ProductId::new(1));
        assert_eq!(snapshot.quantity_of(ProductId::new(2)), Some(4));
        assert!(snapshot.owns(ProductId::new(3)));
        assert!(!snapshot.owns(ProductId::new(2)));
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = InventorySnapshot {
            consumables: vec![ConsumableItem {
                product_id: ProductId::new(5),
                quantity: 2,
            }],
            permanents: vec![],
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(
            json,
            r#"{"consumables":[{"product_id":5,"quantity":2}],"permanents":[]}"#
        );
        let back: InventorySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
