//! Consuming inventory.

mod common;

use std::sync::Arc;

use common::Harness;
use emporium_core::{CoreError, ProductId, UserId};
use emporium_engine::EngineError;

#[tokio::test]
async fn test_buy_then_use_last_unit() {
    let h = Harness::new();
    let user = h.account(500);
    let potion = h.consumable(100);

    h.service.purchase(user.id, potion.id).await.unwrap();
    assert_eq!(h.balance(user.id).await, 400);

    let receipt = h.service.use_consumable(user.id, potion.id).await.unwrap();

    assert_eq!(receipt.product_id, potion.id);
    assert_eq!(receipt.remaining, 0);
    assert!(h.store.inventory_entry(user.id, potion.id).is_none());
    // Using never refunds
    assert_eq!(h.balance(user.id).await, 400);
}

#[tokio::test]
async fn test_remaining_counts_down() {
    let h = Harness::new();
    let user = h.account(1_000);
    let potion = h.consumable(100);

    for _ in 0..4 {
        h.service.purchase(user.id, potion.id).await.unwrap();
    }

    let mut remaining = Vec::new();
    for _ in 0..4 {
        remaining.push(h.service.use_consumable(user.id, potion.id).await.unwrap().remaining);
    }

    assert_eq!(remaining, vec![3, 2, 1, 0]);
    assert!(h.store.inventory_entry(user.id, potion.id).is_none());

    let err = h.service.use_consumable(user.id, potion.id).await.unwrap_err();
    assert_eq!(err.code(), "INVENTORY_NOT_FOUND");
}

#[tokio::test]
async fn test_permanent_cannot_be_used() {
    let h = Harness::new();
    let user = h.account(1_000);
    let sword = h.permanent(300);
    h.service.purchase(user.id, sword.id).await.unwrap();

    let err = h.service.use_consumable(user.id, sword.id).await.unwrap_err();

    assert_eq!(err.as_domain(), Some(&CoreError::ProductNotConsumable(sword.id)));
    assert_eq!(h.store.inventory_entry(user.id, sword.id).unwrap().quantity, 1);
}

#[tokio::test]
async fn test_unknown_product_and_missing_entry() {
    let h = Harness::new();
    let user = h.account(100);
    let potion = h.consumable(100);

    let err = h
        .service
        .use_consumable(user.id, ProductId::new(404))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Domain(CoreError::ProductNotFound(_))));

    let err = h.service.use_consumable(user.id, potion.id).await.unwrap_err();
    assert_eq!(
        err.as_domain(),
        Some(&CoreError::InventoryNotFound {
            user_id: user.id,
            product_id: potion.id,
        })
    );

    let err = h
        .service
        .use_consumable(UserId::new(404), potion.id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVENTORY_NOT_FOUND");
}

#[tokio::test]
async fn test_empty_entry_is_rejected_and_kept() {
    let h = Harness::new();
    let user = h.account(100);
    let potion = h.consumable(100);
    h.store.put_inventory(user.id, potion.id, 0);

    let err = h.service.use_consumable(user.id, potion.id).await.unwrap_err();

    assert_eq!(
        err.as_domain(),
        Some(&CoreError::InventoryEmpty {
            user_id: user.id,
            product_id: potion.id,
        })
    );
    assert_eq!(h.store.inventory_entry(user.id, potion.id).unwrap().quantity, 0);
}

#[tokio::test]
async fn test_inactive_product_still_usable() {
    let h = Harness::new();
    let user = h.account(500);
    let potion = h.consumable(100);
    h.service.purchase(user.id, potion.id).await.unwrap();
    h.service.purchase(user.id, potion.id).await.unwrap();

    h.store.set_product_active(potion.id, false).unwrap();

    let receipt = h.service.use_consumable(user.id, potion.id).await.unwrap();
    assert_eq!(receipt.remaining, 1);

    let err = h.service.purchase(user.id, potion.id).await.unwrap_err();
    assert_eq!(err.code(), "PRODUCT_INACTIVE");
}

#[tokio::test]
async fn test_use_invalidates_inventory_cache() {
    let h = Harness::new();
    let user = h.account(500);
    let potion = h.consumable(100);
    h.service.purchase(user.id, potion.id).await.unwrap();
    h.service.purchase(user.id, potion.id).await.unwrap();

    let before = h.service.get_inventory(user.id).await.unwrap();
    assert_eq!(before.consumables[0].quantity, 2);
    assert!(h.cache.contains_key(&format!("user:{}:inventory", user.id)));

    h.service.use_consumable(user.id, potion.id).await.unwrap();
    assert!(!h.cache.contains_key(&format!("user:{}:inventory", user.id)));

    let after = h.service.get_inventory(user.id).await.unwrap();
    assert_eq!(after.consumables[0].quantity, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_uses_never_go_negative() {
    let h = Harness::new();
    let user = h.account(1_000);
    let potion = h.consumable(100);
    for _ in 0..3 {
        h.service.purchase(user.id, potion.id).await.unwrap();
    }

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&h.service);
            tokio::spawn(async move { service.use_consumable(user.id, potion.id).await })
        })
        .collect();

    let mut remaining = Vec::new();
    let mut exhausted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(receipt) => remaining.push(receipt.remaining),
            Err(EngineError::Domain(
                CoreError::InventoryNotFound { .. } | CoreError::InventoryEmpty { .. },
            )) => exhausted += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    remaining.sort_unstable();
    assert_eq!(remaining, vec![0, 1, 2]);
    assert_eq!(exhausted, 5);
    assert!(h.store.inventory_entry(user.id, potion.id).is_none());
    assert_eq!(h.balance(user.id).await, 700);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_purchase_and_use() {
    let h = Harness::new();
    let user = h.account(10_000);
    let potion = h.consumable(100);
    h.service.purchase(user.id, potion.id).await.unwrap();

    let buyers: Vec<_> = (0..10)
        .map(|_| {
            let service = Arc::clone(&h.service);
            tokio::spawn(async move { service.purchase(user.id, potion.id).await })
        })
        .collect();
    let users: Vec<_> = (0..10)
        .map(|_| {
            let service = Arc::clone(&h.service);
            tokio::spawn(async move { service.use_consumable(user.id, potion.id).await })
        })
        .collect();

    for buyer in buyers {
        buyer.await.unwrap().unwrap();
    }

    let mut used = 0;
    for task in users {
        match task.await.unwrap() {
            Ok(receipt) => {
                assert!(receipt.remaining >= 0);
                used += 1;
            }
            Err(EngineError::Domain(
                CoreError::InventoryNotFound { .. } | CoreError::InventoryEmpty { .. },
            )) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // 11 bought in total; whatever was not used is still held
    let held = h
        .store
        .inventory_entry(user.id, potion.id)
        .map_or(0, |e| e.quantity);
    assert_eq!(held + used, 11);
    assert_eq!(h.balance(user.id).await, 10_000 - 11 * 100);
    assert_eq!(h.store.transaction_count(), 11);
}
