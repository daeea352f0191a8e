//! Purchase flow against the in-memory store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{BrokenCache, Harness, ObservingCache};
use emporium_cache::InventoryCache;
use emporium_core::{
    CoreError, ErrorKind, InventorySnapshot, ProductId, PurchaseStatus, TransactionStatus, UserId,
};
use emporium_db::{DbError, LockKind, MemoryStore, Store, UnitOfWork};
use emporium_engine::EngineError;

#[tokio::test]
async fn test_purchase_debits_and_grants() {
    let h = Harness::new();
    let user = h.account(500);
    let potion = h.consumable(100);

    let receipt = h.service.purchase(user.id, potion.id).await.unwrap();

    assert_eq!(receipt.status, PurchaseStatus::Ok);
    assert_eq!(receipt.user_id, user.id);
    assert_eq!(receipt.product_id, potion.id);
    assert_eq!(receipt.amount_spent, 100);

    assert_eq!(h.balance(user.id).await, 400);
    assert_eq!(h.store.inventory_entry(user.id, potion.id).unwrap().quantity, 1);

    let log = h.store.transactions_for_user(user.id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].amount, 100);
    assert_eq!(log[0].status, TransactionStatus::Completed);
}

#[tokio::test]
async fn test_consumable_purchases_accumulate() {
    let h = Harness::new();
    let user = h.account(1_000);
    let potion = h.consumable(100);

    for _ in 0..3 {
        h.service.purchase(user.id, potion.id).await.unwrap();
    }

    assert_eq!(h.balance(user.id).await, 700);
    assert_eq!(h.store.inventory_entry(user.id, potion.id).unwrap().quantity, 3);
    assert_eq!(h.store.transaction_count(), 3);
}

#[tokio::test]
async fn test_insufficient_funds_leaves_no_trace() {
    let h = Harness::new();
    let user = h.account(50);
    let potion = h.consumable(100);

    let err = h.service.purchase(user.id, potion.id).await.unwrap_err();

    assert_eq!(
        err.as_domain(),
        Some(&CoreError::InsufficientFunds {
            user_id: user.id,
            balance: 50,
            required: 100,
        })
    );
    assert_eq!(err.kind(), Some(ErrorKind::Conflict));
    assert_eq!(h.balance(user.id).await, 50);
    assert!(h.store.inventory_entry(user.id, potion.id).is_none());
    assert_eq!(h.store.transaction_count(), 0);
}

#[tokio::test]
async fn test_missing_account_and_product() {
    let h = Harness::new();
    let user = h.account(500);
    let potion = h.consumable(100);

    let err = h.service.purchase(UserId::new(999), potion.id).await.unwrap_err();
    assert_eq!(err.code(), "ACCOUNT_NOT_FOUND");

    let err = h.service.purchase(user.id, ProductId::new(999)).await.unwrap_err();
    assert_eq!(err.code(), "PRODUCT_NOT_FOUND");
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));

    assert_eq!(h.balance(user.id).await, 500);
}

#[tokio::test]
async fn test_inactive_product_cannot_be_bought() {
    let h = Harness::new();
    let user = h.account(500);
    let potion = h.consumable(100);
    h.store.set_product_active(potion.id, false).unwrap();

    let err = h.service.purchase(user.id, potion.id).await.unwrap_err();

    assert_eq!(err.as_domain(), Some(&CoreError::ProductInactive(potion.id)));
    assert_eq!(h.balance(user.id).await, 500);
}

#[tokio::test]
async fn test_permanent_owned_once() {
    let h = Harness::new();
    let user = h.account(1_000);
    let sword = h.permanent(300);

    h.service.purchase(user.id, sword.id).await.unwrap();
    let err = h.service.purchase(user.id, sword.id).await.unwrap_err();

    assert!(matches!(err, EngineError::Domain(CoreError::AlreadyOwned { .. })));
    assert_eq!(h.balance(user.id).await, 700);
    assert_eq!(h.store.inventory_entry(user.id, sword.id).unwrap().quantity, 1);
    assert_eq!(h.store.transaction_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_purchases_never_overdraw() {
    let h = Harness::new();
    let user = h.account(500);
    let potion = h.consumable(100);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&h.service);
            tokio::spawn(async move { service.purchase(user.id, potion.id).await })
        })
        .collect();

    let mut succeeded = 0;
    let mut insufficient = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(EngineError::Domain(CoreError::InsufficientFunds { .. })) => insufficient += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 5);
    assert_eq!(insufficient, 3);
    assert_eq!(h.balance(user.id).await, 0);
    assert_eq!(h.store.inventory_entry(user.id, potion.id).unwrap().quantity, 5);
    assert_eq!(h.store.transaction_count(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_permanent_purchase_charges_once() {
    let h = Harness::new();
    let user = h.account(1_000);
    let sword = h.permanent(300);

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let service = Arc::clone(&h.service);
            tokio::spawn(async move { service.purchase(user.id, sword.id).await })
        })
        .collect();

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(EngineError::Domain(CoreError::AlreadyOwned { .. }))
    )));
    assert_eq!(h.balance(user.id).await, 700);
    assert_eq!(h.store.inventory_entry(user.id, sword.id).unwrap().quantity, 1);
    assert_eq!(h.store.transaction_count(), 1);
}

#[tokio::test]
async fn test_invalidation_sees_committed_state() {
    let store = MemoryStore::new();
    let observer = Arc::new(ObservingCache::new(store.clone()));
    let h = Harness::with_inventory_cache(store, observer.clone());
    let user = h.account(500);
    let potion = h.consumable(100);

    h.service.purchase(user.id, potion.id).await.unwrap();

    assert_eq!(observer.observed(), vec![(user.id, 400)]);
}

#[tokio::test]
async fn test_failed_purchase_does_not_invalidate() {
    let h = Harness::new();
    let user = h.account(50);
    let potion = h.consumable(100);

    let snapshot = InventorySnapshot::default();
    h.cache
        .populate(user.id, &snapshot, Duration::from_secs(60), 0)
        .await
        .unwrap();

    h.service.purchase(user.id, potion.id).await.unwrap_err();

    assert!(h.cache.contains_key(&format!("user:{}:inventory", user.id)));
}

#[tokio::test]
async fn test_invalidation_failure_after_commit_is_swallowed() {
    let store = MemoryStore::new();
    let h = Harness::with_inventory_cache(store, Arc::new(BrokenCache));
    let user = h.account(500);
    let potion = h.consumable(100);

    let receipt = h.service.purchase(user.id, potion.id).await.unwrap();

    assert_eq!(receipt.amount_spent, 100);
    assert_eq!(h.balance(user.id).await, 400);
}

#[tokio::test]
async fn test_cancelled_purchase_leaves_no_trace() {
    let h = Harness::new();
    let user = h.account(500);
    let potion = h.consumable(100);

    let mut holder = h.store.begin().await.unwrap();
    holder.account(user.id, LockKind::Exclusive).await.unwrap();

    let cancelled = tokio::time::timeout(
        Duration::from_millis(50),
        h.service.purchase(user.id, potion.id),
    )
    .await;
    assert!(cancelled.is_err());

    holder.rollback().await.unwrap();

    assert_eq!(h.balance(user.id).await, 500);
    assert_eq!(h.store.transaction_count(), 0);
    assert_eq!(h.store.lock_table_len(), 0);

    // Nothing is left holding the account lock
    h.service.purchase(user.id, potion.id).await.unwrap();
    assert_eq!(h.balance(user.id).await, 400);
}

#[tokio::test]
async fn test_lock_timeout_is_infrastructure_failure() {
    let h = Harness::with_store(MemoryStore::new().with_lock_timeout(Duration::from_millis(20)));
    let user = h.account(500);
    let potion = h.consumable(100);

    let mut holder = h.store.begin().await.unwrap();
    holder.account(user.id, LockKind::Exclusive).await.unwrap();

    let err = h.service.purchase(user.id, potion.id).await.unwrap_err();

    assert!(matches!(err, EngineError::Database(DbError::LockTimeout(_))));
    assert_eq!(err.kind(), None);
    drop(holder);
    assert_eq!(h.balance(user.id).await, 500);
}

#[tokio::test]
async fn test_popular_products_counts_completed_purchases() {
    let h = Harness::new();
    let user = h.account(5_000);
    let potion = h.consumable(100);
    let elixir = h.consumable(200);
    let sword = h.permanent(300);

    for product in [potion.id, elixir.id, elixir.id, sword.id, elixir.id, potion.id] {
        h.service.purchase(user.id, product).await.unwrap();
    }

    let ranked = h
        .service
        .popular_products(chrono::Duration::days(7), 2)
        .await
        .unwrap();

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].product_id, elixir.id);
    assert_eq!(ranked[0].total, 3);
    assert_eq!(ranked[1].product_id, potion.id);
    assert_eq!(ranked[1].total, 2);
}
