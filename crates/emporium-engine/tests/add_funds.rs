//! Idempotent top-ups.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::Harness;
use emporium_cache::IdempotencyStore;
use emporium_core::{CoreError, ErrorKind, UserId};
use emporium_db::{LockKind, Store, UnitOfWork};
use emporium_engine::EngineError;

#[tokio::test]
async fn test_credit_once_per_key() {
    let h = Harness::new();
    let user = h.account(100);

    let account = h.service.add_funds(user.id, 250, "topup-1").await.unwrap();
    assert_eq!(account.balance, 350);

    let err = h.service.add_funds(user.id, 250, "topup-1").await.unwrap_err();
    assert_eq!(
        err.as_domain(),
        Some(&CoreError::IdempotencyConflict {
            key: "topup-1".to_string()
        })
    );
    assert_eq!(err.kind(), Some(ErrorKind::Conflict));
    assert_eq!(h.balance(user.id).await, 350);

    // Marker is kept after a successful credit
    assert_eq!(h.cache.get_raw("idempotency:topup-1").as_deref(), Some("1"));

    h.service.add_funds(user.id, 50, "topup-2").await.unwrap();
    assert_eq!(h.balance(user.id).await, 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_double_submit_credits_once() {
    let h = Harness::new();
    let user = h.account(0);

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let service = Arc::clone(&h.service);
            tokio::spawn(async move { service.add_funds(user.id, 500, "same-key").await })
        })
        .collect();

    let mut credited = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => credited += 1,
            Err(EngineError::Domain(CoreError::IdempotencyConflict { .. })) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(credited, 1);
    assert_eq!(rejected, 9);
    assert_eq!(h.balance(user.id).await, 500);
}

#[tokio::test]
async fn test_invalid_amount_releases_key() {
    let h = Harness::new();
    let user = h.account(100);

    for amount in [0, -5] {
        let err = h.service.add_funds(user.id, amount, "k").await.unwrap_err();
        assert_eq!(
            err.as_domain(),
            Some(&CoreError::InvalidTopUpAmount { amount })
        );
        assert!(!h.cache.exists("k").await.unwrap());
    }

    h.service.add_funds(user.id, 10, "k").await.unwrap();
    assert_eq!(h.balance(user.id).await, 110);
}

#[tokio::test]
async fn test_amount_above_cap_rejected() {
    let h = Harness::new();
    let user = h.account(0);
    let cap = h.service.settings().max_top_up_amount;

    let err = h.service.add_funds(user.id, cap + 1, "big").await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(!h.cache.exists("big").await.unwrap());

    let account = h.service.add_funds(user.id, cap, "big").await.unwrap();
    assert_eq!(account.balance, cap);
}

#[tokio::test]
async fn test_bad_key_rejected_before_reserving() {
    let h = Harness::new();
    let user = h.account(0);

    let err = h.service.add_funds(user.id, 10, "").await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    let long = "k".repeat(256);
    let err = h.service.add_funds(user.id, 10, &long).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");

    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn test_unknown_account_releases_key() {
    let h = Harness::new();

    let err = h
        .service
        .add_funds(UserId::new(404), 10, "ghost")
        .await
        .unwrap_err();

    assert_eq!(err.as_domain(), Some(&CoreError::AccountNotFound(UserId::new(404))));
    assert!(!h.cache.exists("ghost").await.unwrap());
}

#[tokio::test]
async fn test_overflow_rejected() {
    let h = Harness::new();
    let user = h.account(i64::MAX - 5);

    let err = h.service.add_funds(user.id, 10, "overflow").await.unwrap_err();

    assert_eq!(
        err.as_domain(),
        Some(&CoreError::BalanceOverflow { user_id: user.id })
    );
    assert_eq!(h.balance(user.id).await, i64::MAX - 5);
    assert!(!h.cache.exists("overflow").await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_top_up_releases_key() {
    let h = Harness::new();
    let user = h.account(100);

    let mut holder = h.store.begin().await.unwrap();
    holder.account(user.id, LockKind::Exclusive).await.unwrap();

    let cancelled = tokio::time::timeout(
        Duration::from_millis(50),
        h.service.add_funds(user.id, 25, "cancel-me"),
    )
    .await;
    assert!(cancelled.is_err());

    // Release runs on a spawned task
    for _ in 0..50 {
        if !h.cache.exists("cancel-me").await.unwrap() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!h.cache.exists("cancel-me").await.unwrap());

    holder.rollback().await.unwrap();
    assert_eq!(h.balance(user.id).await, 100);

    let account = h.service.add_funds(user.id, 25, "cancel-me").await.unwrap();
    assert_eq!(account.balance, 125);
}
