//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use emporium_cache::{CacheError, CacheResult, InventoryCache, MemoryCache};
use emporium_core::{Account, InventorySnapshot, NewProduct, Product, ProductType, UserId};
use emporium_db::{MemoryStore, Store};
use emporium_engine::{EngineSettings, PurchaseService};

/// In-memory store + cache wired into a service.
pub struct Harness {
    pub store: MemoryStore,
    pub cache: MemoryCache,
    pub service: Arc<PurchaseService<MemoryStore>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let cache = MemoryCache::new();
        let service = PurchaseService::new(
            store.clone(),
            Arc::new(cache.clone()),
            Arc::new(cache.clone()),
            EngineSettings::default(),
        )
        .with_report_cache(Arc::new(cache.clone()));

        Harness {
            store,
            cache,
            service: Arc::new(service),
        }
    }

    /// Builds a harness whose inventory cache is `inventory_cache`.
    pub fn with_inventory_cache(store: MemoryStore, inventory_cache: Arc<dyn InventoryCache>) -> Self {
        let cache = MemoryCache::new();
        let service = PurchaseService::new(
            store.clone(),
            inventory_cache,
            Arc::new(cache.clone()),
            EngineSettings::default(),
        );

        Harness {
            store,
            cache,
            service: Arc::new(service),
        }
    }

    pub fn account(&self, balance: i64) -> Account {
        self.store.create_account(balance)
    }

    pub fn consumable(&self, price: i64) -> Product {
        self.store
            .create_product(NewProduct::active("Potion", price, ProductType::Consumable))
    }

    pub fn permanent(&self, price: i64) -> Product {
        self.store
            .create_product(NewProduct::active("Sword", price, ProductType::Permanent))
    }

    pub async fn balance(&self, user_id: UserId) -> i64 {
        self.store
            .get_account(user_id)
            .await
            .unwrap()
            .expect("account exists")
            .balance
    }
}

/// Records, at each invalidation, the committed balance the store reports.
///
/// Proves invalidation runs after the commit is visible.
pub struct ObservingCache {
    pub store: MemoryStore,
    pub observed: Mutex<Vec<(UserId, i64)>>,
}

impl ObservingCache {
    pub fn new(store: MemoryStore) -> Self {
        ObservingCache {
            store,
            observed: Mutex::new(Vec::new()),
        }
    }

    pub fn observed(&self) -> Vec<(UserId, i64)> {
        self.observed.lock().unwrap().clone()
    }
}

#[async_trait]
impl InventoryCache for ObservingCache {
    async fn get(&self, _user_id: UserId) -> CacheResult<Option<InventorySnapshot>> {
        Ok(None)
    }

    async fn generation(&self, _user_id: UserId) -> CacheResult<u64> {
        Ok(0)
    }

    async fn populate(
        &self,
        _: UserId,
        _: &InventorySnapshot,
        _: Duration,
        _: u64,
    ) -> CacheResult<bool> {
        Ok(true)
    }

    async fn invalidate(&self, user_id: UserId) -> CacheResult<()> {
        let balance = self
            .store
            .get_account(user_id)
            .await
            .unwrap()
            .map(|a| a.balance)
            .unwrap_or(-1);
        self.observed.lock().unwrap().push((user_id, balance));
        Ok(())
    }

    async fn sweep(&self) -> CacheResult<u64> {
        Ok(0)
    }
}

/// A cache that is down for every call.
pub struct BrokenCache;

fn broken() -> CacheError {
    CacheError::Serialization(serde_json::from_str::<i32>("down").unwrap_err())
}

#[async_trait]
impl InventoryCache for BrokenCache {
    async fn get(&self, _user_id: UserId) -> CacheResult<Option<InventorySnapshot>> {
        Err(broken())
    }

    async fn generation(&self, _user_id: UserId) -> CacheResult<u64> {
        Err(broken())
    }

    async fn populate(
        &self,
        _: UserId,
        _: &InventorySnapshot,
        _: Duration,
        _: u64,
    ) -> CacheResult<bool> {
        Err(broken())
    }

    async fn invalidate(&self, _user_id: UserId) -> CacheResult<()> {
        Err(broken())
    }

    async fn sweep(&self) -> CacheResult<u64> {
        Err(broken())
    }
}

/// Wraps a [`MemoryCache`] and holds every `populate` until released.
///
/// Lets a test commit a write while a reader sits between its store read and
/// its cache write.
pub struct GatedCache {
    pub inner: MemoryCache,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedCache {
    pub fn new(inner: MemoryCache) -> Self {
        GatedCache {
            inner,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl InventoryCache for GatedCache {
    async fn get(&self, user_id: UserId) -> CacheResult<Option<InventorySnapshot>> {
        self.inner.get(user_id).await
    }

    async fn generation(&self, user_id: UserId) -> CacheResult<u64> {
        self.inner.generation(user_id).await
    }

    async fn populate(
        &self,
        user_id: UserId,
        snapshot: &InventorySnapshot,
        ttl: Duration,
        generation: u64,
    ) -> CacheResult<bool> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.populate(user_id, snapshot, ttl, generation).await
    }

    async fn invalidate(&self, user_id: UserId) -> CacheResult<()> {
        self.inner.invalidate(user_id).await
    }

    async fn sweep(&self) -> CacheResult<u64> {
        self.inner.sweep().await
    }
}
