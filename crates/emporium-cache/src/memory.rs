//! In-process cache with per-key expiry.
//!
//! Stores the same string payloads under the same keys as [`RedisCache`]
//! so tests observe identical key conventions.
//!
//! [`RedisCache`]: crate::redis::RedisCache

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::CacheResult;
use crate::{IdempotencyStore, InventoryCache, ReportCache};
use emporium_core::{
    idempotency_cache_key, inventory_cache_key, InventorySnapshot, ProductPopularity, UserId,
    INVENTORY_CACHE_PATTERN,
};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    generations: HashMap<UserId, u64>,
}

impl State {
    fn evict_expired(&mut self, now: Instant) {
        self.entries.retain(|_, e| e.is_live(now));
    }

    fn generation(&self, user_id: UserId) -> u64 {
        self.generations.get(&user_id).copied().unwrap_or(0)
    }
}

/// In-memory cache. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    state: Arc<Mutex<State>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw value of a live key.
    pub fn get_raw(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.state()
            .entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone())
    }

    /// True if `key` is present and not expired.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get_raw(key).is_some()
    }

    /// Writes a raw value, as another process sharing the cache would.
    ///
    /// Expired entries are evicted on every write.
    pub fn set_raw(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let now = Instant::now();
        let mut state = self.state();
        state.evict_expired(now);
        state.entries.insert(
            key.into(),
            Entry {
                value: value.into(),
                expires_at: now + ttl,
            },
        );
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.state().entries.values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored keys, expired ones included.
    pub fn stored_len(&self) -> usize {
        self.state().entries.len()
    }
}

/// Redis-style glob match supporting `*` only.
fn glob_match(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return key.is_empty();
    };
    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };

    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        // No '*' in the pattern
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }

    rest.ends_with(last)
}

#[async_trait]
impl InventoryCache for MemoryCache {
    async fn get(&self, user_id: UserId) -> CacheResult<Option<InventorySnapshot>> {
        match self.get_raw(&inventory_cache_key(user_id)) {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn generation(&self, user_id: UserId) -> CacheResult<u64> {
        Ok(self.state().generation(user_id))
    }

    async fn populate(
        &self,
        user_id: UserId,
        snapshot: &InventorySnapshot,
        ttl: Duration,
        generation: u64,
    ) -> CacheResult<bool> {
        let json = serde_json::to_string(snapshot)?;
        let now = Instant::now();

        let mut state = self.state();
        if state.generation(user_id) != generation {
            debug!(user_id = %user_id, generation, "Stale snapshot not cached");
            return Ok(false);
        }

        state.evict_expired(now);
        state.entries.insert(
            inventory_cache_key(user_id),
            Entry {
                value: json,
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn invalidate(&self, user_id: UserId) -> CacheResult<()> {
        let mut state = self.state();
        *state.generations.entry(user_id).or_insert(0) += 1;
        state.entries.remove(&inventory_cache_key(user_id));
        Ok(())
    }

    async fn sweep(&self) -> CacheResult<u64> {
        let now = Instant::now();
        let mut state = self.state();
        state.evict_expired(now);

        let before = state.entries.len();
        state
            .entries
            .retain(|key, _| !glob_match(INVENTORY_CACHE_PATTERN, key));
        let deleted = (before - state.entries.len()) as u64;

        debug!(deleted, "In-memory inventory cache swept");
        Ok(deleted)
    }
}

#[async_trait]
impl IdempotencyStore for MemoryCache {
    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.contains_key(&idempotency_cache_key(key)))
    }

    async fn reserve(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let now = Instant::now();
        let mut state = self.state();
        let cache_key = idempotency_cache_key(key);

        if state.entries.get(&cache_key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }

        state.evict_expired(now);
        state.entries.insert(
            cache_key,
            Entry {
                value: "1".to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str) -> CacheResult<()> {
        self.state().entries.remove(&idempotency_cache_key(key));
        Ok(())
    }
}

#[async_trait]
impl ReportCache for MemoryCache {
    async fn get_popular(&self, key: &str) -> CacheResult<Option<Vec<ProductPopularity>>> {
        match self.get_raw(key) {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put_popular(
        &self,
        key: &str,
        report: &[ProductPopularity],
        ttl: Duration,
    ) -> CacheResult<()> {
        self.set_raw(key, serde_json::to_string(report)?, ttl);
        Ok(())
    }
}
