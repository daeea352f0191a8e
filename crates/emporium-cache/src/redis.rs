//! # Redis Cache
//!
//! [`InventoryCache`] and [`IdempotencyStore`] over a shared
//! `ConnectionManager`.
//!
//! ## Commands
//! ```text
//! get          GET   user:<id>:inventory
//! generation   GET   user:<id>:inventory:gen
//! populate     EVAL  compare gen, then SET user:<id>:inventory <json> EX <ttl>
//! invalidate   MULTI INCR user:<id>:inventory:gen; DEL user:<id>:inventory; EXEC
//! sweep        SCAN  <cursor> MATCH user:*:inventory COUNT 100  → DEL ...
//! exists       EXISTS idempotency:<key>
//! reserve      SET   idempotency:<key> 1 NX EX <ttl>
//! release      DEL   idempotency:<key>
//! get_popular  GET   analytics:popular-products:<window>:<limit>
//! put_popular  SET   analytics:popular-products:<window>:<limit> <json> EX <ttl>
//! ```

use ::redis::aio::ConnectionManager;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::CacheResult;
use crate::{IdempotencyStore, InventoryCache, ReportCache};
use emporium_core::{
    idempotency_cache_key, inventory_cache_key, inventory_generation_key, InventorySnapshot,
    ProductPopularity, UserId, INVENTORY_CACHE_PATTERN,
};

/// Keys fetched per SCAN round trip.
const SCAN_BATCH: usize = 100;

/// KEYS[1] snapshot, KEYS[2] generation; ARGV[1] expected generation,
/// ARGV[2] payload, ARGV[3] TTL seconds.
const POPULATE_IF_CURRENT: &str = r#"
local current = redis.call('GET', KEYS[2]) or '0'
if current ~= ARGV[1] then
    return 0
end
redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
return 1
"#;

/// Redis-backed cache. Cheap to clone.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    populate_script: ::redis::Script,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Connects to Redis.
    ///
    /// ## Arguments
    /// * `url` - `redis://host:port/db`
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = ::redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis");
        Ok(Self::new(conn))
    }

    /// Wraps an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        RedisCache {
            conn,
            populate_script: ::redis::Script::new(POPULATE_IF_CURRENT),
        }
    }

    /// Round-trips a PING.
    pub async fn health_check(&self) -> bool {
        let mut conn = self.conn.clone();
        ::redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}

/// TTL in whole seconds; Redis rejects `EX 0`.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl InventoryCache for RedisCache {
    async fn get(&self, user_id: UserId) -> CacheResult<Option<InventorySnapshot>> {
        let mut conn = self.conn.clone();
        let key = inventory_cache_key(user_id);

        let raw: Option<String> = ::redis::cmd("GET").arg(&key).query_async(&mut conn).await?;

        match raw {
            Some(json) => {
                debug!(key = %key, "Inventory cache hit");
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => {
                debug!(key = %key, "Inventory cache miss");
                Ok(None)
            }
        }
    }

    async fn generation(&self, user_id: UserId) -> CacheResult<u64> {
        let mut conn = self.conn.clone();
        let current: Option<u64> = ::redis::cmd("GET")
            .arg(inventory_generation_key(user_id))
            .query_async(&mut conn)
            .await?;
        Ok(current.unwrap_or(0))
    }

    async fn populate(
        &self,
        user_id: UserId,
        snapshot: &InventorySnapshot,
        ttl: Duration,
        generation: u64,
    ) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let key = inventory_cache_key(user_id);
        let json = serde_json::to_string(snapshot)?;

        let written: i64 = self
            .populate_script
            .key(&key)
            .key(inventory_generation_key(user_id))
            .arg(generation)
            .arg(json)
            .arg(ttl_secs(ttl))
            .invoke_async(&mut conn)
            .await?;

        let written = written == 1;
        debug!(key = %key, generation, written, "Inventory cache populate");
        Ok(written)
    }

    async fn invalidate(&self, user_id: UserId) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let key = inventory_cache_key(user_id);

        let (generation, removed): (u64, i64) = ::redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(inventory_generation_key(user_id))
            .cmd("DEL")
            .arg(&key)
            .query_async(&mut conn)
            .await?;

        debug!(key = %key, generation, removed, "Inventory cache invalidated");
        Ok(())
    }

    async fn sweep(&self) -> CacheResult<u64> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(INVENTORY_CACHE_PATTERN)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let removed: u64 = ::redis::cmd("DEL").arg(&keys).query_async(&mut conn).await?;
                deleted += removed;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        info!(deleted, "Inventory cache swept");
        Ok(deleted)
    }
}

#[async_trait]
impl IdempotencyStore for RedisCache {
    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let found: bool = ::redis::cmd("EXISTS")
            .arg(idempotency_cache_key(key))
            .query_async(&mut conn)
            .await?;
        Ok(found)
    }

    async fn reserve(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = ::redis::cmd("SET")
            .arg(idempotency_cache_key(key))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await?;

        let reserved = reply.is_some();
        debug!(reserved, "Idempotency marker reservation");
        Ok(reserved)
    }

    async fn release(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        ::redis::cmd("DEL")
            .arg(idempotency_cache_key(key))
            .query_async::<i64>(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ReportCache for RedisCache {
    async fn get_popular(&self, key: &str) -> CacheResult<Option<Vec<ProductPopularity>>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = ::redis::cmd("GET").arg(key).query_async(&mut conn).await?;

        match raw {
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
        let mut conn = self.conn.clone();
        ::redis::cmd("SET")
            .arg(key)
            .arg(serde_json::to_string(report)?)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}
