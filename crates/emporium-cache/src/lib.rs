//! # emporium-cache: Cache Coherency Layer
//!
//! Derived inventory snapshots and top-up idempotency markers.
//!
//! ## Ordering Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  unit.commit()  ──►  InventoryCache::invalidate(user)                   │
//! │                                                                         │
//! │  Never the other way round: a reader that misses between an early      │
//! │  invalidate and the commit would repopulate the cache with stale rows. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Read-Through Guard
//! ```text
//! reader                               writer
//! ──────                               ──────
//! g = generation(user)
//! rows = store.inventory_for_user
//!                                      commit
//!                                      invalidate: gen += 1, DEL snapshot
//! populate(user, rows, ttl, g)
//!   gen != g ──► not written
//! ```
//!
//! ## Module Organization
//!
//! - [`error`] - `CacheError`
//! - [`redis`] - Production implementation over `redis::aio::ConnectionManager`
//! - [`memory`] - In-process implementation with expiry, for tests

pub mod error;
pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::time::Duration;

use emporium_core::{InventorySnapshot, ProductPopularity, UserId};

pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use self::redis::RedisCache;

/// Read-through cache of per-user inventory snapshots.
#[async_trait]
pub trait InventoryCache: Send + Sync {
    /// Reads the cached snapshot, if present and not expired.
    async fn get(&self, user_id: UserId) -> CacheResult<Option<InventorySnapshot>>;

    /// Current invalidation generation of the user's snapshot (0 if never
    /// invalidated).
    async fn generation(&self, user_id: UserId) -> CacheResult<u64>;

    /// Stores a freshly built snapshot with a TTL, but only while the
    /// generation still equals `generation`.
    ///
    /// ## Returns
    /// * `Ok(true)` - Snapshot written
    /// * `Ok(false)` - An invalidation happened since `generation` was read
    async fn populate(
        &self,
        user_id: UserId,
        snapshot: &InventorySnapshot,
        ttl: Duration,
        generation: u64,
    ) -> CacheResult<bool>;

    /// Bumps the user's generation and deletes the snapshot. Deleting a
    /// missing key is not an error.
    async fn invalidate(&self, user_id: UserId) -> CacheResult<()>;

    /// Deletes every snapshot. Returns how many keys were removed.
    async fn sweep(&self) -> CacheResult<u64>;
}

/// Replay markers for top-up requests.
///
/// `key` is the client's idempotency token; implementations namespace it.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// True if a marker for `key` is present.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Atomically sets the marker if absent (`SET NX EX`).
    ///
    /// Returns false when the marker already existed.
    async fn reserve(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Removes the marker so the key can be retried.
    async fn release(&self, key: &str) -> CacheResult<()>;
}

/// Short-lived cache of aggregated reports.
#[async_trait]
pub trait ReportCache: Send + Sync {
    /// Reads a cached popular-products report.
    async fn get_popular(&self, key: &str) -> CacheResult<Option<Vec<ProductPopularity>>>;

    /// Stores a popular-products report with a TTL.
    async fn put_popular(
        &self,
        key: &str,
        report: &[ProductPopularity],
        ttl: Duration,
    ) -> CacheResult<()>;
}
