//! # emporium-db: Database Layer for the Purchase Engine
//!
//! Relational persistence for accounts, the product catalog, the inventory
//! ledger and the transaction log, behind the [`Store`] / [`UnitOfWork`]
//! traits.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Emporium Data Flow                               │
//! │                                                                         │
//! │  PurchaseService::purchase(user, product)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   emporium-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ Store traits  │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (store.rs)   │    │ (repository/) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ Database ─────┼───►│ AccountRepo   │    │ 0001_init    │  │   │
//! │  │   │ MemoryStore   │    │ CatalogRepo   │    │              │  │   │
//! │  │   │               │    │ InventoryRepo │    │              │  │   │
//! │  │   │               │    │ TransactionRepo    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     PostgreSQL                                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`store`] - `Store` / `UnitOfWork` traits and `LockKind`
//! - [`postgres`] - PostgreSQL units of work
//! - [`memory`] - In-memory store with the same locking semantics
//! - [`repository`] - SQL for each table
//!
//! ## Usage
//!
//! ```rust,ignore
//! use emporium_db::{Database, DbConfig, LockKind, Store, UnitOfWork};
//!
//! let db = Database::new(DbConfig::new("postgres://localhost/emporium")).await?;
//!
//! let mut unit = db.begin().await?;
//! let account = unit.account(user_id, LockKind::Exclusive).await?;
//! unit.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod postgres;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use memory::{MemoryStore, MemoryUnit};
pub use pool::{Database, DbConfig};
pub use postgres::PgUnitOfWork;
pub use store::{LockKind, Store, UnitOfWork};

// Repository re-exports for convenience
pub use repository::{
    AccountRepository, CatalogRepository, InventoryRepository, TransactionRepository,
};
