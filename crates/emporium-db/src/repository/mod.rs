//! # Repository Module
//!
//! PostgreSQL statements for the four relational stores.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Executor-Generic Repositories                        │
//! │                                                                         │
//! │  Each repository is a namespace of async fns generic over              │
//! │  `PgExecutor`, so the same SQL runs against either:                    │
//! │                                                                         │
//! │  &PgPool                 ← non-locking reads, seeding                  │
//! │  &mut PgConnection       ← inside a unit of work (postgres.rs)         │
//! │                                                                         │
//! │  AccountRepository::get(&mut *tx, user_id, LockKind::Exclusive)        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT id, balance, created_at FROM accounts WHERE id = $1 FOR UPDATE │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`AccountRepository`] - Balances and row locks
//! - [`CatalogRepository`] - Products
//! - [`InventoryRepository`] - (user, product) holdings
//! - [`TransactionRepository`] - Append-only purchase log and analytics

pub mod account;
pub mod catalog;
pub mod inventory;
pub mod transaction;

pub use account::AccountRepository;
pub use catalog::CatalogRepository;
pub use inventory::InventoryRepository;
pub use transaction::TransactionRepository;
