//! # emporium-core: Pure Domain Logic for the Purchase Engine
//!
//! This crate holds the domain model shared by every other crate in the
//! workspace. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Emporium Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Request layer (external)                        │   │
//! │  │    purchase ──► use ──► add-funds ──► inventory                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                emporium-engine (orchestrator)                   │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────┐ ┌─────────────▼───────────────────┐   │
//! │  │   emporium-db (PostgreSQL)  │ │   emporium-cache (Redis)        │   │
//! │  └──────────────┬──────────────┘ └─────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────────────────────▼───────────────────┐   │
//! │  │              ★ emporium-core (THIS CRATE) ★                     │   │
//! │  │   types • ids • error taxonomy • validation • cache keys        │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`ids`] - Strongly typed user and product identifiers
//! - [`types`] - Domain types (Account, Product, InventoryEntry, Transaction)
//! - [`snapshot`] - Derived inventory snapshot and its cache keys
//! - [`error`] - Domain error taxonomy
//! - [`validation`] - Request-level input checks
//!
//! ## Design Principles
//!
//! 1. **Integer Money**: balances and prices are `i64` in the smallest currency unit
//! 2. **Checked Arithmetic**: a balance never goes below zero, never overflows
//! 3. **Explicit Errors**: every failure is a typed variant with a stable code
//!
//! ## Example Usage
//!
//! ```rust
//! use emporium_core::{Account, UserId};
//! use chrono::Utc;
//!
//! let mut account = Account { id: UserId::new(1), balance: 500, created_at: Utc::now() };
//! account.apply_delta(-100).unwrap();
//! assert_eq!(account.balance, 400);
//! assert!(account.apply_delta(-1_000).is_err());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ids;
pub mod snapshot;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use ids::{ProductId, UserId};
pub use snapshot::{
    idempotency_cache_key, inventory_cache_key, inventory_generation_key,
    popular_products_cache_key, ConsumableItem, InventorySnapshot, OwnedItem,
    PermanentItem, INVENTORY_CACHE_PATTERN,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default lifetime of a cached inventory snapshot (5 hours).
pub const DEFAULT_INVENTORY_CACHE_TTL_SECS: u64 = 60 * 60 * 5;

/// Default lifetime of an idempotency marker (24 hours).
pub const DEFAULT_IDEMPOTENCY_TTL_SECS: u64 = 60 * 60 * 24;

/// Default lifetime of a cached popular-products report (1 hour).
pub const DEFAULT_POPULAR_PRODUCTS_CACHE_TTL_SECS: u64 = 60 * 60;

/// Default upper bound for a single top-up, enforced at the request boundary.
pub const DEFAULT_MAX_TOP_UP_AMOUNT: i64 = 10_000;

/// Maximum length of a client supplied idempotency key.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;
