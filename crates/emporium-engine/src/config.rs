//! Engine configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                    | Default                          |
//! |-----------------------------|----------------------------------|
//! | `DATABASE_URL`              | `postgres://localhost/emporium`  |
//! | `REDIS_URL`                 | `redis://127.0.0.1:6379`         |
//! | `DB_MAX_CONNECTIONS`        | `10`                             |
//! | `DB_LOCK_TIMEOUT_MS`        | `5000`                           |
//! | `INVENTORY_CACHE_TTL_SECS`  | `18000` (5 hours)                |
//! | `IDEMPOTENCY_TTL_SECS`      | `86400` (24 hours)               |
//! | `POPULAR_PRODUCTS_CACHE_TTL_SECS` | `3600` (1 hour)            |
//! | `MAX_TOP_UP_AMOUNT`         | `10000`                          |
//! | `CACHE_SWEEP_INTERVAL_SECS` | `3600`                           |

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use emporium_core::{
    DEFAULT_IDEMPOTENCY_TTL_SECS, DEFAULT_INVENTORY_CACHE_TTL_SECS, DEFAULT_MAX_TOP_UP_AMOUNT,
    DEFAULT_POPULAR_PRODUCTS_CACHE_TTL_SECS,
};
use emporium_db::DbConfig;

/// Knobs the purchase service reads on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Lifetime of a cached inventory snapshot.
    pub inventory_cache_ttl: Duration,

    /// How long a used idempotency key is remembered.
    pub idempotency_ttl: Duration,

    /// Lifetime of a cached popular-products report.
    pub popular_products_cache_ttl: Duration,

    /// Largest single top-up.
    pub max_top_up_amount: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            inventory_cache_ttl: Duration::from_secs(DEFAULT_INVENTORY_CACHE_TTL_SECS),
            idempotency_ttl: Duration::from_secs(DEFAULT_IDEMPOTENCY_TTL_SECS),
            popular_products_cache_ttl: Duration::from_secs(DEFAULT_POPULAR_PRODUCTS_CACHE_TTL_SECS),
            max_top_up_amount: DEFAULT_MAX_TOP_UP_AMOUNT,
        }
    }
}

/// Process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string
    pub redis_url: String,

    /// Pool size
    pub db_max_connections: u32,

    /// Row lock wait bound per unit of work
    pub db_lock_timeout: Duration,

    /// Interval between inventory cache sweeps
    pub cache_sweep_interval: Duration,

    /// Per-call service settings
    pub settings: EngineSettings,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = EngineConfig {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost/emporium".to_string()),

            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),

            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,

            db_lock_timeout: Duration::from_millis(parse_or(&lookup, "DB_LOCK_TIMEOUT_MS", 5000)?),

            cache_sweep_interval: Duration::from_secs(parse_or(
                &lookup,
                "CACHE_SWEEP_INTERVAL_SECS",
                3600,
            )?),

            settings: EngineSettings {
                inventory_cache_ttl: Duration::from_secs(parse_or(
                    &lookup,
                    "INVENTORY_CACHE_TTL_SECS",
                    DEFAULT_INVENTORY_CACHE_TTL_SECS,
                )?),
                idempotency_ttl: Duration::from_secs(parse_or(
                    &lookup,
                    "IDEMPOTENCY_TTL_SECS",
                    DEFAULT_IDEMPOTENCY_TTL_SECS,
                )?),
                popular_products_cache_ttl: Duration::from_secs(parse_or(
                    &lookup,
                    "POPULAR_PRODUCTS_CACHE_TTL_SECS",
                    DEFAULT_POPULAR_PRODUCTS_CACHE_TTL_SECS,
                )?),
                max_top_up_amount: parse_or(&lookup, "MAX_TOP_UP_AMOUNT", DEFAULT_MAX_TOP_UP_AMOUNT)?,
            },
        };

        if config.settings.max_top_up_amount <= 0 {
            return Err(ConfigError::InvalidValue("MAX_TOP_UP_AMOUNT".to_string()));
        }
        if config.cache_sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "CACHE_SWEEP_INTERVAL_SECS".to_string(),
            ));
        }

        Ok(config)
    }

    /// Pool configuration derived from this config.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_url)
            .max_connections(self.db_max_connections)
            .lock_timeout(self.db_lock_timeout)
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
