//! Pricing Store Configuration
//!
//! ## Environment Variables
//!
//! - `TERRACOST_DATA_DIR`: RocksDB snapshot store directory; the
//!   in-memory store is used when unset
//! - `TERRACOST_CACHE_TTL_SECS`: rate cache TTL (default: 3600)
//! - `TERRACOST_POOL_SIZE`: concurrent store lookups (default: 8)
//! - `TERRACOST_POOL_ACQUIRE_MS`: pool acquire timeout (default: 1000)
//! - `TERRACOST_PRICING_DEADLINE_MS`: per-request pricing deadline
//!   (default: 10000)

use std::path::PathBuf;
use std::time::Duration;

use crate::pricing::cache::DEFAULT_TTL_SECS;

/// Cache governance schema version. Bump when the cached rate layout
/// changes; old entries then invalidate silently.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Pricing store and cache configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: Option<PathBuf>,
    pub cache_ttl_secs: i64,
    pub pool_size: usize,
    pub pool_acquire_timeout: Duration,
    pub pricing_deadline: Duration,
}

impl StoreConfig {
    /// Load store configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let data_dir = std::env::var("TERRACOST_DATA_DIR").ok().map(PathBuf::from);
        let cache_ttl_secs: i64 = std::env::var("TERRACOST_CACHE_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_TTL_SECS.to_string())
            .parse()?;
        let pool_size: usize = std::env::var("TERRACOST_POOL_SIZE")
            .unwrap_or_else(|_| "8".to_string())
            .parse()?;
        let acquire_ms: u64 = std::env::var("TERRACOST_POOL_ACQUIRE_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()?;
        let deadline_ms: u64 = std::env::var("TERRACOST_PRICING_DEADLINE_MS")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()?;

        Ok(Self {
            data_dir,
            cache_ttl_secs,
            pool_size,
            pool_acquire_timeout: Duration::from_millis(acquire_ms),
            pricing_deadline: Duration::from_millis(deadline_ms),
        })
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            cache_ttl_secs: DEFAULT_TTL_SECS,
            pool_size: 8,
            pool_acquire_timeout: Duration::from_millis(1000),
            pricing_deadline: Duration::from_secs(10),
        }
    }
}
