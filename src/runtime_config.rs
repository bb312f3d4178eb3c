//! # Runtime Configuration Module
//!
//! Environment variable based configuration for the data cache and the execution mode.
//!
//! ## Environment Variables
//!
//! ### `BRRTNAV_PRELOAD_WINDOW_MS`
//!
//! How long a cached entry stays fresh for readers that are neither live subscribers nor
//! history-driven. Preloads that land within this window are reused by the navigation that
//! follows them.
//!
//! Default: `5000`
//!
//! ### `BRRTNAV_CACHE_TTL_MS`
//!
//! Age after which an entry with no live subscribers is evicted by the sweep.
//!
//! Default: `180000` (3 minutes)
//!
//! ### `BRRTNAV_SWEEP_INTERVAL_MS`
//!
//! Period of the background sweep thread.
//!
//! Default: `300000` (5 minutes)
//!
//! ### `BRRTNAV_EXECUTION`
//!
//! `client` or `server`. Server execution never treats cached data as stale and does not
//! run the sweep; caches are scoped per request instead.
//!
//! Default: `client`
//!
//! ## Usage
//!
//! ```rust
//! use brrtnav::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Preload window: {:?}", config.cache.preload_window);
//! ```
//!
//! Values accept decimal or `0x`-prefixed hexadecimal milliseconds; unparsable values fall
//! back to the default.

use crate::intent::ExecutionMode;
use std::env;
use std::time::Duration;

pub const DEFAULT_PRELOAD_WINDOW_MS: u64 = 5_000;
pub const DEFAULT_CACHE_TTL_MS: u64 = 180_000;
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 300_000;

/// Data cache timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Freshness window for non-live, non-native reads
    pub preload_window: Duration,
    /// Age after which unobserved entries are evicted
    pub ttl: Duration,
    /// Period of the background sweep
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            preload_window: Duration::from_millis(DEFAULT_PRELOAD_WINDOW_MS),
            ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
        }
    }
}

/// Runtime configuration loaded from environment variables.
///
/// Load this at startup using [`RuntimeConfig::from_env()`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub cache: CacheConfig,
    pub execution: ExecutionMode,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let cache = CacheConfig {
            preload_window: duration_var("BRRTNAV_PRELOAD_WINDOW_MS", DEFAULT_PRELOAD_WINDOW_MS),
            ttl: duration_var("BRRTNAV_CACHE_TTL_MS", DEFAULT_CACHE_TTL_MS),
            sweep_interval: duration_var("BRRTNAV_SWEEP_INTERVAL_MS", DEFAULT_SWEEP_INTERVAL_MS),
        };
        let execution = env::var("BRRTNAV_EXECUTION")
            .map(|v| ExecutionMode::parse(&v))
            .unwrap_or_default();
        RuntimeConfig { cache, execution }
    }
}

fn duration_var(name: &str, default_ms: u64) -> Duration {
    let ms = match env::var(name) {
        Ok(val) => parse_millis(&val).unwrap_or(default_ms),
        Err(_) => default_ms,
    };
    Duration::from_millis(ms)
}

fn parse_millis(val: &str) -> Option<u64> {
    let val = val.trim();
    if let Some(hex) = val.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_millis() {
        assert_eq!(parse_millis("5000"), Some(5000));
        assert_eq!(parse_millis("0x1388"), Some(5000));
        assert_eq!(parse_millis(" 42 "), Some(42));
        assert_eq!(parse_millis("soon"), None);
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.cache.preload_window, Duration::from_secs(5));
        assert_eq!(config.cache.ttl, Duration::from_secs(180));
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.execution, ExecutionMode::Client);
    }
}
