//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of primary-tier cache entries
    pub max_entries: usize,
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Cache cleanup interval in seconds
    pub cleanup_interval: u64,
    /// Rate limit sweep interval in seconds
    pub rate_limit_sweep_interval: u64,
    /// File backing the durable tier; no durable tier when unset
    pub persist_path: Option<PathBuf>,
    /// Size limit of the durable tier file in bytes
    pub persist_quota_bytes: usize,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 100)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cache cleanup frequency in seconds (default: 300)
    /// - `RATE_LIMIT_SWEEP_INTERVAL` - Rate limit sweep frequency in seconds (default: 300)
    /// - `PERSIST_PATH` - Durable tier file (default: unset)
    /// - `PERSIST_QUOTA_BYTES` - Durable tier size limit (default: 5 MiB)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            rate_limit_sweep_interval: env_or(
                "RATE_LIMIT_SWEEP_INTERVAL",
                defaults.rate_limit_sweep_interval,
            ),
            persist_path: env::var("PERSIST_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            persist_quota_bytes: env_or("PERSIST_QUOTA_BYTES", defaults.persist_quota_bytes),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval.max(1))
    }

    pub fn rate_limit_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_sweep_interval.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 100,
            default_ttl: 300,
            server_port: 3000,
            cleanup_interval: 300,
            rate_limit_sweep_interval: 300,
            persist_path: None,
            persist_quota_bytes: 5 * 1024 * 1024,
        }
    }
}
