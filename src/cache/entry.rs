//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::duration_ms;

// == Cache Entry ==
/// Represents a single cache entry with its payload and timing metadata.
///
/// Serializes as `{"data": .., "timestamp": .., "expiresAt": ..}`, which is
/// also the format written to the durable tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The stored payload, opaque to the cache
    pub data: Value,
    /// Creation timestamp (Unix milliseconds), used for eviction ordering
    pub timestamp: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry created at `now_ms` that lives for `ttl`.
    pub fn new(data: Value, now_ms: u64, ttl: Duration) -> Self {
        Self {
            data,
            timestamp: now_ms,
            expires_at: now_ms.saturating_add(duration_ms(ttl)),
        }
    }

    // == Validity ==
    /// Checks if the entry has expired at `now_ms`.
    ///
    /// Boundary condition: an entry is expired once `now_ms >= expires_at`, so
    /// a read exactly `ttl` after creation already misses.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    /// Inverse of [`CacheEntry::is_expired_at`].
    pub fn is_valid_at(&self, now_ms: u64) -> bool {
        !self.is_expired_at(now_ms)
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at.saturating_sub(now_ms)
    }
}
