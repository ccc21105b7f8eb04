//! Cache Module
//!
//! Two-tier TTL caching: an in-memory primary tier with oldest-entry eviction
//! and an optional durable mirror for entries marked `persistent`.

mod durable;
mod entry;
mod options;
mod stats;
mod store;


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

// Re-export public types
pub use durable::{DurableStore, FileDurableStore, MemoryDurableStore};
pub use entry::CacheEntry;
pub use options::CacheOptions;
pub use stats::{hit_rate, CacheStats};
pub use store::{full_key, CacheManager};

/// Cache manager shared between request handlers, queries and the cleanup
/// task.
pub type SharedCache = Arc<RwLock<CacheManager>>;

/// Wraps a manager for sharing.
pub fn shared(manager: CacheManager) -> SharedCache {
    Arc::new(RwLock::new(manager))
}

// == Public Constants ==
/// Prefix used when none is given
pub const DEFAULT_PREFIX: &str = "cache";

/// TTL used when none is given
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default primary-tier capacity
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed serialized value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
