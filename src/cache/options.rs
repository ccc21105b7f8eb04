//! Per-call cache options.

use std::time::Duration;

use crate::cache::DEFAULT_PREFIX;

/// Options accepted by every [`CacheManager`](super::CacheManager)
/// operation. Operations ignore the fields they have no use for, e.g. `get`
/// ignores `ttl`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Entry lifetime; the manager's default TTL when `None`
    pub ttl: Option<Duration>,
    /// Mirror to and fall back on the durable tier
    pub persistent: bool,
    /// Key namespace; `"cache"` when `None`
    pub prefix: Option<String>,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// The prefix keys are stored under.
    pub fn key_prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(DEFAULT_PREFIX)
    }
}
