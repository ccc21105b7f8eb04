//! Query Client
//!
//! Entry point for cache-backed queries. One client is built at startup around
//! the shared cache and handed to whatever needs read-through caching.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheOptions, SharedCache};
use crate::query::inflight::InFlight;
use crate::query::CachedQuery;

// == Query Options ==
/// Options for a [`CachedQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Cache lifetime of fetched values; the cache default when `None`
    pub ttl: Option<Duration>,
    /// Mirror fetched values to the durable tier
    pub persistent: bool,
    /// Key namespace
    pub prefix: Option<String>,
    /// Disabled queries never read the cache or fetch on activation
    pub enabled: bool,
    /// Coalesce concurrent misses on the same key into one fetch
    pub dedupe: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            persistent: false,
            prefix: None,
            enabled: true,
            dedupe: false,
        }
    }
}

impl QueryOptions {
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

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn dedupe(mut self) -> Self {
        self.dedupe = true;
        self
    }

    /// The cache options every operation of the query uses.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            ttl: self.ttl,
            persistent: self.persistent,
            prefix: self.prefix.clone(),
        }
    }
}

// == Query Client ==
/// Creates [`CachedQuery`] handles over a shared cache.
///
/// Cloning is cheap; clones share the cache and the in-flight table.
#[derive(Debug, Clone)]
pub struct QueryClient {
    cache: SharedCache,
    in_flight: Arc<InFlight>,
}

impl QueryClient {
    pub fn new(cache: SharedCache) -> Self {
        Self {
            cache,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    pub(crate) fn in_flight(&self) -> &Arc<InFlight> {
        &self.in_flight
    }

    /// Builds a query for `key`. Nothing is read or fetched until
    /// [`CachedQuery::activate`].
    pub fn query<T, F, Fut>(
        &self,
        key: impl Into<String>,
        fetcher: F,
        options: QueryOptions,
    ) -> CachedQuery<T, F>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: Fn() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        CachedQuery::new(self.clone(), key.into(), fetcher, options)
    }
}
