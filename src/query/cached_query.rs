//! Cached Query
//!
//! Read-through caching for a single key: serve from the cache when possible,
//! otherwise call the fetcher and store what it returns.

use std::future::Future;

use anyhow::anyhow;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{full_key, CacheOptions};
use crate::query::inflight::{self, Flight};
use crate::query::{QueryClient, QueryOptions};

// == Query State ==
/// What a query currently exposes to its caller.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    /// Last value read from the cache, fetched, or set by a mutation
    pub data: Option<T>,
    /// Message of the last failed fetch, cleared by the next success
    pub error: Option<String>,
    /// True while the fetcher is running
    pub loading: bool,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            loading: false,
        }
    }
}

// == Cached Query ==
/// A cache-backed view of one key, created by [`QueryClient::query`].
///
/// There is no request coalescing unless [`QueryOptions::dedupe`] is set:
/// two queries that miss on the same key at the same time both call their
/// fetcher, and whichever finishes last owns the cache entry.
pub struct CachedQuery<T, F> {
    client: QueryClient,
    key: String,
    fetcher: F,
    options: QueryOptions,
    cache_options: CacheOptions,
    state: QueryState<T>,
}

impl<T, F, Fut> CachedQuery<T, F>
where
    T: Serialize + DeserializeOwned + Clone,
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    pub(crate) fn new(client: QueryClient, key: String, fetcher: F, options: QueryOptions) -> Self {
        let cache_options = options.cache_options();
        Self {
            client,
            key,
            fetcher,
            options,
            cache_options,
            state: QueryState::default(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn state(&self) -> &QueryState<T> {
        &self.state
    }

    pub fn data(&self) -> Option<&T> {
        self.state.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.state.loading
    }

    // == Activate ==
    /// Serves the key from the cache, fetching on a miss.
    ///
    /// Returns `Ok(None)` without doing anything when the query is disabled.
    /// A failed fetch is returned and recorded in the state; the cache is not
    /// written.
    pub async fn activate(&mut self) -> anyhow::Result<Option<T>> {
        if !self.options.enabled {
            return Ok(None);
        }

        if let Some(value) = self.read_cache().await {
            debug!(key = %self.key, "Query served from cache");
            self.state.data = Some(value.clone());
            self.state.error = None;
            return Ok(Some(value));
        }

        self.load().await.map(Some)
    }

    // == Refetch ==
    /// Calls the fetcher regardless of what is cached and overwrites the
    /// entry on success.
    pub async fn refetch(&mut self) -> anyhow::Result<T> {
        self.load().await
    }

    // == Invalidate ==
    /// Drops the cache entry and the exposed value without fetching.
    pub async fn invalidate(&mut self) {
        self.client
            .cache()
            .write()
            .await
            .remove(&self.key, &self.cache_options);
        self.state.data = None;
    }

    // == Mutate ==
    /// Replaces the exposed value and the cache entry without fetching.
    pub async fn mutate(&mut self, value: T) {
        self.write_cache(&value).await;
        self.state.data = Some(value);
    }

    /// Like [`CachedQuery::mutate`], computing the new value from the
    /// current one.
    pub async fn mutate_with<U>(&mut self, update: U)
    where
        U: FnOnce(Option<&T>) -> T,
    {
        let next = update(self.state.data.as_ref());
        self.mutate(next).await;
    }

    // == Internals ==
    async fn load(&mut self) -> anyhow::Result<T> {
        let full = full_key(self.cache_options.key_prefix(), &self.key);
        let result = {
            let _loading = LoadingFlag::raise(&mut self.state.loading);
            if self.options.dedupe {
                Self::fetch_coalesced(&self.client, &self.fetcher, &full).await
            } else {
                (self.fetcher)().await
            }
        };

        match result {
            Ok(value) => {
                self.write_cache(&value).await;
                self.state.data = Some(value.clone());
                self.state.error = None;
                Ok(value)
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Query fetch failed");
                self.state.error = Some(format!("{e:#}"));
                Err(e)
            }
        }
    }

    async fn fetch_coalesced(client: &QueryClient, fetcher: &F, full: &str) -> anyhow::Result<T> {
        match client.in_flight().join(full) {
            Flight::Leader(guard) => {
                let result = fetcher().await;
                let shared = match &result {
                    Ok(value) => serde_json::to_value(value).map_err(|e| e.to_string()),
                    Err(e) => Err(format!("{e:#}")),
                };
                guard.complete(shared);
                result
            }
            Flight::Follower(slot) => match inflight::wait(slot).await {
                Some(Ok(raw)) => Ok(serde_json::from_value(raw)?),
                Some(Err(message)) => Err(anyhow!(message)),
                None => {
                    debug!(key = %full, "Coalesced fetch abandoned, fetching directly");
                    fetcher().await
                }
            },
        }
    }

    async fn read_cache(&self) -> Option<T> {
        let raw = self
            .client
            .cache()
            .write()
            .await
            .get(&self.key, &self.cache_options)?;

        match serde_json::from_value(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Cached value has an unexpected shape, ignoring it");
                None
            }
        }
    }

    async fn write_cache(&self, value: &T) {
        match serde_json::to_value(value) {
            Ok(raw) => self
                .client
                .cache()
                .write()
                .await
                .set(&self.key, raw, &self.cache_options),
            Err(e) => warn!(key = %self.key, error = %e, "Query value is not serializable, not caching it"),
        }
    }
}

/// Holds `loading` up for the duration of a fetch. Dropping it lowers the
/// flag, including when the fetch future itself is dropped.
struct LoadingFlag<'a>(&'a mut bool);

impl<'a> LoadingFlag<'a> {
    fn raise(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}
