//! Query Module
//!
//! Read-through caching on top of the cache manager: a [`CachedQuery`] serves
//! a key from the cache or from its fetcher, and supports refetching,
//! invalidation and optimistic mutation.

mod cached_query;
mod client;
mod inflight;

pub use cached_query::{CachedQuery, QueryState};
pub use client::{QueryClient, QueryOptions};
