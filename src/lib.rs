//! Poligap Cache - client-side caching and request throttling
//!
//! A two-tier TTL cache (bounded memory tier plus an optional durable tier),
//! a query layer that fetches through the cache, and a fixed-window rate
//! limiter, served over a small REST API.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod ratelimit;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheManager, CacheOptions, CacheStats};
pub use config::Config;
pub use query::{CachedQuery, QueryClient, QueryOptions};
pub use ratelimit::{RateLimitPolicy, RateLimiter};
pub use tasks::BackgroundTasks;
