//! Periodic Sweeps
//!
//! Background tasks that drop expired cache entries and ended rate-limit
//! windows.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;
use crate::ratelimit::SharedRateLimiter;

/// Spawns a task that calls `cleanup()` on the cache every `interval`.
///
/// The task runs until aborted through the returned handle.
///
/// # Example
/// ```ignore
/// let cache = cache::shared(CacheManager::default());
/// let handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(300));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: SharedCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "Starting cache cleanup task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.write().await.cleanup();

            if removed > 0 {
                info!("Cache cleanup: removed {} expired entries", removed);
            } else {
                debug!("Cache cleanup: no expired entries found");
            }
        }
    })
}

/// Spawns a task that calls `sweep()` on the rate limiter every `interval`.
pub fn spawn_rate_limit_sweep_task(limiter: SharedRateLimiter, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "Starting rate limit sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = limiter.write().await.sweep();

            if removed > 0 {
                info!("Rate limit sweep: removed {} ended windows", removed);
            } else {
                debug!("Rate limit sweep: nothing to remove");
            }
        }
    })
}

// == Background Tasks ==
/// Handles of the running sweeps, so they can be stopped explicitly.
#[derive(Debug)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Starts both sweeps.
    pub fn spawn(
        cache: SharedCache,
        cache_interval: Duration,
        limiter: SharedRateLimiter,
        limiter_interval: Duration,
    ) -> Self {
        Self {
            handles: vec![
                spawn_cleanup_task(cache, cache_interval),
                spawn_rate_limit_sweep_task(limiter, limiter_interval),
            ],
        }
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    /// Aborts every sweep.
    pub fn shutdown(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{self, CacheManager, CacheOptions};
    use crate::ratelimit::{self, RateLimitPolicy, RateLimiter};
    use serde_json::json;

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let cache = cache::shared(CacheManager::default());
        cache.write().await.set(
            "expire_soon",
            json!("value"),
            &CacheOptions::new().ttl(Duration::from_millis(50)),
        );

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(250)).await;

        // cleanup() removed it, not a lazy read
        assert_eq!(cache.read().await.len(), 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let cache = cache::shared(CacheManager::default());
        cache.write().await.set(
            "long_lived",
            json!("value"),
            &CacheOptions::new().ttl(Duration::from_secs(3600)),
        );

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(150)).await;

        let value = cache.write().await.get("long_lived", &CacheOptions::default());
        assert_eq!(value, Some(json!("value")));
        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_removes_ended_windows() {
        let limiter = ratelimit::shared(RateLimiter::new());
        let policy = RateLimitPolicy::new("short", Duration::from_millis(50), 5);
        limiter.write().await.check("client", &policy);

        let handle = spawn_rate_limit_sweep_task(limiter.clone(), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!(limiter.read().await.is_empty());
        handle.abort();
    }

    #[tokio::test]
    async fn test_background_tasks_shutdown() {
        let tasks = BackgroundTasks::spawn(
            cache::shared(CacheManager::default()),
            Duration::from_secs(1),
            ratelimit::shared(RateLimiter::new()),
            Duration::from_secs(1),
        );
        assert!(tasks.is_running());

        tasks.shutdown();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!tasks.is_running(), "Tasks should be finished after shutdown");
    }
}
