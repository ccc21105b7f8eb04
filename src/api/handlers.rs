//! API Handlers
//!
//! HTTP request handlers for each cache endpoint.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::cache::{self, CacheManager, DurableStore, SharedCache};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::models::{
    validate_key, validate_prefix, ClearResponse, DeleteResponse, ExistsResponse, GetResponse,
    HealthResponse, KeyQuery, SetRequest, SetResponse, StatsResponse,
};
use crate::query::QueryClient;
use crate::ratelimit::{self, RateLimiter, SharedRateLimiter};

/// Application state shared across all handlers.
///
/// Built once at startup; every consumer gets the same cache and limiter.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache manager
    pub cache: SharedCache,
    /// Shared rate limiter
    pub limiter: SharedRateLimiter,
}

impl AppState {
    /// Creates a new AppState around the given cache and limiter.
    pub fn new(cache: CacheManager, limiter: RateLimiter) -> Self {
        Self {
            cache: cache::shared(cache),
            limiter: ratelimit::shared(limiter),
        }
    }

    /// Creates a new AppState from configuration, with `durable` as the
    /// durable tier when given.
    pub fn from_config(config: &Config, durable: Option<Box<dyn DurableStore>>) -> Self {
        let mut cache = CacheManager::new(config.max_entries, config.default_ttl());
        if let Some(store) = durable {
            cache = cache.with_boxed_durable(store);
        }
        Self::new(cache, RateLimiter::new())
    }

    /// A query client over this state's cache.
    pub fn query_client(&self) -> QueryClient {
        QueryClient::new(self.cache.clone())
    }
}

/// Handler for `PUT /cache/:key`
pub async fn set_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate(&key) {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let options = req.options();
    state.cache.write().await.set(&key, req.value, &options);

    Ok(Json(SetResponse::new(key)))
}

/// Handler for `GET /cache/:key`
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<GetResponse>> {
    if let Some(error_msg) = validate_key(&key, query.prefix.as_deref()) {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    // Write lock: reads update counters and may drop expired entries
    let options = query.options();
    let value = state
        .cache
        .write()
        .await
        .get(&key, &options)
        .ok_or_else(|| ApiError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, options.key_prefix(), value)))
}

/// Handler for `GET /cache/:key/exists`
pub async fn exists_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<ExistsResponse>> {
    if let Some(error_msg) = validate_key(&key, query.prefix.as_deref()) {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let exists = state.cache.read().await.has(&key, &query.options());
    Ok(Json(ExistsResponse { key, exists }))
}

/// Handler for `DELETE /cache/:key`
///
/// Deleting an absent key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<DeleteResponse>> {
    if let Some(error_msg) = validate_key(&key, query.prefix.as_deref()) {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    state.cache.write().await.remove(&key, &query.options());
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for `DELETE /prefix/:prefix`
pub async fn clear_prefix_handler(
    State(state): State<AppState>,
    Path(prefix): Path<String>,
) -> Result<Json<ClearResponse>> {
    if let Some(error_msg) = validate_prefix(&prefix) {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let removed = state.cache.write().await.clear_prefix(&prefix);
    Ok(Json(ClearResponse::new(
        format!("Prefix '{}' cleared", prefix),
        removed,
    )))
}

/// Handler for `DELETE /cache`
pub async fn clear_all_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let mut cache = state.cache.write().await;
    let removed = cache.len();
    cache.clear_all();

    Json(ClearResponse::new("Cache cleared", removed))
}

/// Handler for `POST /cleanup`
pub async fn cleanup_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.cache.write().await.cleanup();
    Json(ClearResponse::new("Expired entries removed", removed))
}

/// Handler for `GET /stats`
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.read().await.stats();
    let rate_limit_windows = state.limiter.read().await.len();

    Json(StatsResponse {
        cache,
        rate_limit_windows,
    })
}

/// Handler for `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
