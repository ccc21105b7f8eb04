//! API Routes
//!
//! Configures the Axum router with all cache endpoints.

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cleanup_handler, clear_all_handler, clear_prefix_handler, delete_handler, exists_handler,
    get_handler, health_handler, set_handler, stats_handler, AppState,
};
use crate::ratelimit::{
    rate_limit_middleware, RateLimitPolicy, RateLimitState, API_READ_HEAVY, API_STANDARD,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /cache/:key` - Store a value
/// - `GET /cache/:key` - Retrieve a value
/// - `GET /cache/:key/exists` - Check for a valid entry
/// - `DELETE /cache/:key` - Delete a key
/// - `DELETE /cache` - Clear everything
/// - `DELETE /prefix/:prefix` - Clear one prefix
/// - `POST /cleanup` - Remove expired entries now
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - Rate limiting: reads use the read-heavy policy, writes the standard
///   one; `/health` is not limited
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    create_router_with_policies(state, API_READ_HEAVY, API_STANDARD)
}

/// Like [`create_router`] with explicit read and write policies.
pub fn create_router_with_policies(
    state: AppState,
    read_policy: RateLimitPolicy,
    write_policy: RateLimitPolicy,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let reads = Router::new()
        .route("/cache/:key", get(get_handler))
        .route("/cache/:key/exists", get(exists_handler))
        .route("/stats", get(stats_handler))
        .route_layer(middleware::from_fn_with_state(
            RateLimitState::new(state.limiter.clone(), read_policy),
            rate_limit_middleware,
        ));

    let writes = Router::new()
        .route("/cache/:key", put(set_handler).delete(delete_handler))
        .route("/cache", delete(clear_all_handler))
        .route("/prefix/:prefix", delete(clear_prefix_handler))
        .route("/cleanup", post(cleanup_handler))
        .route_layer(middleware::from_fn_with_state(
            RateLimitState::new(state.limiter.clone(), write_policy),
            rate_limit_middleware,
        ));

    Router::new()
        .merge(reads)
        .merge(writes)
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
