//! Axum middleware applying a rate-limit policy to a router.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::ratelimit::{client_identifier, RateLimitDecision, RateLimitPolicy, SharedRateLimiter};

/// State for [`rate_limit_middleware`].
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub limiter: SharedRateLimiter,
    pub policy: RateLimitPolicy,
}

impl RateLimitState {
    pub fn new(limiter: SharedRateLimiter, policy: RateLimitPolicy) -> Self {
        Self { limiter, policy }
    }
}

/// Counts the request under `{policy}:{client identifier}`; denied requests
/// get the 429 without reaching the handler, allowed ones get
/// `X-RateLimit-*` headers on their response.
///
/// ```ignore
/// Router::new()
///     .route("/signin", post(signin))
///     .route_layer(middleware::from_fn_with_state(
///         RateLimitState::new(limiter, AUTH_STRICT),
///         rate_limit_middleware,
///     ));
/// ```
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let identifier = format!(
        "{}:{}",
        state.policy.name,
        client_identifier(request.headers())
    );
    let decision = state.limiter.write().await.check(&identifier, &state.policy);

    match decision {
        RateLimitDecision::Denied(denial) => {
            warn!(
                identifier = %identifier,
                path = %request.uri().path(),
                retry_after = denial.retry_after_secs,
                "Request rate limited"
            );
            denial.into_response()
        }
        RateLimitDecision::Allowed(info) => {
            let mut response = next.run(request).await;
            info.apply_headers(response.headers_mut());
            response
        }
    }
}
