//! Rate Limit Module
//!
//! Fixed-window request counting per client identifier, with the named
//! policies used to gate sensitive endpoints.

mod identifier;
mod limiter;
mod middleware;
mod policy;

pub use identifier::{client_identifier, client_ip, user_agent_hash, UNKNOWN_CLIENT};
pub use limiter::{
    RateLimitDecision, RateLimitDenial, RateLimitEntry, RateLimitInfo, RateLimiter,
    SharedRateLimiter,
};
pub use middleware::{rate_limit_middleware, RateLimitState};
pub use policy::{
    RateLimitPolicy, ALL_POLICIES, API_READ_HEAVY, API_STANDARD, AUTH_STRICT, PASSWORD_RESET,
    SIGNUP_STRICT,
};

use std::sync::Arc;

use tokio::sync::RwLock;

/// Wraps a limiter for sharing.
pub fn shared(limiter: RateLimiter) -> SharedRateLimiter {
    Arc::new(RwLock::new(limiter))
}
