//! Named rate-limit policies.

use std::time::Duration;

use serde::Serialize;

const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);
const ONE_HOUR: Duration = Duration::from_secs(60 * 60);

/// A fixed window: at most `limit` requests per `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitPolicy {
    /// Short name, also used to scope identifiers per policy
    pub name: &'static str,
    /// Window length
    #[serde(with = "duration_ms")]
    pub interval: Duration,
    /// Requests allowed per window
    pub limit: u32,
}

impl RateLimitPolicy {
    pub const fn new(name: &'static str, interval: Duration, limit: u32) -> Self {
        Self {
            name,
            interval,
            limit,
        }
    }
}

/// Sign-in: 5 requests per 15 minutes.
pub const AUTH_STRICT: RateLimitPolicy = RateLimitPolicy::new("auth", FIFTEEN_MINUTES, 5);

/// Sign-up: 3 requests per hour.
pub const SIGNUP_STRICT: RateLimitPolicy = RateLimitPolicy::new("signup", ONE_HOUR, 3);

/// Password reset: 3 requests per 15 minutes.
pub const PASSWORD_RESET: RateLimitPolicy =
    RateLimitPolicy::new("password-reset", FIFTEEN_MINUTES, 3);

/// General API traffic: 100 requests per 15 minutes.
pub const API_STANDARD: RateLimitPolicy = RateLimitPolicy::new("api", FIFTEEN_MINUTES, 100);

/// Read-heavy API traffic: 1000 requests per 15 minutes.
pub const API_READ_HEAVY: RateLimitPolicy = RateLimitPolicy::new("api-read", FIFTEEN_MINUTES, 1000);

/// Every predefined policy.
pub const ALL_POLICIES: [RateLimitPolicy; 5] = [
    AUTH_STRICT,
    SIGNUP_STRICT,
    PASSWORD_RESET,
    API_STANDARD,
    API_READ_HEAVY,
];

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(interval: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(crate::clock::duration_ms(*interval))
    }
}
