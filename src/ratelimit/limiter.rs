//! Fixed-Window Rate Limiter
//!
//! Counts requests per identifier in fixed windows. State is in-memory and
//! per-process: behind N instances a client effectively gets N times the
//! limit.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use crate::clock::{duration_ms, SharedClock, SystemClock};
use crate::ratelimit::RateLimitPolicy;

/// Rate limiter shared between the middleware and the sweep task.
pub type SharedRateLimiter = Arc<RwLock<RateLimiter>>;

// == Rate Limit Entry ==
/// One identifier's current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Requests seen in this window
    pub count: u32,
    /// When the window ends (Unix milliseconds)
    pub reset_time: u64,
}

impl RateLimitEntry {
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.reset_time
    }
}

// == Decision Types ==
/// Window figures for `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Window end (Unix milliseconds)
    pub reset_at_ms: u64,
}

impl RateLimitInfo {
    /// Window end in whole Unix seconds, rounded up.
    pub fn reset_at_secs(&self) -> u64 {
        self.reset_at_ms.div_ceil(1000)
    }

    /// Writes `X-RateLimit-Limit`, `-Remaining` and `-Reset`.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(self.remaining));
        headers.insert("x-ratelimit-reset", HeaderValue::from(self.reset_at_secs()));
    }
}

/// A refused request. Converts into a 429 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDenial {
    pub info: RateLimitInfo,
    /// Seconds until the window resets, rounded up
    pub retry_after_secs: u64,
}

impl RateLimitDenial {
    pub fn message(&self) -> String {
        format!(
            "Too many requests. Please try again in {} seconds.",
            self.retry_after_secs
        )
    }
}

impl IntoResponse for RateLimitDenial {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": "rate_limited",
            "message": self.message(),
            "retryAfter": self.retry_after_secs,
            "limit": self.info.limit,
            "remaining": self.info.remaining,
            "reset": self.info.reset_at_secs(),
        }));

        let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        let headers = response.headers_mut();
        headers.insert(header::RETRY_AFTER, HeaderValue::from(self.retry_after_secs));
        self.info.apply_headers(headers);
        response
    }
}

/// Outcome of [`RateLimiter::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed(RateLimitInfo),
    Denied(RateLimitDenial),
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed(_))
    }

    pub fn info(&self) -> &RateLimitInfo {
        match self {
            RateLimitDecision::Allowed(info) => info,
            RateLimitDecision::Denied(denial) => &denial.info,
        }
    }
}

// == Rate Limiter ==
#[derive(Debug)]
pub struct RateLimiter {
    entries: HashMap<String, RateLimitEntry>,
    clock: SharedClock,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    // == Check ==
    /// Counts a request from `identifier` against `policy`.
    ///
    /// The first request, and the first after a window ends, opens a fresh
    /// window and is always allowed. Later requests are denied once the count
    /// exceeds the policy limit.
    pub fn check(&mut self, identifier: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        let now = self.clock.now_ms();

        let entry = match self.entries.get_mut(identifier) {
            Some(entry) if !entry.is_expired_at(now) => {
                entry.count = entry.count.saturating_add(1);
                *entry
            }
            _ => {
                let fresh = RateLimitEntry {
                    count: 1,
                    reset_time: now.saturating_add(duration_ms(policy.interval)),
                };
                self.entries.insert(identifier.to_string(), fresh);
                return RateLimitDecision::Allowed(RateLimitInfo {
                    limit: policy.limit,
                    remaining: policy.limit.saturating_sub(1),
                    reset_at_ms: fresh.reset_time,
                });
            }
        };

        let info = RateLimitInfo {
            limit: policy.limit,
            remaining: policy.limit.saturating_sub(entry.count),
            reset_at_ms: entry.reset_time,
        };

        if entry.count > policy.limit {
            debug!(identifier, policy = policy.name, count = entry.count, "Rate limit exceeded");
            RateLimitDecision::Denied(RateLimitDenial {
                info,
                retry_after_secs: (entry.reset_time - now).div_ceil(1000),
            })
        } else {
            RateLimitDecision::Allowed(info)
        }
    }

    // == Rate Limit ==
    /// Convenience form of [`RateLimiter::check`]: `None` when the request
    /// may proceed, the denial to return otherwise.
    pub fn rate_limit(
        &mut self,
        identifier: &str,
        policy: &RateLimitPolicy,
    ) -> Option<RateLimitDenial> {
        match self.check(identifier, policy) {
            RateLimitDecision::Allowed(_) => None,
            RateLimitDecision::Denied(denial) => Some(denial),
        }
    }

    // == Sweep ==
    /// Drops every window that has ended. Returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before - self.entries.len()
    }

    pub fn entry(&self, identifier: &str) -> Option<&RateLimitEntry> {
        self.entries.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
