//! Client identifier derivation.
//!
//! The identifier is `{ip}-{ua_hash}`. Forwarded-IP headers are taken at face
//! value, so a client can pick its own identifier by sending a forged
//! `x-forwarded-for`.

use axum::http::HeaderMap;

/// IP headers consulted, in order.
const IP_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

/// Identifier used when no IP header is present. All such clients share one
/// bucket.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Best-available client IP.
pub fn client_ip(headers: &HeaderMap) -> String {
    IP_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name)?.to_str().ok())
        // x-forwarded-for is "client, proxy1, proxy2"
        .filter_map(|value| value.split(',').next())
        .map(str::trim)
        .find(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Non-cryptographic 32-bit string hash (`h = h * 31 + c`, wrapping).
pub fn user_agent_hash(user_agent: &str) -> u32 {
    user_agent
        .chars()
        .fold(0u32, |h, c| h.wrapping_mul(31).wrapping_add(c as u32))
}

/// Derives the rate-limit identifier for a request.
pub fn client_identifier(headers: &HeaderMap) -> String {
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    format!("{}-{:x}", client_ip(headers), user_agent_hash(user_agent))
}
