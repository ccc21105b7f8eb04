//! Request DTOs for the cache API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{CacheOptions, MAX_KEY_LENGTH, MAX_VALUE_SIZE};

/// Request body for `PUT /cache/:key`
///
/// # Fields
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds (uses default if not specified)
/// - `persistent`: Mirror to the durable tier
/// - `prefix`: Key namespace (default `"cache"`)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub persistent: bool,
    #[serde(default)]
    pub prefix: Option<String>,
}

impl SetRequest {
    /// Validates the request data for `key`
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self, key: &str) -> Option<String> {
        if let Some(msg) = validate_key(key, self.prefix.as_deref()) {
            return Some(msg);
        }
        if self.ttl == Some(0) {
            return Some("TTL must be at least 1 second".to_string());
        }
        match serde_json::to_vec(&self.value) {
            Ok(bytes) if bytes.len() > MAX_VALUE_SIZE => Some(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )),
            Ok(_) => None,
            Err(e) => Some(format!("Value is not serializable: {e}")),
        }
    }

    pub fn options(&self) -> CacheOptions {
        CacheOptions {
            ttl: self.ttl.map(Duration::from_secs),
            persistent: self.persistent,
            prefix: self.prefix.clone(),
        }
    }
}

/// Query string for reads and deletes: `?prefix=user&persistent=true`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyQuery {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub persistent: bool,
}

impl KeyQuery {
    pub fn options(&self) -> CacheOptions {
        CacheOptions {
            ttl: None,
            persistent: self.persistent,
            prefix: self.prefix.clone(),
        }
    }
}

/// Checks a logical key and optional prefix.
pub fn validate_key(key: &str, prefix: Option<&str>) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        ));
    }
    prefix.and_then(validate_prefix)
}

/// Prefixes must be non-empty and free of `:`, so that clearing one prefix
/// never reaches into another.
pub fn validate_prefix(prefix: &str) -> Option<String> {
    if prefix.is_empty() {
        return Some("Prefix cannot be empty".to_string());
    }
    if prefix.contains(':') {
        return Some("Prefix cannot contain ':'".to_string());
    }
    None
}
