//! Error types for the cache service
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == API Error Enum ==
/// Errors surfaced by the HTTP layer.
///
/// Cache misses and durable-tier failures never reach this type; a miss only
/// becomes `NotFound` at the HTTP boundary.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Key not found (absent or expired)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// == Storage Error Enum ==
/// Failures of the durable tier.
///
/// The cache manager logs and absorbs these; they are only visible to code
/// that talks to a [`DurableStore`](crate::cache::DurableStore) directly.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// An entry or the backing document could not be (de)serialized
    #[error("storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing would exceed the configured byte quota
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },
}

// == Result Type Aliases ==
/// Convenience Result type for HTTP handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Result type for durable-tier operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
