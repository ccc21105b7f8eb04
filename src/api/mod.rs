//! API Module
//!
//! HTTP handlers and routing for the cache REST API.
//!
//! # Endpoints
//! - `PUT /cache/:key` - Store a value
//! - `GET /cache/:key` - Retrieve a value
//! - `GET /cache/:key/exists` - Check for a valid entry
//! - `DELETE /cache/:key` - Delete a key
//! - `DELETE /cache` - Clear everything
//! - `DELETE /prefix/:prefix` - Clear one prefix
//! - `POST /cleanup` - Remove expired entries now
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::{create_router, create_router_with_policies};
