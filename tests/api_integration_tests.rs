//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
    Router,
};
use poligap_cache::{
    api::{create_router, create_router_with_policies},
    cache::{CacheManager, MemoryDurableStore},
    clock::ManualClock,
    ratelimit::{RateLimitPolicy, API_READ_HEAVY, API_STANDARD},
    AppState, RateLimiter,
};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    create_router(AppState::new(CacheManager::default(), RateLimiter::new()))
}

fn put(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// == SET / GET ==

#[tokio::test]
async fn test_set_then_get() {
    let app = create_test_app();

    let response = send(&app, put("/cache/greeting", r#"{"value":{"text":"hi"}}"#)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("greeting"));

    let response = send(&app, empty("GET", "/cache/greeting")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "greeting");
    assert_eq!(json["prefix"], "cache");
    assert_eq!(json["value"]["text"], "hi");
}

#[tokio::test]
async fn test_get_missing_key_is_404() {
    let app = create_test_app();

    let response = send(&app, empty("GET", "/cache/nope")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_prefixes_are_separate_namespaces() {
    let app = create_test_app();

    send(&app, put("/cache/42", r#"{"value":"alice","prefix":"profile"}"#)).await;

    let response = send(&app, empty("GET", "/cache/42")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, empty("GET", "/cache/42?prefix=profile")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["prefix"], "profile");
    assert_eq!(json["value"], "alice");
}

#[tokio::test]
async fn test_entry_expires_after_ttl() {
    let clock = Arc::new(ManualClock::new(1_000));
    let cache = CacheManager::default().with_clock(clock.clone());
    let app = create_router(AppState::new(cache, RateLimiter::new()));

    send(&app, put("/cache/short", r#"{"value":1,"ttl":1}"#)).await;
    let response = send(&app, empty("GET", "/cache/short")).await;
    assert_eq!(response.status(), StatusCode::OK);

    clock.advance(Duration::from_millis(1_001));
    let response = send(&app, empty("GET", "/cache/short")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_persistent_entry_survives_restart() {
    let durable = MemoryDurableStore::new();

    let first = create_router(AppState::new(
        CacheManager::default().with_durable(durable.clone()),
        RateLimiter::new(),
    ));
    let response = send(
        &first,
        put("/cache/token", r#"{"value":"abc","persistent":true}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Fresh memory tier, same durable tier
    let second = create_router(AppState::new(
        CacheManager::default().with_durable(durable),
        RateLimiter::new(),
    ));

    let response = send(&second, empty("GET", "/cache/token")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&second, empty("GET", "/cache/token?persistent=true")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["value"], "abc");
}

// == Validation ==

#[tokio::test]
async fn test_set_rejects_zero_ttl() {
    let app = create_test_app();

    let response = send(&app, put("/cache/k", r#"{"value":1,"ttl":0}"#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_rejects_prefix_with_colon() {
    let app = create_test_app();

    let response = send(&app, put("/cache/k", r#"{"value":1,"prefix":"a:b"}"#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_rejects_overlong_key() {
    let app = create_test_app();
    let uri = format!("/cache/{}", "k".repeat(300));

    let response = send(&app, put(&uri, r#"{"value":1}"#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// == EXISTS / DELETE ==

#[tokio::test]
async fn test_exists_and_delete() {
    let app = create_test_app();
    send(&app, put("/cache/gone", r#"{"value":true}"#)).await;

    let response = send(&app, empty("GET", "/cache/gone/exists")).await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["exists"], true);

    let response = send(&app, empty("DELETE", "/cache/gone")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, empty("GET", "/cache/gone/exists")).await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["exists"], false);

    // Deleting again is not an error
    let response = send(&app, empty("DELETE", "/cache/gone")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// == Bulk removal ==

#[tokio::test]
async fn test_clear_prefix_leaves_other_prefixes() {
    let app = create_test_app();
    send(&app, put("/cache/1", r#"{"value":1,"prefix":"user"}"#)).await;
    send(&app, put("/cache/2", r#"{"value":2,"prefix":"user"}"#)).await;
    send(&app, put("/cache/1", r#"{"value":3,"prefix":"users"}"#)).await;

    let response = send(&app, empty("DELETE", "/prefix/user")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 2);

    let response = send(&app, empty("GET", "/cache/1?prefix=users")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_clear_all_resets_stats() {
    let app = create_test_app();
    send(&app, put("/cache/a", r#"{"value":1}"#)).await;
    send(&app, empty("GET", "/cache/a")).await;
    send(&app, empty("GET", "/cache/missing")).await;

    let response = send(&app, empty("DELETE", "/cache")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 1);

    let response = send(&app, empty("GET", "/stats")).await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["hits"], 0);
    assert_eq!(json["misses"], 0);
    assert_eq!(json["size"], 0);
}

#[tokio::test]
async fn test_cleanup_removes_expired() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = CacheManager::default().with_clock(clock.clone());
    let app = create_router(AppState::new(cache, RateLimiter::new()));

    send(&app, put("/cache/short", r#"{"value":1,"ttl":1}"#)).await;
    send(&app, put("/cache/long", r#"{"value":2,"ttl":60}"#)).await;
    clock.advance(Duration::from_secs(2));

    let response = send(&app, empty("POST", "/cleanup")).await;
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 1);
}

// == STATS ==

#[tokio::test]
async fn test_stats_counts_hits_and_misses() {
    let app = create_test_app();
    send(&app, put("/cache/s", r#"{"value":"v"}"#)).await;
    send(&app, empty("GET", "/cache/s")).await;
    send(&app, empty("GET", "/cache/nonexistent")).await;

    let response = send(&app, empty("GET", "/stats")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["size"], 1);
    assert_eq!(json["hitRate"], 0.5);
    assert!(json["rateLimitWindows"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = send(&app, empty("GET", "/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
}

// == Rate limiting ==

#[tokio::test]
async fn test_responses_carry_rate_limit_headers() {
    let app = create_test_app();

    let response = send(&app, put("/cache/h", r#"{"value":1}"#)).await;
    assert_eq!(
        response.headers()["x-ratelimit-limit"],
        API_STANDARD.limit.to_string().as_str()
    );
    assert_eq!(
        response.headers()["x-ratelimit-remaining"],
        (API_STANDARD.limit - 1).to_string().as_str()
    );
    assert!(response.headers().contains_key("x-ratelimit-reset"));
}

#[tokio::test]
async fn test_sixth_request_is_rate_limited() {
    let tight = RateLimitPolicy::new("test_tight", Duration::from_secs(900), 5);
    let app = create_router_with_policies(
        AppState::new(CacheManager::default(), RateLimiter::new()),
        tight,
        API_STANDARD,
    );

    let request = || {
        Request::builder()
            .uri("/cache/x")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("user-agent", "test-agent")
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..5 {
        let response = send(&app, request()).await;
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let response = send(&app, request()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "900");
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "rate_limited");
    assert_eq!(json["retryAfter"], 900);
    assert_eq!(json["remaining"], 0);

    // A different client has its own window
    let other = Request::builder()
        .uri("/cache/x")
        .header("x-forwarded-for", "198.51.100.1")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, other).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reads_and_writes_count_separately() {
    let tight_writes = RateLimitPolicy::new("test_writes", Duration::from_secs(60), 1);
    let app = create_router_with_policies(
        AppState::new(CacheManager::default(), RateLimiter::new()),
        API_READ_HEAVY,
        tight_writes,
    );

    let response = send(&app, put("/cache/k", r#"{"value":1}"#)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Reads still pass after the write budget is spent
    let response = send(&app, empty("GET", "/cache/k")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, put("/cache/k", r#"{"value":2}"#)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
