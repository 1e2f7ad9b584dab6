//! HTTP Server & Routing Integration Tests
//! Test File: http_server_tests.rs

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use webmatch_common::events::EventBus;
use webmatch_re::adapters::AdapterRegistry;
use webmatch_re::config::EngineConfig;
use webmatch_re::engine::ResolutionEngine;
use webmatch_re::validation::{ContentFetcher, PageProbe};
use webmatch_re::{build_router, AppState};

/// Create test app state backed by a temp-dir database.
///
/// The adapter registry is empty, so no resolution attempt ever touches the
/// network: every record comes back unresolved, which is all the HTTP layer
/// tests need. The TempDir must outlive the state.
async fn test_app_state() -> (AppState, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = webmatch_re::db::init_database(&dir.path().join("webmatch.db"))
        .await
        .unwrap();

    let fetcher: Arc<dyn ContentFetcher> = Arc::new(PageProbe::new().unwrap());
    let engine = Arc::new(ResolutionEngine::new(
        EngineConfig::default(),
        Arc::new(AdapterRegistry::new()),
        fetcher,
        None,
    ));

    let event_bus = EventBus::new(100);
    let state = AppState::new(db, event_bus, engine, dir.path().join("webmatch.toml"));
    (state, dir)
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// TC-HTTP-001: Verify the router builds with a fresh state
/// **Type:** Unit Test | **Priority:** P0
#[tokio::test]
async fn tc_http_001_router_builds() {
    let (state, _dir) = test_app_state().await;
    let _app = build_router(state);
}

/// TC-HTTP-002: Verify `/health` endpoint returns JSON
/// **Type:** Integration Test | **Priority:** P0
#[tokio::test]
async fn tc_http_002_health_endpoint_returns_json() {
    // Given: Running server
    let (state, _dir) = test_app_state().await;
    let app = build_router(state);

    // When: GET /health
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Then: Returns 200 OK with JSON
    assert_eq!(response.status(), StatusCode::OK, "/health should return 200 OK");

    let content_type = response.headers().get("content-type");
    assert!(
        content_type.is_some()
            && content_type.unwrap().to_str().unwrap().contains("application/json"),
        "/health should return JSON"
    );

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok", "Health status should be 'ok'");
    assert_eq!(json["module"], "webmatch-re", "Module should be 'webmatch-re'");
    assert!(json["version"].is_string(), "Version should be a string");
    assert!(json["uptime_seconds"].is_u64(), "Uptime should be a number");
}

/// TC-HTTP-003: Verify POST /resolve answers with a result body
/// **Type:** Integration Test | **Priority:** P0
#[tokio::test]
async fn tc_http_003_resolve_returns_result() {
    // Given: Running server with no sources configured
    let (state, _dir) = test_app_state().await;
    let app = build_router(state);

    // When: POST /resolve with a name-only record
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/resolve")
                .header("content-type", "application/json")
                .body(Body::from(json!({"name": "Acme Plumbing"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    // Then: 200 with an unresolved result (no sources means no evidence)
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "unresolved");
    assert_eq!(json["confidence"], 0);
    assert!(json["domain"].is_null());
    assert_eq!(json["tier"], 4, "name-only record classifies as tier 4");
}

/// TC-HTTP-004: Verify POST /resolve rejects a blank name with 400
/// **Type:** Integration Test | **Priority:** P0
#[tokio::test]
async fn tc_http_004_resolve_rejects_blank_name() {
    // Given: Running server
    let (state, _dir) = test_app_state().await;
    let app = build_router(state);

    // When: POST /resolve with a whitespace-only name
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/resolve")
                .header("content-type", "application/json")
                .body(Body::from(json!({"name": "   "}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    // Then: 400 with the standard error envelope
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
    assert!(json["error"]["message"].is_string());
}

/// TC-HTTP-005: Verify malformed JSON bodies are a client error
/// **Type:** Integration Test | **Priority:** P1
#[tokio::test]
async fn tc_http_005_resolve_rejects_malformed_json() {
    let (state, _dir) = test_app_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/resolve")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(
        response.status().is_client_error(),
        "Malformed JSON should be a 4xx, got {}",
        response.status()
    );
}

/// TC-HTTP-006: Verify `/events` serves an SSE stream
/// **Type:** Integration Test | **Priority:** P1
#[tokio::test]
async fn tc_http_006_events_route_is_sse() {
    // Given: Running server
    let (state, _dir) = test_app_state().await;
    let app = build_router(state);

    // When: GET /events
    let response = app
        .oneshot(
            Request::builder()
                .uri("/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Then: 200 with an event-stream content type. The body is an open
    // stream, so it is dropped without collecting.
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type");
    assert!(
        content_type.is_some()
            && content_type.unwrap().to_str().unwrap().contains("text/event-stream"),
        "/events should serve Server-Sent Events"
    );
}

/// TC-HTTP-007: Verify unknown routes return 404
/// **Type:** Integration Test | **Priority:** P2
#[tokio::test]
async fn tc_http_007_unknown_route_is_404() {
    let (state, _dir) = test_app_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/no-such-route")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
