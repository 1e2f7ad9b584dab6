//! Integration tests for the Settings API endpoints
//!
//! Covers GET/PUT/DELETE /settings/{key}: request validation, database
//! write-back, and the best-effort TOML mirror.

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

async fn request(
    state: &AppState,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let app = build_router(state.clone());
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn test_put_setting_updates_database_and_toml() {
    // tc_i_set_001: Valid key updates database and TOML
    let (state, dir) = test_app_state().await;

    let (status, body) = request(
        &state,
        "PUT",
        "/settings/places_api_key",
        Some(json!({"value": "pk-test-123"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("configured successfully"));

    // Database is authoritative
    let stored: Option<String> =
        webmatch_re::db::settings::get_setting(&state.db, "places_api_key")
            .await
            .unwrap();
    assert_eq!(stored.as_deref(), Some("pk-test-123"));

    // TOML mirror was written
    let toml_content = std::fs::read_to_string(dir.path().join("webmatch.toml")).unwrap();
    assert!(toml_content.contains("pk-test-123"));
}

#[tokio::test]
async fn test_put_setting_rejects_empty_value() {
    // tc_i_set_002: Empty value rejected with 400, database untouched
    let (state, _dir) = test_app_state().await;

    let (status, _) = request(
        &state,
        "PUT",
        "/settings/places_api_key",
        Some(json!({"value": "   "})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stored: Option<String> =
        webmatch_re::db::settings::get_setting(&state.db, "places_api_key")
            .await
            .unwrap();
    assert_eq!(stored, None);
}

#[tokio::test]
async fn test_unknown_setting_key_is_404() {
    // tc_i_set_003: Keys outside the allowlist are rejected on every verb
    let (state, _dir) = test_app_state().await;

    let (status, body) = request(
        &state,
        "PUT",
        "/settings/master_password",
        Some(json!({"value": "hunter2"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = request(&state, "GET", "/settings/master_password", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(&state, "DELETE", "/settings/master_password", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_setting_reports_configured_without_echoing_secret() {
    // tc_i_set_004: Status endpoint never leaks the stored value
    let (state, _dir) = test_app_state().await;

    let (status, before) = request(&state, "GET", "/settings/search_api_key", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before["configured"], false);

    request(
        &state,
        "PUT",
        "/settings/search_api_key",
        Some(json!({"value": "sk-secret-456"})),
    )
    .await;

    let (status, after) = request(&state, "GET", "/settings/search_api_key", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["key"], "search_api_key");
    assert_eq!(after["configured"], true);
    assert!(
        !after.to_string().contains("sk-secret-456"),
        "status response must not echo the secret"
    );
}

#[tokio::test]
async fn test_delete_setting_clears_database_and_toml() {
    // tc_i_set_005: DELETE removes the key everywhere and is idempotent
    let (state, dir) = test_app_state().await;

    request(
        &state,
        "PUT",
        "/settings/llm_api_key",
        Some(json!({"value": "llm-secret-789"})),
    )
    .await;

    let (status, body) = request(&state, "DELETE", "/settings/llm_api_key", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let stored: Option<String> = webmatch_re::db::settings::get_setting(&state.db, "llm_api_key")
        .await
        .unwrap();
    assert_eq!(stored, None);

    let toml_content = std::fs::read_to_string(dir.path().join("webmatch.toml")).unwrap();
    assert!(!toml_content.contains("llm-secret-789"));

    // Deleting again still succeeds
    let (status, _) = request(&state, "DELETE", "/settings/llm_api_key", None).await;
    assert_eq!(status, StatusCode::OK);
}
