//! Settings API endpoints
//!
//! Runtime API key management: GET/PUT/DELETE /settings/{key}. The database
//! is authoritative; writes are mirrored to webmatch.toml best-effort so keys
//! survive a database reset. The adapter registry is built at startup, so key
//! changes take effect on the next restart.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config, db,
    error::{ApiError, ApiResult},
    AppState,
};

/// Setting keys the API will read or write
const SETTING_KEYS: &[&str] = &[
    "places_api_key",
    "search_api_key",
    "directory_api_key",
    "enrichment_api_key",
    "llm_api_key",
];

/// PUT /settings/{key} request
#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub value: String,
}

/// PUT and DELETE /settings/{key} response
#[derive(Debug, Serialize)]
pub struct SettingWriteResponse {
    /// Whether the operation succeeded
    pub success: bool,
    /// Human-readable status message
    pub message: String,
}

/// GET /settings/{key} response
///
/// Never echoes the stored secret; callers only learn whether a key exists.
#[derive(Debug, Serialize)]
pub struct SettingStatusResponse {
    pub key: String,
    pub configured: bool,
}

fn check_known_key(key: &str) -> Result<(), ApiError> {
    if SETTING_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("Unknown setting: {}", key)))
    }
}

/// GET /settings/{key}
pub async fn get_setting_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<SettingStatusResponse>> {
    check_known_key(&key)?;

    let stored: Option<String> = db::settings::get_setting(&state.db, &key).await?;
    let configured = stored.as_deref().map(config::is_valid_key).unwrap_or(false);

    Ok(Json(SettingStatusResponse { key, configured }))
}

/// PUT /settings/{key}
///
/// **Behavior:**
/// 1. Validate key (known name, non-empty value)
/// 2. Write to database (authoritative)
/// 3. Sync to TOML (best-effort backup)
///
/// **Note:** TOML write failures log warnings but do not fail the request
pub async fn put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<SetSettingRequest>,
) -> ApiResult<Json<SettingWriteResponse>> {
    check_known_key(&key)?;

    if !config::is_valid_key(&payload.value) {
        return Err(ApiError::BadRequest(
            "API key cannot be empty or whitespace-only".to_string(),
        ));
    }

    // Write to database (authoritative)
    db::settings::set_setting(&state.db, &key, payload.value.clone())
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save setting to database: {}", e)))?;

    info!("Setting {} configured via API", key);

    // Sync to TOML (best-effort backup)
    match config::sync_key_to_toml(&key, Some(payload.value), &state.config_path) {
        Ok(()) => {
            info!("Setting synced to TOML: {}", state.config_path.display());
        }
        Err(e) => {
            warn!("TOML sync failed (database write succeeded): {}", e);
        }
    }

    Ok(Json(SettingWriteResponse {
        success: true,
        message: format!("{} configured successfully", key),
    }))
}

/// DELETE /settings/{key}
///
/// Clears the key from the database and the TOML backup. Missing keys
/// delete cleanly; the operation is idempotent.
pub async fn clear_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<SettingWriteResponse>> {
    check_known_key(&key)?;

    db::settings::delete_setting(&state.db, &key)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to delete setting from database: {}", e)))?;

    info!("Setting {} cleared via API", key);

    match config::sync_key_to_toml(&key, None, &state.config_path) {
        Ok(()) => {
            info!("Setting cleared from TOML: {}", state.config_path.display());
        }
        Err(e) => {
            warn!("TOML sync failed (database delete succeeded): {}", e);
        }
    }

    Ok(Json(SettingWriteResponse {
        success: true,
        message: format!("{} cleared", key),
    }))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route(
        "/settings/:key",
        get(get_setting_status).put(put_setting).delete(clear_setting),
    )
}
