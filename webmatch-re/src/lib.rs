//! webmatch-re library interface
//!
//! Exposes the resolution engine and HTTP surface for integration testing.

pub mod adapters;
pub mod api;
pub mod batch;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod types;
pub mod validation;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use webmatch_common::events::EventBus;

use crate::engine::ResolutionEngine;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Resolution engine with its adapter registry
    pub engine: Arc<ResolutionEngine>,
    /// Path of webmatch.toml for best-effort settings sync
    pub config_path: PathBuf,
    /// Cancellation tokens for active batch jobs
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        engine: Arc<ResolutionEngine>,
        config_path: PathBuf,
    ) -> Self {
        Self {
            db,
            event_bus,
            engine,
            config_path,
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::resolve_routes())
        .merge(api::job_routes())
        .route("/events", get(api::event_stream))
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
