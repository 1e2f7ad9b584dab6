//! Single-record resolution endpoint

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use crate::error::ApiResult;
use crate::types::{CompanyRecord, ResolutionResult};
use crate::AppState;

/// POST /resolve
///
/// Resolve one company record synchronously. The caller waits for the
/// full pipeline: classification, source execution, validation, assembly.
pub async fn resolve_record(
    State(state): State<AppState>,
    Json(record): Json<CompanyRecord>,
) -> ApiResult<Json<ResolutionResult>> {
    info!("Resolve request for company: {}", record.name);

    let result = state.engine.resolve(&record).await?;

    Ok(Json(result))
}

/// Build resolution routes
pub fn resolve_routes() -> Router<AppState> {
    Router::new().route("/resolve", post(resolve_record))
}
