//! Batch job API handlers
//!
//! POST /jobs, GET /jobs, GET /jobs/{job_id}, GET /jobs/{job_id}/results,
//! POST /jobs/{job_id}/cancel

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    batch::{BatchProcessor, JobRecordOutcome, JobState, ResolutionJob},
    db,
    error::{ApiError, ApiResult},
    ingest,
    types::CompanyRecord,
    AppState,
};

/// Most jobs a listing request returns
const LIST_LIMIT: u32 = 50;

/// POST /jobs request (JSON form)
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub records: Vec<CompanyRecord>,
}

/// POST /jobs response
#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    pub job_id: Uuid,
    pub state: JobState,
    pub total_records: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// GET /jobs/{job_id}/results response
#[derive(Debug, Serialize)]
pub struct JobResultsResponse {
    pub job_id: Uuid,
    pub state: JobState,
    pub total_records: usize,
    pub outcomes: Vec<JobRecordOutcome>,
}

/// POST /jobs/{job_id}/cancel response
#[derive(Debug, Serialize)]
pub struct CancelJobResponse {
    pub job_id: Uuid,
    pub state: JobState,
    pub completed_records: usize,
    pub cancelled_at: chrono::DateTime<chrono::Utc>,
}

/// POST /jobs
///
/// Submit a batch of records for resolution. The body is either JSON
/// (`{"records": [...]}`) or raw CSV when Content-Type is text/csv.
/// Returns immediately; progress streams over /events.
pub async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<CreateJobResponse>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/json");

    let records = if content_type.starts_with("text/csv") {
        ingest::parse_records(body.as_ref())
            .map_err(|e| ApiError::BadRequest(format!("CSV parse failed: {}", e)))?
    } else {
        let request: CreateJobRequest = serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;
        request.records
    };

    if records.is_empty() {
        return Err(ApiError::BadRequest("Batch contains no records".to_string()));
    }

    let job = ResolutionJob::new(records.len());
    let response = CreateJobResponse {
        job_id: job.job_id,
        state: job.state,
        total_records: job.total_records,
        created_at: job.created_at,
    };

    // Persist before spawning so a status poll can never miss the job
    db::jobs::save_job(&state.db, &job).await?;

    let cancel = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(job.job_id, cancel.clone());

    tracing::info!(
        job_id = %job.job_id,
        total_records = job.total_records,
        "Resolution job created and persisted to database"
    );

    // Spawn background task for batch execution
    let state_clone = state.clone();
    let job_id_for_logging = job.job_id;
    tokio::spawn(async move {
        tracing::info!(
            job_id = %job_id_for_logging,
            "Background resolution job task started"
        );

        if let Err(e) = execute_batch_job(state_clone.clone(), job, records, cancel).await {
            tracing::error!(
                job_id = %job_id_for_logging,
                error = %e,
                "Resolution job background task failed"
            );
        } else {
            tracing::info!(
                job_id = %job_id_for_logging,
                "Background resolution job task finished"
            );
        }

        state_clone
            .cancellation_tokens
            .write()
            .await
            .remove(&job_id_for_logging);
    });

    Ok(Json(response))
}

/// GET /jobs
///
/// List recent jobs, newest first.
pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<Vec<ResolutionJob>>> {
    let jobs = db::jobs::list_jobs(&state.db, LIST_LIMIT).await?;
    Ok(Json(jobs))
}

/// GET /jobs/{job_id}
///
/// Poll job progress. Returns current status and counters.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<ResolutionJob>> {
    let job = db::jobs::get_job(&state.db, job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Resolution job not found: {}", job_id)))?;

    tracing::debug!(job_id = %job_id, state = %job.state, "Status query");

    Ok(Json(job))
}

/// GET /jobs/{job_id}/results
///
/// Fetch per-record outcomes in input order. Partial while the job runs.
pub async fn get_job_results(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobResultsResponse>> {
    let job = db::jobs::get_job(&state.db, job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Resolution job not found: {}", job_id)))?;

    let outcomes = db::jobs::get_record_outcomes(&state.db, job_id).await?;

    Ok(Json(JobResultsResponse {
        job_id: job.job_id,
        state: job.state,
        total_records: job.total_records,
        outcomes,
    }))
}

/// POST /jobs/{job_id}/cancel
///
/// Cancel a running job. In-flight records finish; unstarted ones are
/// skipped.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<CancelJobResponse>> {
    let mut job = db::jobs::get_job(&state.db, job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Resolution job not found: {}", job_id)))?;

    if job.state.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Resolution job already in terminal state: {}",
            job.state
        )));
    }

    // Signal the background task if one is live in this process
    let token = state.cancellation_tokens.read().await.get(&job_id).cloned();
    if let Some(token) = token {
        token.cancel();
        tracing::info!(job_id = %job_id, "Cancellation signalled to running job");
    }

    // Mark cancelled right away; the draining worker pool rewrites the row
    // with final counters when it notices the token. Also covers jobs left
    // in Running by a process restart, which have no live task to signal.
    job.state = JobState::Cancelled;
    job.ended_at = Some(chrono::Utc::now());
    db::jobs::save_job(&state.db, &job).await?;

    tracing::info!(job_id = %job_id, "Resolution job cancelled");

    Ok(Json(CancelJobResponse {
        job_id: job.job_id,
        state: job.state,
        completed_records: job.completed_records,
        cancelled_at: job.ended_at.unwrap_or_else(chrono::Utc::now),
    }))
}

/// Background task for batch execution
async fn execute_batch_job(
    state: AppState,
    job: ResolutionJob,
    records: Vec<CompanyRecord>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let job_id = job.job_id;
    tracing::info!(job_id = %job_id, "Starting batch resolution");

    let processor = BatchProcessor::new(
        state.engine.clone(),
        state.db.clone(),
        state.event_bus.clone(),
        state.engine.config().worker_pool_size,
    );

    match processor.run(job, records, cancel).await {
        Ok(finished) => {
            tracing::info!(
                job_id = %job_id,
                state = %finished.state,
                completed = finished.completed_records,
                failed = finished.failed_records,
                "Batch resolution finished"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Batch resolution failed");
            *state.last_error.write().await = Some(format!("Job {}: {}", job_id, e));

            // Ensure the row reaches a terminal state even when the normal
            // persistence path is what failed
            match db::jobs::get_job(&state.db, job_id).await {
                Ok(Some(mut stored)) if !stored.state.is_terminal() => {
                    stored.state = JobState::Failed;
                    stored.error = Some(e.to_string());
                    stored.ended_at = Some(chrono::Utc::now());
                    if let Err(save_error) = db::jobs::save_job(&state.db, &stored).await {
                        tracing::error!(
                            job_id = %job_id,
                            error = %save_error,
                            "Failed to mark job as failed - attempting direct database update"
                        );
                        mark_failed_direct(&state, job_id, &e).await;
                    }
                }
                Ok(_) => {}
                Err(db_error) => {
                    tracing::error!(
                        job_id = %job_id,
                        error = %db_error,
                        "Failed to load job from database - attempting direct database update"
                    );
                    mark_failed_direct(&state, job_id, &e).await;
                }
            }

            Err(e.into())
        }
    }
}

/// Last-resort database update when the jobs module itself is failing
async fn mark_failed_direct(state: &AppState, job_id: Uuid, error: &webmatch_common::Error) {
    let _ = sqlx::query(
        "UPDATE resolution_jobs SET state = ?, error = ?, ended_at = ? WHERE job_id = ?",
    )
    .bind(JobState::Failed.as_str())
    .bind(error.to_string())
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(job_id.to_string())
    .execute(&state.db)
    .await;
}

/// Build batch job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/:job_id", get(get_job_status))
        .route("/jobs/:job_id/results", get(get_job_results))
        .route("/jobs/:job_id/cancel", post(cancel_job))
}
