//! Batch job persistence
//!
//! Jobs and per-record outcomes are written as they happen so progress
//! is queryable mid-run and survives a restart. Resolution results are
//! stored as JSON alongside the queryable columns.

use crate::batch::{JobRecordOutcome, JobState, ResolutionJob};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;
use webmatch_common::{Error, Result};

/// Insert or update a job row
pub async fn save_job(db: &SqlitePool, job: &ResolutionJob) -> Result<()> {
    let job_id = job.job_id.to_string();
    let created_at = job.created_at.to_rfc3339();
    let started_at = job.started_at.map(|dt| dt.to_rfc3339());
    let ended_at = job.ended_at.map(|dt| dt.to_rfc3339());

    sqlx::query(
        r#"
        INSERT INTO resolution_jobs (
            job_id, state, total_records, completed_records, failed_records,
            created_at, started_at, ended_at, error
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(job_id) DO UPDATE SET
            state = excluded.state,
            completed_records = excluded.completed_records,
            failed_records = excluded.failed_records,
            started_at = excluded.started_at,
            ended_at = excluded.ended_at,
            error = excluded.error
        "#,
    )
    .bind(&job_id)
    .bind(job.state.as_str())
    .bind(job.total_records as i64)
    .bind(job.completed_records as i64)
    .bind(job.failed_records as i64)
    .bind(&created_at)
    .bind(&started_at)
    .bind(&ended_at)
    .bind(&job.error)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn get_job(db: &SqlitePool, job_id: Uuid) -> Result<Option<ResolutionJob>> {
    let row = sqlx::query(
        r#"
        SELECT job_id, state, total_records, completed_records, failed_records,
               created_at, started_at, ended_at, error
        FROM resolution_jobs
        WHERE job_id = ?
        "#,
    )
    .bind(job_id.to_string())
    .fetch_optional(db)
    .await?;

    row.map(|row| job_from_row(&row)).transpose()
}

/// Most recent jobs first
pub async fn list_jobs(db: &SqlitePool, limit: u32) -> Result<Vec<ResolutionJob>> {
    let rows = sqlx::query(
        r#"
        SELECT job_id, state, total_records, completed_records, failed_records,
               created_at, started_at, ended_at, error
        FROM resolution_jobs
        ORDER BY created_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit as i64)
    .fetch_all(db)
    .await?;

    rows.iter().map(job_from_row).collect()
}

fn job_from_row(row: &SqliteRow) -> Result<ResolutionJob> {
    let job_id: String = row.get("job_id");
    let job_id = Uuid::parse_str(&job_id)
        .map_err(|e| Error::Internal(format!("Invalid job_id in database: {}", e)))?;

    let state: String = row.get("state");
    let state: JobState = state
        .parse()
        .map_err(|e| Error::Internal(format!("Invalid job state in database: {}", e)))?;

    let created_at: String = row.get("created_at");
    let created_at = parse_timestamp(&created_at, "created_at")?;

    let started_at: Option<String> = row.get("started_at");
    let started_at = started_at
        .map(|s| parse_timestamp(&s, "started_at"))
        .transpose()?;

    let ended_at: Option<String> = row.get("ended_at");
    let ended_at = ended_at
        .map(|s| parse_timestamp(&s, "ended_at"))
        .transpose()?;

    Ok(ResolutionJob {
        job_id,
        state,
        total_records: row.get::<i64, _>("total_records") as usize,
        completed_records: row.get::<i64, _>("completed_records") as usize,
        failed_records: row.get::<i64, _>("failed_records") as usize,
        created_at,
        started_at,
        ended_at,
        error: row.get("error"),
    })
}

fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

/// Store one record's outcome
pub async fn save_record_outcome(
    db: &SqlitePool,
    job_id: Uuid,
    outcome: &JobRecordOutcome,
) -> Result<()> {
    let result_json = outcome
        .result
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to serialize result: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO resolution_results (
            job_id, record_index, company_name, result, error, created_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(job_id, record_index) DO UPDATE SET
            company_name = excluded.company_name,
            result = excluded.result,
            error = excluded.error
        "#,
    )
    .bind(job_id.to_string())
    .bind(outcome.record_index as i64)
    .bind(&outcome.company_name)
    .bind(&result_json)
    .bind(&outcome.error)
    .bind(Utc::now().to_rfc3339())
    .execute(db)
    .await?;

    Ok(())
}

/// All stored outcomes for a job, in input order
pub async fn get_record_outcomes(db: &SqlitePool, job_id: Uuid) -> Result<Vec<JobRecordOutcome>> {
    let rows = sqlx::query(
        r#"
        SELECT record_index, company_name, result, error
        FROM resolution_results
        WHERE job_id = ?
        ORDER BY record_index ASC
        "#,
    )
    .bind(job_id.to_string())
    .fetch_all(db)
    .await?;

    rows.into_iter()
        .map(|row| {
            let result_json: Option<String> = row.get("result");
            let result = result_json
                .map(|json| serde_json::from_str(&json))
                .transpose()
                .map_err(|e| Error::Internal(format!("Failed to deserialize result: {}", e)))?;

            Ok(JobRecordOutcome {
                record_index: row.get::<i64, _>("record_index") as usize,
                company_name: row.get("company_name"),
                result,
                error: row.get("error"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::types::{ResolutionResult, ResolutionStatus, SourceId, Tier};
    use std::collections::BTreeSet;

    fn resolved_result() -> ResolutionResult {
        let mut sources = BTreeSet::new();
        sources.insert(SourceId::StructuredLookupWithPhone);
        ResolutionResult {
            domain: Some("joesplumbing.com".to_string()),
            confidence: 95,
            tier: Tier::Full,
            agreeing_sources: sources,
            validation: None,
            status: ResolutionStatus::Resolved,
        }
    }

    #[tokio::test]
    async fn test_job_roundtrips() {
        let pool = test_pool().await;
        let mut job = ResolutionJob::new(10);
        job.state = JobState::Running;
        job.started_at = Some(Utc::now());
        save_job(&pool, &job).await.expect("save");

        let loaded = get_job(&pool, job.job_id).await.expect("get").expect("job");
        assert_eq!(loaded.job_id, job.job_id);
        assert_eq!(loaded.state, JobState::Running);
        assert_eq!(loaded.total_records, 10);
        assert!(loaded.started_at.is_some());
        assert!(loaded.ended_at.is_none());
    }

    #[tokio::test]
    async fn test_missing_job_is_none() {
        let pool = test_pool().await;
        assert!(get_job(&pool, Uuid::new_v4()).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_save_updates_existing_job() {
        let pool = test_pool().await;
        let mut job = ResolutionJob::new(3);
        save_job(&pool, &job).await.expect("save");

        job.state = JobState::Completed;
        job.completed_records = 3;
        job.ended_at = Some(Utc::now());
        save_job(&pool, &job).await.expect("update");

        let loaded = get_job(&pool, job.job_id).await.expect("get").expect("job");
        assert_eq!(loaded.state, JobState::Completed);
        assert_eq!(loaded.completed_records, 3);
        assert!(loaded.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_record_outcomes_come_back_in_input_order() {
        let pool = test_pool().await;
        let job = ResolutionJob::new(3);
        save_job(&pool, &job).await.expect("save");

        for index in [2usize, 0, 1] {
            let outcome = JobRecordOutcome {
                record_index: index,
                company_name: format!("Company {}", index),
                result: Some(resolved_result()),
                error: None,
            };
            save_record_outcome(&pool, job.job_id, &outcome)
                .await
                .expect("save outcome");
        }

        let outcomes = get_record_outcomes(&pool, job.job_id).await.expect("get");
        let indices: Vec<usize> = outcomes.iter().map(|o| o.record_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let result = outcomes[0].result.as_ref().expect("result");
        assert_eq!(result.domain.as_deref(), Some("joesplumbing.com"));
        assert_eq!(result.status, ResolutionStatus::Resolved);
    }

    #[tokio::test]
    async fn test_failed_record_stores_error_without_result() {
        let pool = test_pool().await;
        let job = ResolutionJob::new(1);
        save_job(&pool, &job).await.expect("save");

        let outcome = JobRecordOutcome {
            record_index: 0,
            company_name: String::new(),
            result: None,
            error: Some("record rejected: company name is required".to_string()),
        };
        save_record_outcome(&pool, job.job_id, &outcome)
            .await
            .expect("save outcome");

        let outcomes = get_record_outcomes(&pool, job.job_id).await.expect("get");
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].result.is_none());
        assert!(outcomes[0].error.as_deref().unwrap().contains("rejected"));
    }

    #[tokio::test]
    async fn test_list_jobs_newest_first() {
        let pool = test_pool().await;
        let mut first = ResolutionJob::new(1);
        first.created_at = Utc::now() - chrono::Duration::seconds(60);
        let second = ResolutionJob::new(2);
        save_job(&pool, &first).await.expect("save");
        save_job(&pool, &second).await.expect("save");

        let jobs = list_jobs(&pool, 10).await.expect("list");
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_id, second.job_id);
        assert_eq!(jobs[1].job_id, first.job_id);
    }
}
