//! Batch worker pool
//!
//! Resolves a job's records with a bounded number of concurrent workers
//! via `buffer_unordered`. Per-record failures are recorded and never
//! abort the batch; cancellation stops pulling new records while keeping
//! every outcome already stored.

use crate::batch::{JobRecordOutcome, JobState, ResolutionJob};
use crate::db::jobs;
use crate::engine::ResolutionEngine;
use crate::types::{CompanyRecord, ResolutionStatus};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use webmatch_common::events::{EventBus, WebmatchEvent};
use webmatch_common::Result;

pub struct BatchProcessor {
    engine: Arc<ResolutionEngine>,
    db: SqlitePool,
    event_bus: EventBus,
    worker_count: usize,
}

impl BatchProcessor {
    pub fn new(
        engine: Arc<ResolutionEngine>,
        db: SqlitePool,
        event_bus: EventBus,
        worker_count: usize,
    ) -> Self {
        Self {
            engine,
            db,
            event_bus,
            worker_count: worker_count.max(1),
        }
    }

    /// Run a job to completion (or cancellation)
    ///
    /// Returns the final job row as persisted. Per-record errors are
    /// stored as outcomes; only job-level faults (persistence of the job
    /// row itself) surface as `Err`.
    pub async fn run(
        &self,
        mut job: ResolutionJob,
        records: Vec<CompanyRecord>,
        cancel: CancellationToken,
    ) -> Result<ResolutionJob> {
        let job_id = job.job_id;
        let total = records.len();

        job.state = JobState::Running;
        job.started_at = Some(Utc::now());
        if let Err(e) = jobs::save_job(&self.db, &job).await {
            self.event_bus.emit_lossy(WebmatchEvent::JobFailed {
                job_id,
                error_message: e.to_string(),
                completed_records: 0,
                timestamp: Utc::now(),
            });
            return Err(e);
        }

        info!(job_id = %job_id, total_records = total, "batch job started");
        self.event_bus.emit_lossy(WebmatchEvent::JobStarted {
            job_id,
            total_records: total,
            timestamp: Utc::now(),
        });

        let completed = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let resolved = Arc::new(AtomicUsize::new(0));

        stream::iter(records.into_iter().enumerate())
            .map(|(index, record)| {
                let engine = self.engine.clone();
                let db = self.db.clone();
                let event_bus = self.event_bus.clone();
                let cancel = cancel.clone();
                let completed = completed.clone();
                let failed = failed.clone();
                let resolved = resolved.clone();

                async move {
                    // Records not yet started when cancel lands are skipped
                    if cancel.is_cancelled() {
                        return;
                    }

                    debug!(job_id = %job_id, record_index = index, "worker starting record");

                    let outcome = match engine.resolve_cancellable(&record, &cancel).await {
                        Ok(result) => {
                            if result.status == ResolutionStatus::Resolved {
                                resolved.fetch_add(1, Ordering::Relaxed);
                            }
                            completed.fetch_add(1, Ordering::Relaxed);
                            event_bus.emit_lossy(WebmatchEvent::RecordResolved {
                                job_id,
                                record_index: index,
                                domain: result.domain.clone(),
                                confidence: result.confidence,
                                status: result.status.to_string(),
                                timestamp: Utc::now(),
                            });
                            JobRecordOutcome {
                                record_index: index,
                                company_name: record.name.clone(),
                                result: Some(result),
                                error: None,
                            }
                        }
                        Err(e) => {
                            warn!(
                                job_id = %job_id,
                                record_index = index,
                                error = %e,
                                "record failed"
                            );
                            failed.fetch_add(1, Ordering::Relaxed);
                            JobRecordOutcome {
                                record_index: index,
                                company_name: record.name.clone(),
                                result: None,
                                error: Some(e.to_string()),
                            }
                        }
                    };

                    if let Err(e) = jobs::save_record_outcome(&db, job_id, &outcome).await {
                        error!(
                            job_id = %job_id,
                            record_index = index,
                            error = %e,
                            "failed to store record outcome"
                        );
                    }

                    let done = completed.load(Ordering::Relaxed);
                    let errs = failed.load(Ordering::Relaxed);
                    let settled = done + errs;
                    event_bus.emit_lossy(WebmatchEvent::JobProgress {
                        job_id,
                        completed: done,
                        failed: errs,
                        total,
                        percentage: if total == 0 {
                            100.0
                        } else {
                            settled as f32 / total as f32 * 100.0
                        },
                        current_operation: format!("record {}/{}", settled, total),
                        timestamp: Utc::now(),
                    });
                }
            })
            .buffer_unordered(self.worker_count)
            .collect::<Vec<()>>()
            .await;

        job.completed_records = completed.load(Ordering::Relaxed);
        job.failed_records = failed.load(Ordering::Relaxed);
        job.ended_at = Some(Utc::now());

        let settled = job.completed_records + job.failed_records;
        if cancel.is_cancelled() {
            job.state = JobState::Cancelled;
            info!(
                job_id = %job_id,
                completed = job.completed_records,
                skipped = total - settled,
                "batch job cancelled"
            );
            self.event_bus.emit_lossy(WebmatchEvent::JobCancelled {
                job_id,
                completed_records: job.completed_records,
                skipped_records: total - settled,
                timestamp: Utc::now(),
            });
        } else {
            job.state = JobState::Completed;
            let duration_seconds = job
                .started_at
                .map(|started| (Utc::now() - started).num_seconds().max(0) as u64)
                .unwrap_or(0);
            info!(
                job_id = %job_id,
                total_records = total,
                resolved = resolved.load(Ordering::Relaxed),
                failed = job.failed_records,
                duration_seconds,
                "batch job completed"
            );
            self.event_bus.emit_lossy(WebmatchEvent::JobCompleted {
                job_id,
                total_records: total,
                resolved_records: resolved.load(Ordering::Relaxed),
                duration_seconds,
                timestamp: Utc::now(),
            });
        }

        jobs::save_job(&self.db, &job).await?;
        Ok(job)
    }
}
