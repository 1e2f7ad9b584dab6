//! Batch resolution jobs
//!
//! A job is a set of company records resolved by a bounded worker pool.
//! Job state and per-record outcomes are persisted so a batch survives
//! process restarts and results stay queryable after completion.

pub mod processor;

pub use processor::BatchProcessor;

use crate::types::ResolutionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle of a batch resolution job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    /// Accepted, not yet picked up by the processor
    Pending,
    /// Worker pool is resolving records
    Running,
    /// All records processed
    Completed,
    /// Job-level failure; per-record failures never cause this
    Failed,
    /// Stopped on request; already-resolved records are kept
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    /// No further transitions happen out of these states
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "running" => Ok(JobState::Running),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "cancelled" => Ok(JobState::Cancelled),
            other => Err(format!("unknown job state: {}", other)),
        }
    }
}

/// One batch resolution job
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionJob {
    pub job_id: Uuid,
    pub state: JobState,
    pub total_records: usize,
    pub completed_records: usize,
    pub failed_records: usize,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolutionJob {
    pub fn new(total_records: usize) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            state: JobState::Pending,
            total_records,
            completed_records: 0,
            failed_records: 0,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            error: None,
        }
    }
}

/// One record's stored outcome within a job
///
/// Exactly one of `result` and `error` is set: a malformed record fails
/// fast with an error entry while the rest of the batch continues.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecordOutcome {
    pub record_index: usize,
    pub company_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResolutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
