//! Event types for the Webmatch event system
//!
//! Provides shared event definitions and the EventBus used by the
//! resolution service for SSE broadcasting.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Webmatch event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// All events use this central enum for type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WebmatchEvent {
    /// Batch resolution job started
    ///
    /// Triggers:
    /// - SSE: Show job progress UI
    /// - Database: Job record transitioned to running
    JobStarted {
        /// Resolution job UUID
        job_id: Uuid,
        /// Number of records in the batch
        total_records: usize,
        /// When the job started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job progress update
    ///
    /// Emitted as workers finish records. Lossy: dropped when no
    /// subscriber is listening.
    JobProgress {
        /// Resolution job UUID
        job_id: Uuid,
        /// Records finished so far (resolved or not)
        completed: usize,
        /// Records that failed with a record-level error
        failed: usize,
        /// Total record count
        total: usize,
        /// Progress percentage (0.0-100.0)
        percentage: f32,
        /// Current operation description
        current_operation: String,
        /// When progress was captured
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A single record finished resolving
    RecordResolved {
        /// Resolution job UUID
        job_id: Uuid,
        /// Index of the record in the submitted batch
        record_index: usize,
        /// Winning domain, if any
        domain: Option<String>,
        /// Calibrated confidence (0-100)
        confidence: u8,
        /// Terminal status (resolved / low-confidence / unresolved / conflict)
        status: String,
        /// When the record finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job completed (all records settled, including per-record failures)
    JobCompleted {
        /// Resolution job UUID
        job_id: Uuid,
        /// Number of records processed
        total_records: usize,
        /// Number of records that ended with status `resolved`
        resolved_records: usize,
        /// Job duration in seconds
        duration_seconds: u64,
        /// When the job completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job failed with a job-level error (not a per-record failure)
    JobFailed {
        /// Resolution job UUID
        job_id: Uuid,
        /// Error message details
        error_message: String,
        /// Records finished before the failure
        completed_records: usize,
        /// When the job failed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job cancelled by the caller
    JobCancelled {
        /// Resolution job UUID
        job_id: Uuid,
        /// Records finished before cancellation; their results are kept
        completed_records: usize,
        /// Records skipped due to cancellation
        skipped_records: usize,
        /// When the job was cancelled
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl WebmatchEvent {
    /// Get event type as string for SSE event naming and filtering
    pub fn event_type(&self) -> &str {
        match self {
            WebmatchEvent::JobStarted { .. } => "JobStarted",
            WebmatchEvent::JobProgress { .. } => "JobProgress",
            WebmatchEvent::RecordResolved { .. } => "RecordResolved",
            WebmatchEvent::JobCompleted { .. } => "JobCompleted",
            WebmatchEvent::JobFailed { .. } => "JobFailed",
            WebmatchEvent::JobCancelled { .. } => "JobCancelled",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use webmatch_common::events::{EventBus, WebmatchEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(WebmatchEvent::JobStarted {
///     job_id: uuid::Uuid::new_v4(),
///     total_records: 25,
///     timestamp: chrono::Utc::now(),
/// });
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WebmatchEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    ///
    /// Events beyond the capacity displace the oldest buffered events;
    /// slow subscribers observe a lag error instead of blocking emitters.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<WebmatchEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: WebmatchEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<WebmatchEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    ///
    /// Used for progress updates where it is acceptable if no component
    /// is currently subscribed.
    pub fn emit_lossy(&self, event: WebmatchEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
