//! Plan execution against the adapter registry
//!
//! Drives the adapters named by an execution plan and collects their
//! candidates. Every per-adapter problem is isolated here: timeouts,
//! transport errors and missing registrations all reduce to "no candidate
//! from that source" so a single bad upstream never sinks an attempt.

use crate::adapters::AdapterRegistry;
use crate::engine::router::{ExecutionMode, ExecutionPlan};
use crate::types::{AdapterOutcome, Candidate, CompanyRecord, SourceAdapter};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Run a plan's adapters and collect every candidate they produce
///
/// Sequential plans stop early once the plan's short-circuit rule is met;
/// parallel plans wait for every adapter to settle. Adapters missing from
/// the registry are skipped.
pub async fn execute_plan(
    registry: &AdapterRegistry,
    plan: &ExecutionPlan,
    record: &CompanyRecord,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Vec<Candidate> {
    match plan.mode {
        ExecutionMode::SequentialFallback => {
            run_sequential(registry, plan, record, timeout, cancel).await
        }
        ExecutionMode::ParallelAll => run_parallel(registry, plan, record, timeout, cancel).await,
    }
}

async fn run_sequential(
    registry: &AdapterRegistry,
    plan: &ExecutionPlan,
    record: &CompanyRecord,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for source_id in &plan.adapters {
        if cancel.is_cancelled() {
            break;
        }
        let Some(adapter) = registry.get(*source_id) else {
            debug!("{} not registered, skipping", source_id);
            continue;
        };

        if let Some(candidate) = run_adapter(adapter, record, timeout, cancel).await {
            // A hit that misses the short-circuit bar still counts as
            // evidence; the next source runs and consensus sorts it out.
            let stop = plan.short_circuit.map(|rule| rule.is_met(&candidate)).unwrap_or(false);
            candidates.push(candidate);
            if stop {
                debug!("{} met the short-circuit rule, skipping remaining sources", source_id);
                break;
            }
        }
    }

    candidates
}

async fn run_parallel(
    registry: &AdapterRegistry,
    plan: &ExecutionPlan,
    record: &CompanyRecord,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Vec<Candidate> {
    let invocations = plan.adapters.iter().filter_map(|source_id| {
        let Some(adapter) = registry.get(*source_id) else {
            debug!("{} not registered, skipping", source_id);
            return None;
        };
        Some(run_adapter(adapter, record, timeout, cancel))
    });

    join_all(invocations).await.into_iter().flatten().collect()
}

/// Invoke one adapter under the per-adapter timeout and cancel token
///
/// Returns the candidate on success; every failure mode logs and yields
/// `None` (absent evidence).
async fn run_adapter(
    adapter: Arc<dyn SourceAdapter>,
    record: &CompanyRecord,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Option<Candidate> {
    let source_id = adapter.id();

    let outcome = tokio::select! {
        _ = cancel.cancelled() => {
            debug!("{} cancelled mid-flight", source_id);
            return None;
        }
        result = tokio::time::timeout(timeout, adapter.resolve(record)) => result,
    };

    match outcome {
        Ok(Ok(AdapterOutcome::Found(candidate))) => {
            debug!(
                "{} proposed {} (raw confidence {})",
                source_id, candidate.domain, candidate.raw_confidence
            );
            Some(candidate)
        }
        Ok(Ok(AdapterOutcome::NotFound)) => {
            debug!("{} had no answer", source_id);
            None
        }
        Ok(Err(e)) => {
            warn!("{} unavailable, treating as absent evidence: {}", source_id, e);
            None
        }
        Err(_) => {
            warn!(
                "{} timed out after {}ms, treating as absent evidence",
                source_id,
                timeout.as_millis()
            );
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
