//! Tiered multi-source resolution engine
//!
//! Pipeline for one record:
//!
//! ```text
//! CompanyRecord -> classifier -> router -> executor -> aggregator
//!               -> consensus (validation on demand) -> assembler
//! ```
//!
//! Per-adapter and per-record failures are isolated inside the pipeline;
//! only caller errors (empty name) and adapter contract violations surface
//! as `EngineError`.

pub mod aggregator;
pub mod assembler;
pub mod classifier;
pub mod consensus;
pub mod executor;
pub mod router;

use crate::adapters::AdapterRegistry;
use crate::config::EngineConfig;
use crate::types::{CompanyRecord, EngineError, ResolutionResult};
use crate::validation::judgment::JudgmentScorer;
use crate::validation::ContentFetcher;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The resolution engine with its collaborators wired in
///
/// Cheap to share behind an `Arc`; resolution attempts hold no mutable
/// state, so concurrent `resolve` calls never interfere.
pub struct ResolutionEngine {
    config: EngineConfig,
    registry: Arc<AdapterRegistry>,
    fetcher: Arc<dyn ContentFetcher>,
    judge: Option<Arc<dyn JudgmentScorer>>,
}

impl ResolutionEngine {
    pub fn new(
        config: EngineConfig,
        registry: Arc<AdapterRegistry>,
        fetcher: Arc<dyn ContentFetcher>,
        judge: Option<Arc<dyn JudgmentScorer>>,
    ) -> Self {
        Self {
            config,
            registry,
            fetcher,
            judge,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve one record end to end
    ///
    /// # Errors
    /// `EngineError::InvalidRecord` for a record with no name;
    /// `EngineError::Contract` when an adapter emits an unusable domain.
    pub async fn resolve(&self, record: &CompanyRecord) -> Result<ResolutionResult, EngineError> {
        self.resolve_cancellable(record, &CancellationToken::new())
            .await
    }

    /// Resolve one record, honoring a batch-level cancel token
    ///
    /// Cancellation mid-record yields whatever the pipeline concluded from
    /// the evidence gathered so far; it is not an error.
    pub async fn resolve_cancellable(
        &self,
        record: &CompanyRecord,
        cancel: &CancellationToken,
    ) -> Result<ResolutionResult, EngineError> {
        classifier::validate(record)?;
        let record = record.sanitized();
        let tier = classifier::classify(&record);
        let plan = router::route(tier);
        debug!(
            "classified {:?} as tier {} ({} adapters, {:?})",
            record.name,
            tier,
            plan.adapters.len(),
            plan.mode
        );

        let candidates = executor::execute_plan(
            &self.registry,
            &plan,
            &record,
            Duration::from_millis(self.config.adapter_timeout_ms),
            cancel,
        )
        .await;

        let groups = aggregator::aggregate(candidates, self.config.merge_subdomains)?;
        let decision = consensus::decide(
            &record,
            groups,
            &plan,
            &self.config,
            self.fetcher.as_ref(),
            self.judge.as_deref(),
            cancel,
        )
        .await;

        let result = assembler::assemble(tier, decision);
        debug!(
            "{:?} -> {:?} (confidence {}, {})",
            record.name, result.domain, result.confidence, result.status
        );
        Ok(result)
    }
}

// ============================================================================
// Tests
// ============================================================================
