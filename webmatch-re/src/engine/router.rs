//! Tier-to-plan strategy routing
//!
//! The routing policy is held as a data table rather than branching
//! spread through the pipeline, so adding a tier or adapter is an
//! additive table change. Higher tiers carry less-trustworthy individual
//! signals, so the table trades cost (more parallel calls) for
//! reliability (cross-source agreement) as completeness drops.

use crate::types::{Candidate, SourceId, Tier};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// How the adapters of a plan are driven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Adapters run one at a time; a short-circuit hit skips the rest
    SequentialFallback,
    /// All adapters run concurrently; the engine waits for all to settle
    ParallelAll,
}

/// Early-stop rule for sequential plans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortCircuit {
    /// Minimum adapter-local confidence to stop on
    pub min_raw_confidence: u8,
    /// Candidate must carry adapter-verified phone evidence
    pub require_phone_match: bool,
}

impl ShortCircuit {
    /// Whether a candidate satisfies this rule
    pub fn is_met(&self, candidate: &Candidate) -> bool {
        candidate.raw_confidence >= self.min_raw_confidence
            && (!self.require_phone_match || candidate.metadata.phone_match)
    }
}

/// One tier's resolution strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Adapters to invoke; order matters in sequential mode
    pub adapters: Vec<SourceId>,
    /// Sequential fallback or parallel fan-out
    pub mode: ExecutionMode,
    /// Cross-source agreement is expected before trusting a single signal
    pub consensus_required: bool,
    /// Validation must run before the record may return `resolved`
    pub mandatory_validation: bool,
    /// Early-stop rule, sequential mode only
    pub short_circuit: Option<ShortCircuit>,
}

static ROUTING_TABLE: Lazy<BTreeMap<Tier, ExecutionPlan>> = Lazy::new(|| {
    let deep_fanout = vec![
        SourceId::FreeTextQueryGeneration,
        SourceId::DirectoryMining,
        SourceId::WebSearch,
        SourceId::B2bEnrichment,
    ];

    BTreeMap::from([
        (
            Tier::Full,
            ExecutionPlan {
                adapters: vec![
                    SourceId::StructuredLookupWithPhone,
                    SourceId::StructuredLookupByName,
                    SourceId::WebSearch,
                ],
                mode: ExecutionMode::SequentialFallback,
                consensus_required: false,
                mandatory_validation: false,
                // Stop once a phone-verified match reaches raw 95
                short_circuit: Some(ShortCircuit {
                    min_raw_confidence: 95,
                    require_phone_match: true,
                }),
            },
        ),
        (
            Tier::NameCity,
            ExecutionPlan {
                adapters: vec![SourceId::StructuredLookupByName, SourceId::WebSearch],
                mode: ExecutionMode::ParallelAll,
                consensus_required: false,
                mandatory_validation: false,
                short_circuit: None,
            },
        ),
        (
            Tier::NameContext,
            ExecutionPlan {
                adapters: deep_fanout.clone(),
                mode: ExecutionMode::ParallelAll,
                consensus_required: true,
                mandatory_validation: false,
                short_circuit: None,
            },
        ),
        (
            Tier::NameOnly,
            ExecutionPlan {
                adapters: deep_fanout,
                mode: ExecutionMode::ParallelAll,
                consensus_required: true,
                mandatory_validation: true,
                short_circuit: None,
            },
        ),
    ])
});

/// Map a tier to its execution plan
pub fn route(tier: Tier) -> ExecutionPlan {
    ROUTING_TABLE
        .get(&tier)
        .cloned()
        .expect("routing table covers every tier")
}
