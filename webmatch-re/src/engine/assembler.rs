//! Result assembly
//!
//! Pure packaging of a consensus decision into the engine's output record.

use crate::engine::consensus::Decision;
use crate::types::{ResolutionResult, Tier};

/// Package the chosen domain, confidence, sources and evidence trail
pub fn assemble(tier: Tier, decision: Decision) -> ResolutionResult {
    ResolutionResult {
        domain: decision.domain,
        confidence: decision.confidence,
        tier,
        agreeing_sources: decision.agreeing_sources,
        validation: decision.validation,
        status: decision.status,
    }
}
