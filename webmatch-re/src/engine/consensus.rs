//! Consensus and confidence engine
//!
//! Scores grouped candidates with deterministic rules first, invokes the
//! validation step (page fetch + probabilistic judgment) only when those
//! rules are inconclusive or the plan mandates it, and decides the terminal
//! status. All confidence calibration lives here; adapter-local raw
//! confidences never leave this module uncalibrated.

use crate::config::EngineConfig;
use crate::engine::router::ExecutionPlan;
use crate::normalize::name_similarity;
use crate::types::{
    CompanyRecord, GroupedCandidate, ResolutionStatus, SourceId, ValidationSignal,
};
use crate::validation::judgment::{JudgmentError, JudgmentEstimate, JudgmentScorer};
use crate::validation::{collect_signal, ContentFetcher};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// ============================================================================
// Calibration Constants
// ============================================================================

/// Confidence for a phone-verified match whose name evidence agrees
/// (or where no listing name exists to disagree)
const PHONE_AND_NAME_CONFIDENCE: u8 = 95;

/// Confidence for a phone-verified match whose listing name disagrees
const PHONE_ONLY_CONFIDENCE: u8 = 85;

/// Name agreement at or above which a phone match counts as name-confirmed
const STRONG_NAME_SIMILARITY: u8 = 70;

/// Name agreement at or above which name evidence alone carries confidence
const NAME_ONLY_MIN_SIMILARITY: u8 = 85;

/// Page name similarity at or above which judgment earns its name bonus
const JUDGMENT_NAME_BONUS_SIMILARITY: u8 = 60;

const JUDGMENT_NAME_BONUS: u8 = 10;
const JUDGMENT_CONTACT_BONUS: u8 = 5;

/// Boosted or blended confidence never reaches 100
const CONFIDENCE_CAP: u8 = 99;

/// Two candidates this close are a conflict, not a winner
const CONFLICT_WINDOW: u8 = 5;

// ============================================================================
// Decision
// ============================================================================

/// Consensus verdict for one record, before the assembler attaches the tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub domain: Option<String>,
    pub confidence: u8,
    pub agreeing_sources: BTreeSet<SourceId>,
    pub validation: Option<ValidationSignal>,
    pub status: ResolutionStatus,
}

impl Decision {
    fn unresolved() -> Self {
        Self {
            domain: None,
            confidence: 0,
            agreeing_sources: BTreeSet::new(),
            validation: None,
            status: ResolutionStatus::Unresolved,
        }
    }
}

/// One candidate group with its calibrated confidence
#[derive(Debug, Clone)]
struct Scored {
    group: GroupedCandidate,
    confidence: u8,
    validation: Option<ValidationSignal>,
    /// Judgment was needed but unavailable; evidence exists unconfirmed
    judgment_degraded: bool,
}

// ============================================================================
// Deterministic Rules
// ============================================================================

/// Best name agreement between the record and the group's pooled evidence
///
/// Page-extracted names only count while the page was reachable and actually
/// yielded candidates; a reachable page with no extractable name is absent
/// evidence, not a disagreement.
fn name_agreement(
    record: &CompanyRecord,
    group: &GroupedCandidate,
    signal: Option<&ValidationSignal>,
) -> Option<u8> {
    group
        .listing_names
        .iter()
        .map(|listing| name_similarity(&record.name, listing))
        .chain(
            signal
                .filter(|s| s.reachable && !s.name_candidates.is_empty())
                .map(|s| s.name_similarity),
        )
        .max()
}

/// Calibrated confidence from deterministic evidence alone
///
/// Rule order: phone-verified with agreeing name, phone-verified with
/// disagreeing name, strong name agreement, nothing. Cross-source agreement
/// then boosts the computed value; the cap never lowers a base that is
/// already above it.
fn automated_confidence(
    phone_match: bool,
    name_agreement: Option<u8>,
    source_count: usize,
    boost: u8,
) -> u8 {
    let base = if phone_match {
        match name_agreement {
            Some(sim) if sim >= STRONG_NAME_SIMILARITY => PHONE_AND_NAME_CONFIDENCE,
            Some(_) => PHONE_ONLY_CONFIDENCE,
            // A listing retrieved by this record's phone number with no
            // name attached has nothing contradicting it
            None => PHONE_AND_NAME_CONFIDENCE,
        }
    } else {
        match name_agreement {
            Some(sim) if sim >= NAME_ONLY_MIN_SIMILARITY => sim,
            _ => 0,
        }
    };

    if source_count >= 2 {
        base.saturating_add(boost).min(CONFIDENCE_CAP).max(base)
    } else {
        base
    }
}

/// Score a group from adapter evidence plus an optional page signal
fn evidence_confidence(
    record: &CompanyRecord,
    group: &GroupedCandidate,
    signal: Option<&ValidationSignal>,
    boost: u8,
) -> u8 {
    let phone_match = group.phone_match || signal.map_or(false, |s| s.phone_match);
    let agreement = name_agreement(record, group, signal);
    automated_confidence(phone_match, agreement, group.sources.len(), boost)
}

/// Blend a probabilistic judgment estimate with deterministic page evidence
fn blend_judgment(judgment_confidence: u8, signal: &ValidationSignal) -> u8 {
    let mut confidence = judgment_confidence;
    if signal.name_similarity >= JUDGMENT_NAME_BONUS_SIMILARITY {
        confidence = confidence.saturating_add(JUDGMENT_NAME_BONUS);
    }
    if signal.has_contact_info() {
        confidence = confidence.saturating_add(JUDGMENT_CONTACT_BONUS);
    }
    confidence.min(CONFIDENCE_CAP)
}

/// Deterministic ranking: confidence, then breadth of agreement, then the
/// strongest raw signal, then domain as the final stable key
fn rank(scored: &mut [Scored]) {
    scored.sort_by(|a, b| {
        b.confidence
            .cmp(&a.confidence)
            .then_with(|| b.group.sources.len().cmp(&a.group.sources.len()))
            .then_with(|| b.group.raw_confidence.cmp(&a.group.raw_confidence))
            .then_with(|| a.group.domain.cmp(&b.group.domain))
    });
}

// ============================================================================
// Decision Procedure
// ============================================================================

/// Decide `(domain, confidence, status)` for one record's grouped candidates
///
/// The validation step runs when the deterministic rules leave the best
/// candidate below the resolved threshold, or unconditionally when the plan
/// mandates it. At most the top candidate and a runner-up within the
/// conflict window are validated, each distinct domain at most once per
/// attempt.
pub async fn decide(
    record: &CompanyRecord,
    groups: Vec<GroupedCandidate>,
    plan: &ExecutionPlan,
    config: &EngineConfig,
    fetcher: &dyn ContentFetcher,
    judge: Option<&dyn JudgmentScorer>,
    cancel: &CancellationToken,
) -> Decision {
    let mut scored: Vec<Scored> = groups
        .into_iter()
        .map(|group| Scored {
            confidence: evidence_confidence(record, &group, None, config.consensus_boost),
            group,
            validation: None,
            judgment_degraded: false,
        })
        .collect();

    if scored.is_empty() {
        return Decision::unresolved();
    }

    rank(&mut scored);

    let needs_validation =
        plan.mandatory_validation || scored[0].confidence < config.resolved_threshold;

    if needs_validation && !cancel.is_cancelled() {
        for index in validation_targets(&scored) {
            if cancel.is_cancelled() {
                break;
            }
            validate_candidate(record, &mut scored[index], config, fetcher, judge).await;
        }
        rank(&mut scored);
    }

    let top_confidence = scored[0].confidence;
    let contested = scored
        .get(1)
        .map(|second| top_confidence - second.confidence <= CONFLICT_WINDOW)
        .unwrap_or(false);

    let status = if top_confidence >= config.resolved_threshold {
        ResolutionStatus::Resolved
    } else if contested {
        ResolutionStatus::Conflict
    } else if top_confidence >= config.low_confidence_threshold || scored[0].judgment_degraded {
        // Unconfirmed evidence still beats claiming there was none
        ResolutionStatus::LowConfidence
    } else {
        ResolutionStatus::Unresolved
    };

    let top = scored.swap_remove(0);
    if plan.consensus_required
        && status == ResolutionStatus::Resolved
        && top.group.sources.len() < 2
    {
        debug!(
            "{} resolved from a single source under a consensus-preferred plan",
            top.group.domain
        );
    }

    match status {
        ResolutionStatus::Unresolved => Decision {
            domain: None,
            confidence: top.confidence,
            agreeing_sources: BTreeSet::new(),
            validation: top.validation,
            status,
        },
        _ => Decision {
            domain: Some(top.group.domain),
            confidence: top.confidence,
            agreeing_sources: top.group.sources,
            validation: top.validation,
            status,
        },
    }
}

/// Indices to validate: the leader, plus a runner-up close enough to
/// contest the outcome
fn validation_targets(scored: &[Scored]) -> Vec<usize> {
    let mut targets = vec![0];
    if let Some(second) = scored.get(1) {
        if scored[0].confidence - second.confidence <= CONFLICT_WINDOW {
            targets.push(1);
        }
    }
    targets
}

/// Run the validation step for one candidate and update its confidence
///
/// Reachable page evidence is folded into the deterministic rules first;
/// when that alone clears the resolved threshold the judgment call is
/// skipped. Judgment unavailability keeps the evidence-based confidence and
/// marks the candidate degraded.
async fn validate_candidate(
    record: &CompanyRecord,
    scored: &mut Scored,
    config: &EngineConfig,
    fetcher: &dyn ContentFetcher,
    judge: Option<&dyn JudgmentScorer>,
) {
    let signal = collect_signal(
        fetcher,
        record,
        &scored.group.domain,
        Duration::from_millis(config.validation_timeout_ms),
    )
    .await;

    if !signal.reachable {
        debug!(
            "{} unreachable, keeping automated confidence {}",
            scored.group.domain, scored.confidence
        );
        scored.validation = Some(signal);
        return;
    }

    let revised = evidence_confidence(record, &scored.group, Some(&signal), config.consensus_boost);
    if revised >= config.resolved_threshold {
        debug!(
            "{} cleared deterministically by page evidence ({})",
            scored.group.domain, revised
        );
        scored.confidence = revised;
        scored.validation = Some(signal);
        return;
    }

    match run_judgment(judge, record, &scored.group.domain, &signal, config).await {
        Ok(estimate) => {
            let blended = blend_judgment(estimate.confidence, &signal);
            debug!(
                "{} judged at {} ({}), blended to {}",
                scored.group.domain, estimate.confidence, estimate.rationale, blended
            );
            scored.confidence = blended;
        }
        Err(e) => {
            warn!(
                "judgment unavailable for {}, keeping automated confidence {}: {}",
                scored.group.domain, revised, e
            );
            scored.confidence = revised;
            scored.judgment_degraded = true;
        }
    }
    scored.validation = Some(signal);
}

async fn run_judgment(
    judge: Option<&dyn JudgmentScorer>,
    record: &CompanyRecord,
    domain: &str,
    signal: &ValidationSignal,
    config: &EngineConfig,
) -> Result<JudgmentEstimate, JudgmentError> {
    match judge {
        Some(judge) => {
            tokio::time::timeout(
                Duration::from_millis(config.judgment_timeout_ms),
                judge.assess(record, domain, signal),
            )
            .await
            .map_err(|_| JudgmentError::Unavailable("judgment timed out".to_string()))?
        }
        None => Err(JudgmentError::Unavailable(
            "no judgment scorer configured".to_string(),
        )),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::router::route;
    use crate::types::Tier;
    use crate::validation::mock::{MockFetcher, MockJudge};
    use crate::validation::PageContent;

    fn group(domain: &str, sources: &[SourceId]) -> GroupedCandidate {
        GroupedCandidate {
            domain: domain.to_string(),
            raw_confidence: 50,
            sources: sources.iter().copied().collect(),
            phone_match: false,
            listing_names: Vec::new(),
        }
    }

    fn record() -> CompanyRecord {
        CompanyRecord {
            name: "Joe's Plumbing".to_string(),
            city: Some("Denver".to_string()),
            phone: Some("3035551234".to_string()),
            context: None,
        }
    }

    // ------------------------------------------------------------------
    // Deterministic rules
    // ------------------------------------------------------------------

    #[test]
    fn test_phone_match_with_agreeing_name_scores_95() {
        let mut g = group("joesplumbing.com", &[SourceId::StructuredLookupWithPhone]);
        g.phone_match = true;
        g.listing_names.push("Joe's Plumbing".to_string());

        assert_eq!(evidence_confidence(&record(), &g, None, 15), 95);
    }

    #[test]
    fn test_phone_match_without_listing_name_keeps_high_path() {
        let mut g = group("joesplumbing.com", &[SourceId::StructuredLookupWithPhone]);
        g.phone_match = true;

        assert_eq!(evidence_confidence(&record(), &g, None, 15), 95);
    }

    #[test]
    fn test_phone_match_with_disagreeing_name_scores_85() {
        let mut g = group("joesplumbing.com", &[SourceId::StructuredLookupWithPhone]);
        g.phone_match = true;
        g.listing_names.push("Mountain View Dental".to_string());

        assert_eq!(evidence_confidence(&record(), &g, None, 15), 85);
    }

    #[test]
    fn test_strong_name_agreement_alone_scores_the_similarity() {
        let mut g = group("joesplumbing.com", &[SourceId::WebSearch]);
        g.listing_names.push("Joe's Plumbing".to_string());

        let similarity = name_similarity("Joe's Plumbing", "Joe's Plumbing");
        assert!(similarity >= NAME_ONLY_MIN_SIMILARITY);
        assert_eq!(evidence_confidence(&record(), &g, None, 15), similarity);
    }

    #[test]
    fn test_weak_evidence_scores_zero() {
        let mut g = group("randomsite.net", &[SourceId::WebSearch]);
        g.listing_names.push("Mountain View Dental".to_string());

        assert_eq!(evidence_confidence(&record(), &g, None, 15), 0);
    }

    #[test]
    fn test_consensus_boost_adds_exactly_15() {
        let g = group(
            "joesplumbing.com",
            &[SourceId::WebSearch, SourceId::DirectoryMining],
        );

        // No phone or name evidence: base 0, two sources agree
        assert_eq!(evidence_confidence(&record(), &g, None, 15), 15);
    }

    #[test]
    fn test_consensus_boost_caps_at_99() {
        let mut g = group(
            "joesplumbing.com",
            &[SourceId::StructuredLookupWithPhone, SourceId::WebSearch],
        );
        g.phone_match = true;

        // 95 + 15 would exceed the cap
        assert_eq!(evidence_confidence(&record(), &g, None, 15), 99);
    }

    #[test]
    fn test_boost_never_lowers_a_maximal_base() {
        // Identical names score 100; the boost cap must not drag that down
        assert_eq!(automated_confidence(false, Some(100), 2, 15), 100);
        assert_eq!(automated_confidence(false, Some(100), 1, 15), 100);
    }

    #[test]
    fn test_reachable_page_without_names_is_not_a_disagreement() {
        let mut g = group("joesplumbing.com", &[SourceId::StructuredLookupWithPhone]);
        g.phone_match = true;

        let signal = ValidationSignal {
            domain: "joesplumbing.com".to_string(),
            reachable: true,
            ..Default::default()
        };

        assert_eq!(evidence_confidence(&record(), &g, Some(&signal), 15), 95);
    }

    #[test]
    fn test_blend_judgment_bonuses_and_cap() {
        let mut signal = ValidationSignal {
            domain: "joesplumbing.com".to_string(),
            reachable: true,
            name_similarity: 60,
            ..Default::default()
        };
        signal.phones.push("3035551234".to_string());

        // name bonus + contact bonus
        assert_eq!(blend_judgment(70, &signal), 85);

        signal.name_similarity = 59;
        assert_eq!(blend_judgment(70, &signal), 75);

        signal.name_similarity = 90;
        assert_eq!(blend_judgment(90, &signal), 99);
    }

    // ------------------------------------------------------------------
    // Decision procedure
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_confident_candidate_skips_validation() {
        let mut g = group("joesplumbing.com", &[SourceId::StructuredLookupWithPhone]);
        g.raw_confidence = 95;
        g.phone_match = true;

        let fetcher = MockFetcher::unreachable();
        let decision = decide(
            &record(),
            vec![g],
            &route(Tier::Full),
            &EngineConfig::default(),
            &fetcher,
            None,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(decision.domain.as_deref(), Some("joesplumbing.com"));
        assert_eq!(decision.confidence, 95);
        assert_eq!(decision.status, ResolutionStatus::Resolved);
        assert!(decision.validation.is_none());
        assert_eq!(fetcher.fetch_count(), 0, "no page fetch above the threshold");
    }

    #[tokio::test]
    async fn test_no_candidates_is_unresolved_zero() {
        let fetcher = MockFetcher::unreachable();
        let decision = decide(
            &CompanyRecord::named("Ghost Co"),
            Vec::new(),
            &route(Tier::NameOnly),
            &EngineConfig::default(),
            &fetcher,
            None,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(decision.domain, None);
        assert_eq!(decision.confidence, 0);
        assert_eq!(decision.status, ResolutionStatus::Unresolved);
        assert!(decision.agreeing_sources.is_empty());
    }

    #[tokio::test]
    async fn test_close_weak_candidates_conflict() {
        let a = group("ghost-co.com", &[SourceId::WebSearch, SourceId::DirectoryMining]);
        let b = group("ghostco.net", &[SourceId::FreeTextQueryGeneration, SourceId::B2bEnrichment]);

        let fetcher = MockFetcher::unreachable();
        let decision = decide(
            &CompanyRecord::named("Ghost Co"),
            vec![a, b],
            &route(Tier::NameOnly),
            &EngineConfig::default(),
            &fetcher,
            None,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(decision.status, ResolutionStatus::Conflict);
        // Equal scores: the stable ranking picks the lexicographically
        // first domain, never an arbitrary one
        assert_eq!(decision.domain.as_deref(), Some("ghost-co.com"));
    }

    #[tokio::test]
    async fn test_weak_lone_candidate_is_unresolved_with_null_domain() {
        let g = group("randomsite.net", &[SourceId::WebSearch]);

        let fetcher = MockFetcher::unreachable();
        let decision = decide(
            &CompanyRecord::named("Ghost Co"),
            vec![g],
            &route(Tier::NameOnly),
            &EngineConfig::default(),
            &fetcher,
            None,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(decision.domain, None);
        assert_eq!(decision.status, ResolutionStatus::Unresolved);
        // The unreachable probe is kept as evidence of the attempt
        assert!(decision.validation.is_some());
        assert_eq!(fetcher.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_page_evidence_alone_can_resolve_without_judgment() {
        let g = group(
            "joesplumbing.com",
            &[SourceId::WebSearch, SourceId::DirectoryMining],
        );

        let page = PageContent {
            reachable: true,
            name_candidates: vec!["Joe's Plumbing".to_string()],
            phones: vec!["3035551234".to_string()],
            emails: Vec::new(),
        };
        let fetcher = MockFetcher::serving("joesplumbing.com", page);

        // No judge configured: reaching `resolved` proves the
        // deterministic path decided on its own
        let decision = decide(
            &record(),
            vec![g],
            &route(Tier::NameOnly),
            &EngineConfig::default(),
            &fetcher,
            None,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(decision.status, ResolutionStatus::Resolved);
        assert_eq!(decision.confidence, 99);
        let signal = decision.validation.expect("page signal kept");
        assert!(signal.reachable);
        assert!(signal.phone_match);
    }

    #[tokio::test]
    async fn test_judgment_blend_applies_contact_bonus() {
        let g = group("ghostco.com", &[SourceId::WebSearch]);

        // Page has contact info but no extractable name, so the +10 name
        // bonus stays off and only +5 applies
        let page = PageContent {
            reachable: true,
            name_candidates: Vec::new(),
            phones: Vec::new(),
            emails: vec!["info@ghostco.com".to_string()],
        };
        let fetcher = MockFetcher::serving("ghostco.com", page);
        let judge = MockJudge::scoring(70, "name matches page copy");

        let decision = decide(
            &CompanyRecord::named("Ghost Co"),
            vec![g],
            &route(Tier::NameOnly),
            &EngineConfig::default(),
            &fetcher,
            Some(&judge),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(decision.confidence, 75);
        assert_eq!(decision.status, ResolutionStatus::LowConfidence);
        assert_eq!(judge.call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_judge_floors_at_low_confidence() {
        let g = group("ghostco.com", &[SourceId::WebSearch]);

        let page = PageContent {
            reachable: true,
            name_candidates: vec!["Industrial Holdings".to_string()],
            phones: Vec::new(),
            emails: Vec::new(),
        };
        let fetcher = MockFetcher::serving("ghostco.com", page);

        let decision = decide(
            &CompanyRecord::named("Ghost Co"),
            vec![g],
            &route(Tier::NameOnly),
            &EngineConfig::default(),
            &fetcher,
            None,
            &CancellationToken::new(),
        )
        .await;

        // Evidence exists but could not be confirmed: low-confidence, not
        // unresolved, and the candidate domain is kept
        assert_eq!(decision.status, ResolutionStatus::LowConfidence);
        assert_eq!(decision.domain.as_deref(), Some("ghostco.com"));
    }

    #[tokio::test]
    async fn test_failing_judge_floors_at_low_confidence() {
        let g = group("ghostco.com", &[SourceId::WebSearch]);

        let page = PageContent {
            reachable: true,
            name_candidates: vec!["Industrial Holdings".to_string()],
            phones: Vec::new(),
            emails: Vec::new(),
        };
        let fetcher = MockFetcher::serving("ghostco.com", page);
        let judge = MockJudge::failing("quota exhausted");

        let decision = decide(
            &CompanyRecord::named("Ghost Co"),
            vec![g],
            &route(Tier::NameOnly),
            &EngineConfig::default(),
            &fetcher,
            Some(&judge),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(decision.status, ResolutionStatus::LowConfidence);
        assert_eq!(decision.domain.as_deref(), Some("ghostco.com"));
        assert_eq!(judge.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mandatory_validation_probes_even_confident_candidates() {
        let mut g = group("ghostco.com", &[SourceId::WebSearch, SourceId::DirectoryMining]);
        g.listing_names.push("Ghost Co".to_string());

        // Name agreement 100 resolves on automated rules, but the
        // name-only plan still demands a validation attempt
        let fetcher = MockFetcher::unreachable();
        let decision = decide(
            &CompanyRecord::named("Ghost Co"),
            vec![g],
            &route(Tier::NameOnly),
            &EngineConfig::default(),
            &fetcher,
            None,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(fetcher.fetch_count(), 1);
        // Unreachable page: automated signals already cleared the bar
        assert_eq!(decision.status, ResolutionStatus::Resolved);
        assert_eq!(decision.confidence, 100);
    }

    #[tokio::test]
    async fn test_decision_is_deterministic_across_reruns() {
        let make_groups = || {
            vec![
                group("ghost-co.com", &[SourceId::WebSearch, SourceId::DirectoryMining]),
                group("ghostco.net", &[SourceId::B2bEnrichment]),
            ]
        };

        let fetcher = MockFetcher::unreachable();
        let config = EngineConfig::default();
        let cancel = CancellationToken::new();
        let record = CompanyRecord::named("Ghost Co");
        let plan = route(Tier::NameOnly);

        let first = decide(&record, make_groups(), &plan, &config, &fetcher, None, &cancel).await;
        let second = decide(&record, make_groups(), &plan, &config, &fetcher, None, &cancel).await;

        assert_eq!(first, second);
    }
}
