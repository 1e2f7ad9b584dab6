//! Core types and trait definitions for the resolution engine
//!
//! Defines the data model flowing through the pipeline:
//! - **Input:** CompanyRecord, classified into a completeness Tier
//! - **Adapter seam:** SourceAdapter trait producing Candidates
//! - **Evidence:** GroupedCandidate, ValidationSignal
//! - **Output:** ResolutionResult with one of four terminal statuses

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Input Types
// ============================================================================

/// Identifying fields available for one company
///
/// Completeness varies wildly between sources of input: a record may carry
/// a full contact profile or nothing beyond a name. Immutable once
/// classified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    /// Company name (required; empty name is rejected before classification)
    pub name: String,
    /// City, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Phone number, normalized to digits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Free-text context (industry, description)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl CompanyRecord {
    /// Record with only a name set
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns a copy with whitespace trimmed, blank optionals dropped and
    /// the phone reduced to digits
    ///
    /// Classification evaluates field presence on the sanitized form, so
    /// whitespace-only fields count as absent.
    pub fn sanitized(&self) -> Self {
        fn clean(field: &Option<String>) -> Option<String> {
            field
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }

        Self {
            name: self.name.trim().to_string(),
            city: clean(&self.city),
            phone: clean(&self.phone)
                .map(|p| crate::normalize::normalize_phone(&p))
                .filter(|p| !p.is_empty()),
            context: clean(&self.context),
        }
    }
}

/// Input-data completeness tier
///
/// Computed deterministically from which record fields are non-empty.
/// The tier drives which adapters run and whether execution is sequential
/// or parallel; it never changes after computation.
///
/// Serializes as its numeric level (1-4) for API compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Tier {
    /// Tier 1: name + city + phone
    Full,
    /// Tier 2: name + city
    NameCity,
    /// Tier 3: name + context, no city
    NameContext,
    /// Tier 4: name only
    NameOnly,
}

impl Tier {
    /// Numeric level (1 = most complete, 4 = least)
    pub fn level(&self) -> u8 {
        match self {
            Tier::Full => 1,
            Tier::NameCity => 2,
            Tier::NameContext => 3,
            Tier::NameOnly => 4,
        }
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> u8 {
        tier.level()
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(Tier::Full),
            2 => Ok(Tier::NameCity),
            3 => Ok(Tier::NameContext),
            4 => Ok(Tier::NameOnly),
            other => Err(format!("invalid tier level: {}", other)),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

// ============================================================================
// Source Adapter Seam
// ============================================================================

/// Stable identifier of a resolution source
///
/// Serialized form matches the routing table names exactly
/// (e.g. `structured-lookup-with-phone`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SourceId {
    /// Local-business directory lookup keyed by phone number
    StructuredLookupWithPhone,
    /// Local-business directory search by name and city
    StructuredLookupByName,
    /// Web search over the open internet
    WebSearch,
    /// LLM-generated queries from free-text context, fed into web search
    FreeTextQueryGeneration,
    /// Business-directory aggregator profile mining
    DirectoryMining,
    /// B2B company-data enrichment API
    B2bEnrichment,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::StructuredLookupWithPhone => "structured-lookup-with-phone",
            SourceId::StructuredLookupByName => "structured-lookup-by-name",
            SourceId::WebSearch => "web-search",
            SourceId::FreeTextQueryGeneration => "free-text-query-generation",
            SourceId::DirectoryMining => "directory-mining",
            SourceId::B2bEnrichment => "b2b-enrichment",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One adapter's proposed answer for a record
///
/// `raw_confidence` is adapter-local (0-100) and not comparable across
/// adapters; only the consensus engine's calibrated output is. Candidates
/// are ephemeral, produced per resolution attempt, never persisted
/// standalone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Proposed domain, normalized (lowercase, scheme and `www.` stripped)
    pub domain: String,
    /// Adapter that proposed it
    pub source_id: SourceId,
    /// Adapter-local confidence (0-100)
    pub raw_confidence: u8,
    /// Adapter-specific evidence
    #[serde(default)]
    pub metadata: CandidateMetadata,
}

impl Candidate {
    pub fn new(domain: impl Into<String>, source_id: SourceId, raw_confidence: u8) -> Self {
        Self {
            domain: crate::normalize::normalize_domain(&domain.into()),
            source_id,
            raw_confidence: raw_confidence.min(100),
            metadata: CandidateMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: CandidateMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Adapter-specific evidence attached to a candidate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMetadata {
    /// Adapter verified the record's phone number against the listing
    #[serde(default)]
    pub phone_match: bool,
    /// Phone number found on the matched listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_phone: Option<String>,
    /// Business name as it appears on the matched listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_name: Option<String>,
    /// Page or result title the candidate was taken from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Outcome of one adapter invocation
///
/// `NotFound` is a first-class non-error outcome; transport and auth
/// failures surface as `AdapterError` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterOutcome {
    /// Adapter proposes a candidate domain
    Found(Candidate),
    /// Adapter has no answer for this record
    NotFound,
}

/// Adapter failure modes
///
/// Any of these is treated by the engine as source unavailability: the
/// adapter simply contributes no candidate for the record.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Network or transport failure reaching the source
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// Source rejected our credentials
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Source responded with something we could not interpret
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        AdapterError::Unavailable(err.to_string())
    }
}

/// Uniform contract implemented by every resolution source
///
/// Adapters never error for "no result" - only for transport/auth
/// failures. The engine wraps each invocation in its configured
/// per-adapter timeout; adapters should also bound their own network
/// calls so a hung upstream cannot pin a worker.
///
/// # Example
/// ```rust,ignore
/// use webmatch_re::types::{AdapterOutcome, Candidate, CompanyRecord, SourceAdapter, SourceId};
///
/// pub struct RegistryAdapter;
///
/// #[async_trait::async_trait]
/// impl SourceAdapter for RegistryAdapter {
///     fn id(&self) -> SourceId { SourceId::WebSearch }
///
///     async fn resolve(&self, record: &CompanyRecord) -> Result<AdapterOutcome, AdapterError> {
///         let listing = query_registry(&record.name).await?;
///         match listing {
///             Some(l) => Ok(AdapterOutcome::Found(Candidate::new(l.website, self.id(), 80))),
///             None => Ok(AdapterOutcome::NotFound),
///         }
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Source identifier used in routing and result attribution
    fn id(&self) -> SourceId;

    /// Attempt to resolve the record to a candidate domain
    ///
    /// # Errors
    /// Returns `AdapterError` only for transport/auth/contract failures;
    /// "no result" is `Ok(AdapterOutcome::NotFound)`.
    async fn resolve(&self, record: &CompanyRecord) -> Result<AdapterOutcome, AdapterError>;
}

// ============================================================================
// Aggregated Evidence
// ============================================================================

/// Candidates for one normalized domain, merged across adapters
///
/// Keeps the maximum raw confidence seen and the full set of contributing
/// sources. Listing names and phone evidence are pooled for the consensus
/// engine's similarity and phone-match rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedCandidate {
    /// Normalized domain shared by the group
    pub domain: String,
    /// Maximum adapter-local confidence seen for this domain
    pub raw_confidence: u8,
    /// Adapters that independently proposed this domain
    pub sources: BTreeSet<SourceId>,
    /// Any contributing adapter verified the record's phone number
    pub phone_match: bool,
    /// Distinct listing names reported by contributing adapters
    pub listing_names: Vec<String>,
}

/// Evidence gathered by directly inspecting a candidate domain's content
///
/// Produced at most once per distinct candidate domain per resolution
/// attempt. An unreachable page yields an empty signal with
/// `reachable = false`, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSignal {
    /// Domain the page was fetched from
    pub domain: String,
    /// Page was reachable and parseable
    pub reachable: bool,
    /// Company-name strings extracted from the page
    pub name_candidates: Vec<String>,
    /// Phone numbers extracted from the page (digits only)
    pub phones: Vec<String>,
    /// Email addresses extracted from the page
    pub emails: Vec<String>,
    /// Best similarity of an extracted name against the input name (0-100)
    pub name_similarity: u8,
    /// Record's phone number appears on the page
    pub phone_match: bool,
}

impl ValidationSignal {
    /// Empty signal for an unreachable domain
    pub fn unreachable(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }

    /// Any contact information (phone or email) was found on the page
    pub fn has_contact_info(&self) -> bool {
        !self.phones.is_empty() || !self.emails.is_empty()
    }
}

// ============================================================================
// Output Types
// ============================================================================

/// Terminal status of a resolution attempt
///
/// These four statuses, together with the confidence bands, are the
/// contract downstream systems rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStatus {
    /// Confidence cleared the resolved threshold; usable without review
    Resolved,
    /// Evidence exists but confidence is below the resolved threshold
    LowConfidence,
    /// No usable candidate
    Unresolved,
    /// Top candidates are too close to call; needs downstream review
    Conflict,
}

impl ResolutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStatus::Resolved => "resolved",
            ResolutionStatus::LowConfidence => "low-confidence",
            ResolutionStatus::Unresolved => "unresolved",
            ResolutionStatus::Conflict => "conflict",
        }
    }
}

impl fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The engine's output for one record
///
/// Created once per input record, immutable after assembly. `domain` is
/// None exactly when the record is unresolved. `confidence` is calibrated
/// and comparable across tiers, unlike adapter-local raw confidences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Winning domain (None means unresolved)
    pub domain: Option<String>,
    /// Calibrated confidence (0-100)
    pub confidence: u8,
    /// Completeness tier the record was classified into
    pub tier: Tier,
    /// Sources that proposed the winning domain
    pub agreeing_sources: BTreeSet<SourceId>,
    /// Validation evidence used, if the validation step ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSignal>,
    /// Terminal status
    pub status: ResolutionStatus,
}

// ============================================================================
// Engine Faults
// ============================================================================

/// Engine-level faults
///
/// Per-adapter and per-record failures are isolated and never surface
/// here; only caller errors and contract violations do.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Record rejected before any adapter was invoked (no name)
    #[error("record rejected: {0}")]
    InvalidRecord(String),

    /// An adapter violated its output contract (e.g. unparseable domain)
    #[error("adapter contract violation: {0}")]
    Contract(String),
}

// ============================================================================
// Tests
// ============================================================================
