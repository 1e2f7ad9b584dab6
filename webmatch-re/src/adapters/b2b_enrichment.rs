//! B2B enrichment source
//!
//! Clearbit-style name-to-domain endpoint. Strong for registered
//! companies with a web presence, blind to small local businesses, so
//! its ceiling sits below the structured directory sources.

use crate::normalize::name_similarity;
use crate::types::{
    AdapterError, AdapterOutcome, Candidate, CandidateMetadata, CompanyRecord, SourceAdapter,
    SourceId,
};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;
use webmatch_common::Error;

const BASE_URL: &str = "https://company.clearbit.com/v1/domains";

const RATE_LIMIT_PER_SECOND: u32 = 5;

/// Matches less similar than this are a name collision
const MIN_NAME_SIMILARITY: u8 = 55;

/// Enrichment data lags reality; never treat it as near-certain
const MAX_RAW_CONFIDENCE: u8 = 80;

#[derive(Debug, Deserialize)]
struct DomainResponse {
    name: String,
    domain: String,
}

/// One enrichment match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentMatch {
    pub name: String,
    pub domain: String,
}

pub struct EnrichmentClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl EnrichmentClient {
    pub fn new(api_key: String) -> webmatch_common::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client build failed: {}", e)))?;

        // Safe: constant is non-zero
        let quota = Quota::per_second(NonZeroU32::new(RATE_LIMIT_PER_SECOND).unwrap());

        Ok(Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    pub async fn find_domain(&self, name: &str) -> Result<Option<EnrichmentMatch>, AdapterError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/find", self.base_url);
        debug!("enrichment lookup for {:?}", name);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("name", name)])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND
            || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            return Ok(None);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AdapterError::Auth(format!(
                "enrichment API returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(AdapterError::Unavailable(format!(
                "enrichment API returned HTTP {}",
                status
            )));
        }

        let parsed: DomainResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        Ok(Some(EnrichmentMatch {
            name: parsed.name,
            domain: parsed.domain,
        }))
    }
}

// ============================================================================
// Adapter
// ============================================================================

pub struct B2bEnrichmentAdapter {
    enrichment: EnrichmentClient,
}

impl B2bEnrichmentAdapter {
    pub fn new(enrichment: EnrichmentClient) -> Self {
        Self { enrichment }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for B2bEnrichmentAdapter {
    fn id(&self) -> SourceId {
        SourceId::B2bEnrichment
    }

    async fn resolve(&self, record: &CompanyRecord) -> Result<AdapterOutcome, AdapterError> {
        let Some(hit) = self.enrichment.find_domain(&record.name).await? else {
            return Ok(AdapterOutcome::NotFound);
        };

        match scored_candidate(record, hit) {
            Some(candidate) => Ok(AdapterOutcome::Found(candidate)),
            None => {
                debug!("enrichment match too dissimilar for {:?}", record.name);
                Ok(AdapterOutcome::NotFound)
            }
        }
    }
}

fn scored_candidate(record: &CompanyRecord, hit: EnrichmentMatch) -> Option<Candidate> {
    let similarity = name_similarity(&record.name, &hit.name);
    if similarity < MIN_NAME_SIMILARITY {
        return None;
    }

    Some(
        Candidate::new(
            &hit.domain,
            SourceId::B2bEnrichment,
            similarity.min(MAX_RAW_CONFIDENCE),
        )
        .with_metadata(CandidateMetadata {
            listing_name: Some(hit.name),
            ..Default::default()
        }),
    )
}
