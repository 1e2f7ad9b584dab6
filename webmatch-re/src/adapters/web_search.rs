//! Web search source
//!
//! Serper-style search API. Organic results are filtered against known
//! directory and social aggregators, then scored by how much of the
//! company name survives in the result title and the domain label. The
//! scorer is shared with the free-text query-generation source.

use crate::normalize::{name_tokens, normalize_domain};
use crate::types::{
    AdapterError, AdapterOutcome, Candidate, CandidateMetadata, CompanyRecord, SourceAdapter,
    SourceId,
};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use webmatch_common::Error;

const BASE_URL: &str = "https://google.serper.dev";

const RATE_LIMIT_PER_SECOND: u32 = 10;

/// Organic results requested per query
const RESULTS_PER_QUERY: u32 = 10;

/// Free-text context words carried into the query
const MAX_CONTEXT_WORDS: usize = 8;

/// Domains that host listings about businesses rather than businesses
const AGGREGATOR_DOMAINS: &[&str] = &[
    "yelp.com",
    "facebook.com",
    "instagram.com",
    "linkedin.com",
    "twitter.com",
    "x.com",
    "youtube.com",
    "yellowpages.com",
    "bbb.org",
    "mapquest.com",
    "foursquare.com",
    "tripadvisor.com",
    "angi.com",
    "angieslist.com",
    "thumbtack.com",
    "houzz.com",
    "homeadvisor.com",
    "porch.com",
    "nextdoor.com",
    "groupon.com",
    "indeed.com",
    "glassdoor.com",
    "crunchbase.com",
    "zoominfo.com",
    "dnb.com",
    "manta.com",
    "chamberofcommerce.com",
    "wikipedia.org",
    "amazon.com",
    "etsy.com",
    "ebay.com",
    "google.com",
    "bing.com",
];

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    title: String,
    link: String,
}

/// One organic search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
}

pub struct SearchClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl SearchClient {
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

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>, AdapterError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/search", self.base_url);
        debug!("web search for {:?}", query);

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(&SearchRequest {
                q: query,
                num: RESULTS_PER_QUERY,
            })
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AdapterError::Auth(format!("search API returned {}", status)));
        }
        if !status.is_success() {
            return Err(AdapterError::Unavailable(format!(
                "search API returned HTTP {}",
                status
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        Ok(parsed
            .organic
            .into_iter()
            .map(|result| SearchHit {
                title: result.title,
                link: result.link,
            })
            .collect())
    }
}

// ============================================================================
// Result Scoring
// ============================================================================

fn is_aggregator(domain: &str) -> bool {
    AGGREGATOR_DOMAINS
        .iter()
        .any(|agg| domain == *agg || domain.ends_with(&format!(".{}", agg)))
}

/// Score one search result against the record
///
/// None when the result is an aggregator page or shares no name token
/// with the record.
pub(crate) fn candidate_from_hit(
    record: &CompanyRecord,
    hit: &SearchHit,
    source: SourceId,
) -> Option<Candidate> {
    let domain = normalize_domain(&hit.link);
    if domain.is_empty() || is_aggregator(&domain) {
        return None;
    }

    let tokens = name_tokens(&record.name);
    if tokens.is_empty() {
        return None;
    }

    let label = domain.split('.').next().unwrap_or_default();
    let title_tokens = name_tokens(&hit.title);

    let matched = tokens
        .iter()
        .filter(|token| title_tokens.contains(token) || label.contains(token.as_str()))
        .count();
    if matched == 0 {
        return None;
    }

    let ratio = matched as f64 / tokens.len() as f64;
    let mut raw = (35.0 + 45.0 * ratio).round() as u8;

    // A domain label that is exactly the concatenated name is the
    // strongest open-web signal we accept without validation.
    let joined = tokens.concat();
    if label == joined || label.replace('-', "") == joined {
        raw = raw.saturating_add(10).min(90);
    }

    Some(
        Candidate::new(&domain, source, raw).with_metadata(CandidateMetadata {
            title: Some(hit.title.clone()),
            ..Default::default()
        }),
    )
}

/// Best-scoring usable result, earliest position winning ties
pub(crate) fn best_candidate(
    record: &CompanyRecord,
    hits: &[SearchHit],
    source: SourceId,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for hit in hits {
        let Some(candidate) = candidate_from_hit(record, hit, source) else {
            continue;
        };
        let beats = best
            .as_ref()
            .map(|current| candidate.raw_confidence > current.raw_confidence)
            .unwrap_or(true);
        if beats {
            best = Some(candidate);
        }
    }
    best
}

pub(crate) fn build_query(record: &CompanyRecord) -> String {
    let mut query = format!("\"{}\"", record.name);
    if let Some(city) = &record.city {
        query.push(' ');
        query.push_str(city);
    }
    if let Some(context) = &record.context {
        let words: Vec<&str> = context.split_whitespace().take(MAX_CONTEXT_WORDS).collect();
        if !words.is_empty() {
            query.push(' ');
            query.push_str(&words.join(" "));
        }
    }
    query
}

// ============================================================================
// Adapter
// ============================================================================

pub struct WebSearchAdapter {
    search: Arc<SearchClient>,
}

impl WebSearchAdapter {
    pub fn new(search: Arc<SearchClient>) -> Self {
        Self { search }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for WebSearchAdapter {
    fn id(&self) -> SourceId {
        SourceId::WebSearch
    }

    async fn resolve(&self, record: &CompanyRecord) -> Result<AdapterOutcome, AdapterError> {
        let query = build_query(record);
        let hits = self.search.search(&query).await?;

        match best_candidate(record, &hits, SourceId::WebSearch) {
            Some(candidate) => Ok(AdapterOutcome::Found(candidate)),
            None => {
                debug!("no usable organic result for {:?}", record.name);
                Ok(AdapterOutcome::NotFound)
            }
        }
    }
}
