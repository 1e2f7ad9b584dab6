//! Directory-aggregator profile mining
//!
//! Foursquare-style places API. Aggregator profiles often publish the
//! business website and phone even when the open web does not, which
//! makes this a useful consensus partner for sparse records.

use crate::normalize::{name_similarity, phones_match};
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

const BASE_URL: &str = "https://api.foursquare.com/v3/places";

const RATE_LIMIT_PER_SECOND: u32 = 10;

/// Listings requested per search
const RESULTS_PER_QUERY: u32 = 5;

/// Profiles less similar than this are a different business
const MIN_NAME_SIMILARITY: u8 = 55;

/// Name-only profile match ceiling
const MAX_RAW_CONFIDENCE: u8 = 85;

/// Profile whose published phone matches the record
const PHONE_MATCH_CONFIDENCE: u8 = 90;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ListingResult>,
}

#[derive(Debug, Deserialize)]
struct ListingResult {
    name: String,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    tel: Option<String>,
}

/// One aggregator profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    pub name: String,
    pub website: Option<String>,
    pub tel: Option<String>,
}

pub struct DirectoryClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl DirectoryClient {
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

    pub async fn search(
        &self,
        query: &str,
        near: Option<&str>,
    ) -> Result<Vec<DirectoryListing>, AdapterError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/search", self.base_url);
        debug!("directory search for {:?} near {:?}", query, near);

        let limit = RESULTS_PER_QUERY.to_string();
        let mut params = vec![
            ("query", query),
            ("fields", "name,website,tel"),
            ("limit", limit.as_str()),
        ];
        if let Some(near) = near {
            params.push(("near", near));
        }

        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.api_key)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AdapterError::Auth(format!(
                "directory API returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(AdapterError::Unavailable(format!(
                "directory API returned HTTP {}",
                status
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|result| DirectoryListing {
                name: result.name,
                website: result.website,
                tel: result.tel,
            })
            .collect())
    }
}

// ============================================================================
// Adapter
// ============================================================================

pub struct DirectoryMiningAdapter {
    directory: DirectoryClient,
}

impl DirectoryMiningAdapter {
    pub fn new(directory: DirectoryClient) -> Self {
        Self { directory }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for DirectoryMiningAdapter {
    fn id(&self) -> SourceId {
        SourceId::DirectoryMining
    }

    async fn resolve(&self, record: &CompanyRecord) -> Result<AdapterOutcome, AdapterError> {
        let listings = self
            .directory
            .search(&record.name, record.city.as_deref())
            .await?;

        match best_candidate(record, listings) {
            Some(candidate) => Ok(AdapterOutcome::Found(candidate)),
            None => {
                debug!("no usable aggregator profile for {:?}", record.name);
                Ok(AdapterOutcome::NotFound)
            }
        }
    }
}

fn best_candidate(record: &CompanyRecord, listings: Vec<DirectoryListing>) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for listing in listings {
        let Some(candidate) = scored_candidate(record, listing) else {
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

fn scored_candidate(record: &CompanyRecord, listing: DirectoryListing) -> Option<Candidate> {
    let website = listing.website?;
    let similarity = name_similarity(&record.name, &listing.name);
    if similarity < MIN_NAME_SIMILARITY {
        return None;
    }

    let phone_match = match (&record.phone, &listing.tel) {
        (Some(record_phone), Some(listing_phone)) => phones_match(record_phone, listing_phone),
        _ => false,
    };

    let raw = if phone_match {
        PHONE_MATCH_CONFIDENCE
    } else {
        similarity.min(MAX_RAW_CONFIDENCE)
    };

    Some(
        Candidate::new(&website, SourceId::DirectoryMining, raw).with_metadata(
            CandidateMetadata {
                phone_match,
                matched_phone: listing.tel,
                listing_name: Some(listing.name),
                title: None,
            },
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CompanyRecord {
        CompanyRecord {
            name: "Joe's Plumbing".to_string(),
            city: Some("Denver".to_string()),
            phone: Some("3035551234".to_string()),
            context: None,
        }
    }

    fn listing(name: &str, website: Option<&str>, tel: Option<&str>) -> DirectoryListing {
        DirectoryListing {
            name: name.to_string(),
            website: website.map(String::from),
            tel: tel.map(String::from),
        }
    }

    #[test]
    fn test_profile_with_matching_phone_outranks_name_only() {
        let candidate = best_candidate(
            &record(),
            vec![
                listing("Joe's Plumbing", Some("joes-plumbing-blog.com"), None),
                listing(
                    "Joe's Plumbing",
                    Some("https://joesplumbing.com"),
                    Some("+1 303-555-1234"),
                ),
            ],
        )
        .expect("candidate");

        assert_eq!(candidate.domain, "joesplumbing.com");
        assert_eq!(candidate.raw_confidence, PHONE_MATCH_CONFIDENCE);
        assert!(candidate.metadata.phone_match);
    }

    #[test]
    fn test_name_only_profile_is_capped() {
        let candidate = scored_candidate(
            &record(),
            listing("Joe's Plumbing", Some("joesplumbing.com"), None),
        )
        .expect("candidate");

        assert_eq!(candidate.raw_confidence, MAX_RAW_CONFIDENCE);
        assert!(!candidate.metadata.phone_match);
    }

    #[test]
    fn test_dissimilar_profile_is_dropped() {
        assert!(scored_candidate(
            &record(),
            listing("Mountain View Dental", Some("mountainviewdental.com"), None),
        )
        .is_none());
    }

    #[test]
    fn test_profile_without_website_is_dropped() {
        assert!(scored_candidate(
            &record(),
            listing("Joe's Plumbing", None, Some("+1 303-555-1234")),
        )
        .is_none());
    }

    #[test]
    fn test_search_response_tolerates_missing_fields() {
        let raw = r#"{"results": [{"name": "Joe's Plumbing"}, {"name": "Other", "website": "https://other.com", "tel": "+1 303-555-0000"}]}"#;
        let parsed: SearchResponse = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.results.len(), 2);
        assert!(parsed.results[0].website.is_none());
        assert_eq!(parsed.results[1].tel.as_deref(), Some("+1 303-555-0000"));
    }
}
