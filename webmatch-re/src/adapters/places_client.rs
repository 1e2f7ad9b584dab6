//! Local-business directory API client
//!
//! Google-Places-style API: find-place queries keyed by phone number or
//! free text return place references, and a details call per reference
//! yields the listing's name, website and phone. Both structured lookup
//! adapters share one client so the rate limit covers them jointly.

use crate::types::AdapterError;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;
use webmatch_common::Error;

const BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";

/// Requests per second against the places API
const RATE_LIMIT_PER_SECOND: u32 = 10;

/// Place references examined per text query
const MAX_TEXT_CANDIDATES: usize = 3;

#[derive(Debug, Deserialize)]
struct FindPlaceResponse {
    status: String,
    #[serde(default)]
    candidates: Vec<PlaceRef>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceRef {
    place_id: String,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    result: Option<PlaceDetails>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceDetails {
    name: String,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    formatted_phone_number: Option<String>,
    #[serde(default)]
    international_phone_number: Option<String>,
}

/// One directory listing with enough fields to propose a domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceHit {
    pub name: String,
    pub website: Option<String>,
    pub phone: Option<String>,
}

pub struct PlacesClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl PlacesClient {
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

    /// Find listings indexed under a phone number
    ///
    /// Returns at most one hit: the directory's phone index is unique
    /// per number.
    pub async fn find_by_phone(&self, phone: &str) -> Result<Vec<PlaceHit>, AdapterError> {
        let input = e164(phone);
        let refs = self.find_place(&input, "phonenumber").await?;
        self.resolve_details(refs.into_iter().take(1)).await
    }

    /// Find listings matching a free-text query, typically "name city"
    pub async fn find_by_text(&self, query: &str) -> Result<Vec<PlaceHit>, AdapterError> {
        let refs = self.find_place(query, "textquery").await?;
        self.resolve_details(refs.into_iter().take(MAX_TEXT_CANDIDATES))
            .await
    }

    async fn find_place(
        &self,
        input: &str,
        input_type: &str,
    ) -> Result<Vec<PlaceRef>, AdapterError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/findplacefromtext/json", self.base_url);
        debug!("places find ({}) for {:?}", input_type, input);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("input", input),
                ("inputtype", input_type),
                ("fields", "place_id"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdapterError::Unavailable(format!(
                "places API returned HTTP {}",
                response.status()
            )));
        }

        let parsed: FindPlaceResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        if !ensure_ok(&parsed.status, parsed.error_message.as_deref())? {
            return Ok(Vec::new());
        }
        Ok(parsed.candidates)
    }

    async fn resolve_details(
        &self,
        refs: impl Iterator<Item = PlaceRef>,
    ) -> Result<Vec<PlaceHit>, AdapterError> {
        let mut hits = Vec::new();
        for place_ref in refs {
            if let Some(hit) = self.details(&place_ref.place_id).await? {
                hits.push(hit);
            }
        }
        Ok(hits)
    }

    async fn details(&self, place_id: &str) -> Result<Option<PlaceHit>, AdapterError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/details/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("place_id", place_id),
                ("fields", "name,website,formatted_phone_number,international_phone_number"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdapterError::Unavailable(format!(
                "places API returned HTTP {}",
                response.status()
            )));
        }

        let parsed: DetailsResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))?;

        if !ensure_ok(&parsed.status, parsed.error_message.as_deref())? {
            return Ok(None);
        }

        Ok(parsed.result.map(|details| PlaceHit {
            name: details.name,
            website: details.website,
            phone: details
                .international_phone_number
                .or(details.formatted_phone_number),
        }))
    }
}

/// Map the places status field onto the adapter failure taxonomy
///
/// Ok(true) means results follow; Ok(false) means a clean empty answer.
fn ensure_ok(status: &str, error_message: Option<&str>) -> Result<bool, AdapterError> {
    let detail = || error_message.unwrap_or(status).to_string();
    match status {
        "OK" => Ok(true),
        "ZERO_RESULTS" | "NOT_FOUND" => Ok(false),
        "REQUEST_DENIED" => Err(AdapterError::Auth(detail())),
        "OVER_QUERY_LIMIT" | "UNKNOWN_ERROR" => Err(AdapterError::Unavailable(detail())),
        other => Err(AdapterError::Parse(format!("unexpected status {}", other))),
    }
}

/// Convert bare digits to E.164 as the phone index expects
fn e164(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 10 {
        format!("+1{}", digits)
    } else {
        format!("+{}", digits)
    }
}
