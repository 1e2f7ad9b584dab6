//! Structured lookup by name and city
//!
//! Text search against the local-business directory. Weaker than the
//! phone index: several businesses can share a name, so hits carry the
//! listing-name similarity as their raw confidence and lean on
//! consensus or validation for the rest.

use crate::adapters::places_client::{PlaceHit, PlacesClient};
use crate::normalize::{name_similarity, phones_match};
use crate::types::{
    AdapterError, AdapterOutcome, Candidate, CandidateMetadata, CompanyRecord, SourceAdapter,
    SourceId,
};
use std::sync::Arc;
use tracing::debug;

/// Listings less similar than this are a different business
const MIN_NAME_SIMILARITY: u8 = 55;

/// Text search alone never outranks a phone-verified hit
const MAX_RAW_CONFIDENCE: u8 = 90;

pub struct StructuredNameAdapter {
    places: Arc<PlacesClient>,
}

impl StructuredNameAdapter {
    pub fn new(places: Arc<PlacesClient>) -> Self {
        Self { places }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for StructuredNameAdapter {
    fn id(&self) -> SourceId {
        SourceId::StructuredLookupByName
    }

    async fn resolve(&self, record: &CompanyRecord) -> Result<AdapterOutcome, AdapterError> {
        let Some(city) = &record.city else {
            return Ok(AdapterOutcome::NotFound);
        };

        let query = format!("{} {}", record.name, city);
        let hits = self.places.find_by_text(&query).await?;

        match best_candidate(record, hits) {
            Some(candidate) => Ok(AdapterOutcome::Found(candidate)),
            None => {
                debug!("no usable text-search listing for {:?}", record.name);
                Ok(AdapterOutcome::NotFound)
            }
        }
    }
}

/// Pick the most similar listing that has a website
fn best_candidate(record: &CompanyRecord, hits: Vec<PlaceHit>) -> Option<Candidate> {
    hits.into_iter()
        .filter_map(|hit| scored_candidate(record, hit))
        .max_by_key(|candidate| candidate.raw_confidence)
}

fn scored_candidate(record: &CompanyRecord, hit: PlaceHit) -> Option<Candidate> {
    let website = hit.website?;
    let similarity = name_similarity(&record.name, &hit.name);
    if similarity < MIN_NAME_SIMILARITY {
        return None;
    }

    let phone_match = match (&record.phone, &hit.phone) {
        (Some(record_phone), Some(listing_phone)) => phones_match(record_phone, listing_phone),
        _ => false,
    };

    Some(
        Candidate::new(
            &website,
            SourceId::StructuredLookupByName,
            similarity.min(MAX_RAW_CONFIDENCE),
        )
        .with_metadata(CandidateMetadata {
            phone_match,
            matched_phone: hit.phone,
            listing_name: Some(hit.name),
            title: None,
        }),
    )
}
