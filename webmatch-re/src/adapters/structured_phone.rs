//! Structured lookup keyed by phone number
//!
//! The strongest single source: a directory listing retrieved through
//! the phone index already agrees with the record on its most
//! distinctive field.

use crate::adapters::places_client::{PlaceHit, PlacesClient};
use crate::normalize::phones_match;
use crate::types::{
    AdapterError, AdapterOutcome, Candidate, CandidateMetadata, CompanyRecord, SourceAdapter,
    SourceId,
};
use std::sync::Arc;
use tracing::debug;

/// Raw confidence for a phone-verified listing with a website
const PHONE_VERIFIED_CONFIDENCE: u8 = 95;

/// Raw confidence when the listing's published phone disagrees
const PHONE_UNVERIFIED_CONFIDENCE: u8 = 70;

pub struct StructuredPhoneAdapter {
    places: Arc<PlacesClient>,
}

impl StructuredPhoneAdapter {
    pub fn new(places: Arc<PlacesClient>) -> Self {
        Self { places }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for StructuredPhoneAdapter {
    fn id(&self) -> SourceId {
        SourceId::StructuredLookupWithPhone
    }

    async fn resolve(&self, record: &CompanyRecord) -> Result<AdapterOutcome, AdapterError> {
        let Some(phone) = &record.phone else {
            return Ok(AdapterOutcome::NotFound);
        };

        let hits = self.places.find_by_phone(phone).await?;
        match hits.into_iter().find_map(|hit| candidate_from_hit(phone, hit)) {
            Some(candidate) => Ok(AdapterOutcome::Found(candidate)),
            None => {
                debug!("no phone-indexed listing with a website for {:?}", record.name);
                Ok(AdapterOutcome::NotFound)
            }
        }
    }
}

/// Map a phone-indexed listing onto a candidate
///
/// The lookup itself was keyed by the record's phone, so a listing
/// without a published number still counts as phone-verified; only an
/// explicitly different number downgrades the hit.
fn candidate_from_hit(record_phone: &str, hit: PlaceHit) -> Option<Candidate> {
    let website = hit.website?;
    let verified = hit
        .phone
        .as_deref()
        .map(|listing_phone| phones_match(record_phone, listing_phone))
        .unwrap_or(true);

    let raw = if verified {
        PHONE_VERIFIED_CONFIDENCE
    } else {
        PHONE_UNVERIFIED_CONFIDENCE
    };

    Some(
        Candidate::new(&website, SourceId::StructuredLookupWithPhone, raw).with_metadata(
            CandidateMetadata {
                phone_match: verified,
                matched_phone: hit.phone,
                listing_name: Some(hit.name),
                title: None,
            },
        ),
    )
}
