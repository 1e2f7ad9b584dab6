//! Candidate aggregation
//!
//! Merges per-adapter candidates into one group per normalized domain so the
//! consensus engine sees each domain exactly once, with the full set of
//! sources that proposed it.

use crate::normalize::normalize_domain;
use crate::types::{Candidate, EngineError, GroupedCandidate};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

/// Group candidates by normalized domain
///
/// Within a group: maximum raw confidence wins, sources are unioned, phone
/// evidence is OR-ed and listing names are pooled without duplicates. With
/// `merge_subdomains` set, a candidate on `shop.example.com` folds into an
/// `example.com` group when some adapter proposed `example.com` itself;
/// otherwise subdomain variants stay distinct.
///
/// # Errors
/// Returns `EngineError::Contract` when a candidate's domain normalizes to
/// the empty string - adapters must not emit such candidates.
pub fn aggregate(
    candidates: Vec<Candidate>,
    merge_subdomains: bool,
) -> Result<Vec<GroupedCandidate>, EngineError> {
    let mut groups: BTreeMap<String, GroupedCandidate> = BTreeMap::new();

    for candidate in candidates {
        // Candidates are normalized at construction; re-normalizing is
        // idempotent and keeps grouping correct for hand-built values.
        let domain = normalize_domain(&candidate.domain);
        if domain.is_empty() {
            return Err(EngineError::Contract(format!(
                "adapter {} proposed unusable domain {:?}",
                candidate.source_id, candidate.domain
            )));
        }

        let group = groups.entry(domain.clone()).or_insert_with(|| GroupedCandidate {
            domain,
            raw_confidence: 0,
            sources: BTreeSet::new(),
            phone_match: false,
            listing_names: Vec::new(),
        });
        group.raw_confidence = group.raw_confidence.max(candidate.raw_confidence);
        group.sources.insert(candidate.source_id);
        group.phone_match |= candidate.metadata.phone_match;
        if let Some(name) = candidate.metadata.listing_name {
            if !group.listing_names.contains(&name) {
                group.listing_names.push(name);
            }
        }
    }

    let groups = if merge_subdomains {
        merge_subdomain_variants(groups)
    } else {
        groups
    };

    Ok(groups.into_values().collect())
}

/// Fold each subdomain group into the shortest proposed parent domain
///
/// Only parents that were themselves proposed count; a lone
/// `blog.example.com` never invents an `example.com` group.
fn merge_subdomain_variants(
    groups: BTreeMap<String, GroupedCandidate>,
) -> BTreeMap<String, GroupedCandidate> {
    let domains: Vec<String> = groups.keys().cloned().collect();
    let mut merged: BTreeMap<String, GroupedCandidate> = BTreeMap::new();

    for (domain, group) in groups {
        let parent = domains
            .iter()
            .filter(|other| domain.ends_with(&format!(".{}", other)))
            .min_by_key(|other| other.len())
            .cloned();

        let target = parent.unwrap_or(domain);
        match merged.entry(target) {
            Entry::Occupied(mut entry) => absorb(entry.get_mut(), group),
            Entry::Vacant(entry) => {
                let domain = entry.key().clone();
                entry.insert(GroupedCandidate { domain, ..group });
            }
        }
    }

    merged
}

fn absorb(into: &mut GroupedCandidate, other: GroupedCandidate) {
    into.raw_confidence = into.raw_confidence.max(other.raw_confidence);
    into.sources.extend(other.sources);
    into.phone_match |= other.phone_match;
    for name in other.listing_names {
        if !into.listing_names.contains(&name) {
            into.listing_names.push(name);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
