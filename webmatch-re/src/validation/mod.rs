//! Candidate validation
//!
//! Direct inspection of a candidate domain: fetch its homepage, extract
//! company names and contact information, and score them against the input
//! record. The probabilistic judgment collaborator lives in [`judgment`].

pub mod judgment;
pub mod page_probe;

pub use page_probe::PageProbe;

use crate::normalize::{name_similarity, phones_match};
use crate::types::{CompanyRecord, ValidationSignal};
use std::time::Duration;

/// Extracted homepage content, before scoring against a record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    pub reachable: bool,
    pub name_candidates: Vec<String>,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
}

/// Fetches and extracts content for a domain's homepage
///
/// Infallible by contract: unreachable or unparseable pages yield a
/// `PageContent` with `reachable = false`, never an error.
#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, domain: &str, timeout: Duration) -> PageContent;
}

/// Fetch a domain and score the extracted content against the record
pub async fn collect_signal(
    fetcher: &dyn ContentFetcher,
    record: &CompanyRecord,
    domain: &str,
    timeout: Duration,
) -> ValidationSignal {
    let content = fetcher.fetch(domain, timeout).await;
    signal_from_content(record, domain, content)
}

/// Score page content against the record's name and phone number
pub fn signal_from_content(
    record: &CompanyRecord,
    domain: &str,
    content: PageContent,
) -> ValidationSignal {
    if !content.reachable {
        return ValidationSignal::unreachable(domain);
    }

    let name_similarity = content
        .name_candidates
        .iter()
        .map(|candidate| name_similarity(&record.name, candidate))
        .max()
        .unwrap_or(0);

    let phone_match = record.phone.as_deref().map_or(false, |record_phone| {
        content
            .phones
            .iter()
            .any(|page_phone| phones_match(record_phone, page_phone))
    });

    ValidationSignal {
        domain: domain.to_string(),
        reachable: true,
        name_candidates: content.name_candidates,
        phones: content.phones,
        emails: content.emails,
        name_similarity,
        phone_match,
    }
}

// ============================================================================
// Test Doubles
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::{ContentFetcher, PageContent};
    use crate::types::{CompanyRecord, ValidationSignal};
    use crate::validation::judgment::{JudgmentError, JudgmentEstimate, JudgmentScorer};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves canned page content per domain; unknown domains are
    /// unreachable
    pub struct MockFetcher {
        pages: HashMap<String, PageContent>,
        fetches: AtomicUsize,
    }

    impl MockFetcher {
        pub fn unreachable() -> Self {
            Self {
                pages: HashMap::new(),
                fetches: AtomicUsize::new(0),
            }
        }

        pub fn serving(domain: &str, content: PageContent) -> Self {
            let mut pages = HashMap::new();
            pages.insert(domain.to_string(), content);
            Self {
                pages,
                fetches: AtomicUsize::new(0),
            }
        }

        pub fn also_serving(mut self, domain: &str, content: PageContent) -> Self {
            self.pages.insert(domain.to_string(), content);
            self
        }

        pub fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ContentFetcher for MockFetcher {
        async fn fetch(&self, domain: &str, _timeout: Duration) -> PageContent {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.pages.get(domain).cloned().unwrap_or_default()
        }
    }

    /// Scripted judgment outcomes with a call counter
    pub struct MockJudge {
        outcome: Result<JudgmentEstimate, String>,
        calls: AtomicUsize,
    }

    impl MockJudge {
        pub fn scoring(confidence: u8, rationale: &str) -> Self {
            Self {
                outcome: Ok(JudgmentEstimate {
                    confidence,
                    rationale: rationale.to_string(),
                }),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                outcome: Err(message.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl JudgmentScorer for MockJudge {
        async fn assess(
            &self,
            _record: &CompanyRecord,
            _domain: &str,
            _signal: &ValidationSignal,
        ) -> Result<JudgmentEstimate, JudgmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                Ok(estimate) => Ok(estimate.clone()),
                Err(message) => Err(JudgmentError::Unavailable(message.clone())),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

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

    #[test]
    fn test_unreachable_content_yields_empty_signal() {
        let signal = signal_from_content(&record(), "example.com", PageContent::default());
        assert_eq!(signal, ValidationSignal::unreachable("example.com"));
        assert!(!signal.reachable);
        assert_eq!(signal.name_similarity, 0);
    }

    #[test]
    fn test_best_name_candidate_wins() {
        let content = PageContent {
            reachable: true,
            name_candidates: vec![
                "Plumbing Services".to_string(),
                "Joe's Plumbing".to_string(),
            ],
            phones: Vec::new(),
            emails: Vec::new(),
        };

        let signal = signal_from_content(&record(), "joesplumbing.com", content);
        assert_eq!(signal.name_similarity, 100);
    }

    #[test]
    fn test_phone_match_tolerates_formatting_and_country_code() {
        let content = PageContent {
            reachable: true,
            name_candidates: Vec::new(),
            phones: vec!["+1 (303) 555-1234".to_string()],
            emails: Vec::new(),
        };

        let signal = signal_from_content(&record(), "joesplumbing.com", content);
        assert!(signal.phone_match);
    }

    #[test]
    fn test_no_record_phone_means_no_phone_match() {
        let content = PageContent {
            reachable: true,
            name_candidates: Vec::new(),
            phones: vec!["3035551234".to_string()],
            emails: Vec::new(),
        };

        let signal = signal_from_content(
            &CompanyRecord::named("Joe's Plumbing"),
            "joesplumbing.com",
            content,
        );
        assert!(!signal.phone_match);
        assert!(signal.has_contact_info());
    }
}
