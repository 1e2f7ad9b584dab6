//! Free-text query generation source
//!
//! For records whose strongest field beyond the name is unstructured
//! context, the LLM writes up to three targeted search queries and the
//! results run through the same scorer as plain web search. Distinct
//! from `WebSearch` on purpose: different queries surface different
//! corners of the index, and consensus treats the two as independent.

use crate::adapters::web_search::{best_candidate, SearchClient, SearchHit};
use crate::types::{
    AdapterError, AdapterOutcome, Candidate, CompanyRecord, SourceAdapter, SourceId,
};
use crate::validation::judgment::{JudgmentClient, JudgmentError};
use std::sync::Arc;
use tracing::{debug, warn};

/// Writes search queries from a record's free text
#[async_trait::async_trait]
pub trait QueryWriter: Send + Sync {
    async fn generate_queries(&self, record: &CompanyRecord) -> Result<Vec<String>, JudgmentError>;
}

#[async_trait::async_trait]
impl QueryWriter for JudgmentClient {
    async fn generate_queries(&self, record: &CompanyRecord) -> Result<Vec<String>, JudgmentError> {
        JudgmentClient::generate_queries(self, record).await
    }
}

/// Runs one search query and returns the organic hits
#[async_trait::async_trait]
pub trait QuerySearcher: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, AdapterError>;
}

#[async_trait::async_trait]
impl QuerySearcher for SearchClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, AdapterError> {
        SearchClient::search(self, query).await
    }
}

pub struct QueryExpansionAdapter {
    writer: Arc<dyn QueryWriter>,
    searcher: Arc<dyn QuerySearcher>,
}

impl QueryExpansionAdapter {
    pub fn new(writer: Arc<dyn QueryWriter>, searcher: Arc<dyn QuerySearcher>) -> Self {
        Self { writer, searcher }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for QueryExpansionAdapter {
    fn id(&self) -> SourceId {
        SourceId::FreeTextQueryGeneration
    }

    async fn resolve(&self, record: &CompanyRecord) -> Result<AdapterOutcome, AdapterError> {
        let queries = self
            .writer
            .generate_queries(record)
            .await
            .map_err(|e| AdapterError::Unavailable(e.to_string()))?;
        debug!("generated {} queries for {:?}", queries.len(), record.name);

        let mut best: Option<Candidate> = None;
        for query in &queries {
            let hits = match self.searcher.search(query).await {
                Ok(hits) => hits,
                // Keep what earlier queries found instead of discarding it
                Err(err) if best.is_some() => {
                    warn!("query {:?} failed mid-expansion: {}", query, err);
                    break;
                }
                Err(err) => return Err(err),
            };

            if let Some(candidate) =
                best_candidate(record, &hits, SourceId::FreeTextQueryGeneration)
            {
                let beats = best
                    .as_ref()
                    .map(|current| candidate.raw_confidence > current.raw_confidence)
                    .unwrap_or(true);
                if beats {
                    best = Some(candidate);
                }
            }
        }

        match best {
            Some(candidate) => Ok(AdapterOutcome::Found(candidate)),
            None => Ok(AdapterOutcome::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedQueries(Vec<&'static str>);

    #[async_trait::async_trait]
    impl QueryWriter for FixedQueries {
        async fn generate_queries(
            &self,
            _record: &CompanyRecord,
        ) -> Result<Vec<String>, JudgmentError> {
            Ok(self.0.iter().map(|q| q.to_string()).collect())
        }
    }

    struct FailingWriter;

    #[async_trait::async_trait]
    impl QueryWriter for FailingWriter {
        async fn generate_queries(
            &self,
            _record: &CompanyRecord,
        ) -> Result<Vec<String>, JudgmentError> {
            Err(JudgmentError::Unavailable("quota exhausted".to_string()))
        }
    }

    /// Scripted searcher answering queries in submission order
    struct ScriptedSearch {
        responses: Mutex<Vec<Result<Vec<SearchHit>, AdapterError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSearch {
        fn new(responses: Vec<Result<Vec<SearchHit>, AdapterError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl QuerySearcher for ScriptedSearch {
        async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            assert!(!responses.is_empty(), "searched past the script");
            responses.remove(0)
        }
    }

    fn record() -> CompanyRecord {
        CompanyRecord {
            name: "Joe's Plumbing".to_string(),
            city: Some("Denver".to_string()),
            phone: None,
            context: Some("residential plumbing".to_string()),
        }
    }

    fn hit(title: &str, link: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            link: link.to_string(),
        }
    }

    fn adapter(
        writer: impl QueryWriter + 'static,
        searcher: Arc<ScriptedSearch>,
    ) -> QueryExpansionAdapter {
        QueryExpansionAdapter::new(Arc::new(writer), searcher)
    }

    #[tokio::test]
    async fn test_best_candidate_across_queries_wins() {
        // First query finds a partial-overlap site, second the exact one
        let searcher = Arc::new(ScriptedSearch::new(vec![
            Ok(vec![hit("Plumbing services in Denver", "https://denverpipes.com")]),
            Ok(vec![hit("Joe's Plumbing | Denver CO", "https://joesplumbing.com")]),
        ]));
        let adapter = adapter(FixedQueries(vec!["plumber denver", "joe's plumbing"]), searcher.clone());

        let outcome = adapter.resolve(&record()).await.expect("resolve");

        let AdapterOutcome::Found(candidate) = outcome else {
            panic!("expected a candidate");
        };
        assert_eq!(candidate.domain, "joesplumbing.com");
        assert_eq!(candidate.raw_confidence, 90);
        assert_eq!(candidate.source_id, SourceId::FreeTextQueryGeneration);
        assert_eq!(searcher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_search_error_after_a_find_keeps_the_earlier_best() {
        let searcher = Arc::new(ScriptedSearch::new(vec![
            Ok(vec![hit("Joe's Plumbing | Denver CO", "https://joesplumbing.com")]),
            Err(AdapterError::Unavailable("HTTP 503".to_string())),
            // Never reached: the loop stops at the failed query
            Ok(vec![hit("Joe's Plumbing reviews", "https://plumbing-reviews.net")]),
        ]));
        let adapter = adapter(
            FixedQueries(vec!["joe's plumbing", "plumber denver", "joesplumbing.com"]),
            searcher.clone(),
        );

        let outcome = adapter.resolve(&record()).await.expect("resolve");

        let AdapterOutcome::Found(candidate) = outcome else {
            panic!("expected the pre-failure candidate");
        };
        assert_eq!(candidate.domain, "joesplumbing.com");
        assert_eq!(searcher.call_count(), 2, "third query skipped after failure");
    }

    #[tokio::test]
    async fn test_search_error_with_nothing_found_yet_propagates() {
        let searcher = Arc::new(ScriptedSearch::new(vec![Err(AdapterError::Auth(
            "HTTP 401".to_string(),
        ))]));
        let adapter = adapter(FixedQueries(vec!["joe's plumbing"]), searcher);

        let err = adapter.resolve(&record()).await.unwrap_err();

        assert!(matches!(err, AdapterError::Auth(_)));
    }

    #[tokio::test]
    async fn test_query_generation_failure_is_unavailable() {
        let searcher = Arc::new(ScriptedSearch::new(vec![]));
        let adapter = adapter(FailingWriter, searcher.clone());

        let err = adapter.resolve(&record()).await.unwrap_err();

        assert!(matches!(err, AdapterError::Unavailable(_)));
        assert_eq!(searcher.call_count(), 0, "no search without queries");
    }

    #[tokio::test]
    async fn test_no_usable_hits_is_not_found() {
        // Aggregator-only results score to nothing across both queries
        let searcher = Arc::new(ScriptedSearch::new(vec![
            Ok(vec![hit("Joe's Plumbing - Yelp", "https://www.yelp.com/biz/joes-plumbing")]),
            Ok(vec![]),
        ]));
        let adapter = adapter(FixedQueries(vec!["joe's plumbing", "plumber denver"]), searcher);

        let outcome = adapter.resolve(&record()).await.expect("resolve");

        assert!(matches!(outcome, AdapterOutcome::NotFound));
    }
}
