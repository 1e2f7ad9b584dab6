//! Resolution source adapters
//!
//! Each adapter wraps one external evidence source behind the
//! `SourceAdapter` contract. The registry holds the adapters whose API
//! keys resolved at startup; execution plans name sources by `SourceId`
//! and the executor skips any source the registry does not hold.

pub mod b2b_enrichment;
pub mod directory_mining;
pub mod places_client;
pub mod query_expansion;
pub mod structured_name;
pub mod structured_phone;
pub mod web_search;

use crate::config::AdapterKeys;
use crate::types::{SourceAdapter, SourceId};
use crate::validation::judgment::JudgmentClient;
use b2b_enrichment::{B2bEnrichmentAdapter, EnrichmentClient};
use directory_mining::{DirectoryClient, DirectoryMiningAdapter};
use places_client::PlacesClient;
use query_expansion::QueryExpansionAdapter;
use std::collections::BTreeMap;
use std::sync::Arc;
use structured_name::StructuredNameAdapter;
use structured_phone::StructuredPhoneAdapter;
use tracing::{info, warn};
use web_search::{SearchClient, WebSearchAdapter};

/// Holds the resolution sources that are configured and usable
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<SourceId, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own source id
    pub fn insert(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.id(), adapter);
    }

    pub fn get(&self, id: SourceId) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&id).cloned()
    }

    /// Source ids with a registered adapter, in stable order
    pub fn available(&self) -> Vec<SourceId> {
        self.adapters.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Build the registry from resolved API keys
    ///
    /// Sources whose key is missing are skipped with a warning; the
    /// engine later treats them as absent evidence. The judgment client
    /// is shared with the consensus layer and only powers the free-text
    /// query-generation source here.
    pub fn from_config(
        keys: &AdapterKeys,
        judgment: Option<Arc<JudgmentClient>>,
    ) -> webmatch_common::Result<Self> {
        let mut registry = Self::new();

        match &keys.places {
            Some(key) => {
                let places = Arc::new(PlacesClient::new(key.clone())?);
                registry.insert(Arc::new(StructuredPhoneAdapter::new(places.clone())));
                registry.insert(Arc::new(StructuredNameAdapter::new(places)));
            }
            None => warn!("places_api_key not configured - structured lookups disabled"),
        }

        let search_client = match &keys.search {
            Some(key) => {
                let search = Arc::new(SearchClient::new(key.clone())?);
                registry.insert(Arc::new(WebSearchAdapter::new(search.clone())));
                Some(search)
            }
            None => {
                warn!("search_api_key not configured - web search disabled");
                None
            }
        };

        match &keys.directory {
            Some(key) => {
                let directory = DirectoryClient::new(key.clone())?;
                registry.insert(Arc::new(DirectoryMiningAdapter::new(directory)));
            }
            None => warn!("directory_api_key not configured - directory mining disabled"),
        }

        match &keys.enrichment {
            Some(key) => {
                let enrichment = EnrichmentClient::new(key.clone())?;
                registry.insert(Arc::new(B2bEnrichmentAdapter::new(enrichment)));
            }
            None => warn!("enrichment_api_key not configured - B2B enrichment disabled"),
        }

        match (judgment, search_client) {
            (Some(judgment), Some(search)) => {
                registry.insert(Arc::new(QueryExpansionAdapter::new(judgment, search)));
            }
            (None, _) => {
                warn!("llm_api_key not configured - free-text query generation disabled")
            }
            // Search warning already issued above
            (_, None) => {}
        }

        info!(
            "{} resolution sources available: {:?}",
            registry.len(),
            registry.available()
        );
        Ok(registry)
    }
}

// ============================================================================
// Test Doubles
// ============================================================================
