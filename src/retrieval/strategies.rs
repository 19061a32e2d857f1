//! Base retrieval strategies over the segment store
//!
//! Three independent primitives: similarity, MMR, and metadata-filtered
//! search. None of them rerank or deduplicate; that is the smart
//! retriever's job.

use crate::config::RetrievalConfig;
use crate::models::Segment;
use crate::retrieval::store::{MetadataFilter, SegmentStore};
use crate::Result;
use std::sync::Arc;

pub struct RetrievalStrategies {
    store: Arc<dyn SegmentStore>,
    config: RetrievalConfig,
}

impl RetrievalStrategies {
    pub fn new(store: Arc<dyn SegmentStore>, config: RetrievalConfig) -> Self {
        Self { store, config }
    }

    /// Standard similarity search; `k` falls back to the configured default.
    pub async fn search_similarity(
        &self,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<Segment>> {
        let k = k.unwrap_or(self.config.similarity_k);
        self.store.similarity_search(query, k).await
    }

    /// MMR search with a candidate pool wider than k.
    pub async fn search_mmr(&self, query: &str) -> Result<Vec<Segment>> {
        let k = self.config.similarity_k;
        let fetch_k = k * self.config.mmr_fetch_multiplier;
        self.store
            .mmr_search(query, k, fetch_k, self.config.mmr_lambda)
            .await
    }

    /// Similarity search restricted by a metadata predicate.
    pub async fn search_with_filter(
        &self,
        query: &str,
        filter: MetadataFilter,
    ) -> Result<Vec<Segment>> {
        self.store
            .filtered_search(query, &filter, self.config.filtered_k)
            .await
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SegmentType;
    use crate::retrieval::store::InMemorySegmentStore;

    #[tokio::test]
    async fn test_strategies_apply_configured_k() {
        let store = InMemorySegmentStore::default();
        for i in 0..8 {
            store
                .insert(Segment::new(
                    format!("market outlook note {}", i),
                    SegmentType::Section,
                    vec![],
                    None,
                ))
                .await;
        }

        let config = RetrievalConfig {
            similarity_k: 4,
            ..RetrievalConfig::default()
        };
        let strategies = RetrievalStrategies::new(Arc::new(store), config);

        let results = strategies
            .search_similarity("market outlook", None)
            .await
            .unwrap();
        assert_eq!(results.len(), 4);

        let wider = strategies
            .search_similarity("market outlook", Some(6))
            .await
            .unwrap();
        assert_eq!(wider.len(), 6);
    }
}
