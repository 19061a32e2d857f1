//! Intent-routed, multi-strategy retrieval engine with rerank
//!
//! The smart retriever is the system's single retrieval entry point:
//! router classification, strategy dispatch, candidate union, rerank.
//! Every precise mode that comes back empty degrades to the broad hybrid
//! strategy rather than returning nothing.

pub mod reranker;
pub mod router;
pub mod store;
pub mod strategies;

use crate::models::{RetrievalMode, Segment, SegmentType};
use crate::Result;
use reranker::Reranker;
use router::IntentRouter;
use std::collections::HashSet;
use store::MetadataFilter;
use strategies::RetrievalStrategies;
use tracing::{debug, info, warn};

pub struct SmartRetriever {
    router: IntentRouter,
    strategies: RetrievalStrategies,
    reranker: Reranker,
    final_k: usize,
}

impl SmartRetriever {
    pub fn new(router: IntentRouter, strategies: RetrievalStrategies, reranker: Reranker) -> Self {
        let final_k = strategies.config().final_k;
        Self {
            router,
            strategies,
            reranker,
            final_k,
        }
    }

    /// Retrieve the top `final_k` segments for a query.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Segment>> {
        let intent = self.router.classify(query).await;
        info!(mode = %intent.mode, term = ?intent.term, "Dispatching retrieval");

        let mut candidates = match (intent.mode, intent.term.as_deref()) {
            (RetrievalMode::Risk, _) => {
                self.strategies
                    .search_with_filter(query, MetadataFilter::TypeIs(SegmentType::Risk))
                    .await?
            }
            (RetrievalMode::Summary, _) => {
                self.strategies
                    .search_with_filter(query, MetadataFilter::TypeIs(SegmentType::Summary))
                    .await?
            }
            (RetrievalMode::FigureTable, Some(term)) => {
                self.strategies
                    .search_with_filter(term, MetadataFilter::TypeIn(vec![SegmentType::Figure]))
                    .await?
            }
            (RetrievalMode::Section, Some(term)) => self.section_candidates(query, term).await?,
            // The router guarantees a term for these modes; an empty set
            // here simply degrades to the hybrid fallback below.
            (RetrievalMode::FigureTable, None) | (RetrievalMode::Section, None) => Vec::new(),
            (RetrievalMode::General, _) => self.hybrid_candidates(query).await?,
        };

        // Degrade-not-fail: a precise filter that matched nothing must not
        // produce an empty answer when broader recall would find something.
        if intent.mode != RetrievalMode::General && candidates.is_empty() {
            warn!(mode = %intent.mode, "Precise strategy found no segments, degrading to hybrid search");
            candidates = self.hybrid_candidates(query).await?;
        }

        if candidates.is_empty() {
            warn!("No retrieval strategy found any segments");
            return Ok(Vec::new());
        }

        debug!(candidates = candidates.len(), "Candidate union assembled");
        Ok(self.reranker.rerank(query, candidates, self.final_k))
    }

    /// Broad similarity pass unioned with a hierarchy-filtered pass,
    /// deduplicated by text so a segment matching both passes cannot
    /// claim two final slots.
    async fn section_candidates(&self, query: &str, term: &str) -> Result<Vec<Segment>> {
        let section_k = self.strategies.config().section_k;
        let filtered = self
            .strategies
            .search_with_filter(query, MetadataFilter::HierarchyContains(term.to_string()))
            .await?;
        let broad = self
            .strategies
            .search_similarity(query, Some(section_k))
            .await?;

        let mut seen_texts = HashSet::new();
        let mut unique = Vec::new();
        for segment in filtered.into_iter().chain(broad) {
            if seen_texts.insert(segment.text.clone()) {
                unique.push(segment);
            }
        }
        Ok(unique)
    }

    /// Similarity ∪ MMR, deduplicated by exact text; first occurrence wins
    /// regardless of metadata differences.
    async fn hybrid_candidates(&self, query: &str) -> Result<Vec<Segment>> {
        let similar = self.strategies.search_similarity(query, None).await?;
        let diverse = self.strategies.search_mmr(query).await?;

        let mut seen_texts = HashSet::new();
        let mut unique = Vec::new();
        for segment in similar.into_iter().chain(diverse) {
            if seen_texts.insert(segment.text.clone()) {
                unique.push(segment);
            }
        }
        Ok(unique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::llm::ScriptedLanguageModel;
    use crate::retrieval::store::InMemorySegmentStore;
    use std::sync::Arc;

    async fn seeded_store() -> InMemorySegmentStore {
        let store = InMemorySegmentStore::default();
        store
            .insert(Segment::new(
                "Regulatory pressure is the dominant risk for the sector",
                SegmentType::Risk,
                vec!["Risks".to_string()],
                Some(12),
            ))
            .await;
        store
            .insert(Segment::new(
                "The report argues green finance will anchor Shanghai's hub strategy",
                SegmentType::Summary,
                vec!["Executive Summary".to_string()],
                Some(1),
            ))
            .await;
        store
            .insert(Segment::new(
                "Figure 2 charts GDP growth against green bond issuance",
                SegmentType::Figure,
                vec!["Macro".to_string()],
                Some(5),
            ))
            .await;
        store
            .insert(Segment::new(
                "Chapter 3 reviews policy tailwinds for green finance adoption",
                SegmentType::Section,
                vec!["Chapter 3 Policy".to_string()],
                Some(8),
            ))
            .await;
        store
    }

    async fn retriever_with(
        router_response: &str,
        store: InMemorySegmentStore,
    ) -> SmartRetriever {
        let llm = Arc::new(ScriptedLanguageModel::new([router_response]));
        SmartRetriever::new(
            IntentRouter::new(llm),
            RetrievalStrategies::new(Arc::new(store), RetrievalConfig::default()),
            Reranker::default(),
        )
    }

    #[tokio::test]
    async fn test_risk_mode_returns_risk_segments() {
        let retriever =
            retriever_with(r#"{"mode": "risk", "term": null}"#, seeded_store().await).await;
        let results = retriever.retrieve("what are the risks").await.unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].segment_type, SegmentType::Risk);
        assert!(results[0].rerank_score.is_some());
    }

    #[tokio::test]
    async fn test_empty_precise_mode_degrades_to_hybrid() {
        // Store has no summary segments at all.
        let store = InMemorySegmentStore::default();
        store
            .insert(Segment::new(
                "Only a policy section lives here",
                SegmentType::Section,
                vec![],
                None,
            ))
            .await;

        let retriever = retriever_with(r#"{"mode": "summary", "term": null}"#, store).await;
        let results = retriever.retrieve("policy section summary").await.unwrap();
        assert!(!results.is_empty(), "degrade-not-fail must find the broad match");
    }

    #[tokio::test]
    async fn test_empty_section_mode_also_degrades() {
        let store = InMemorySegmentStore::default();
        store
            .insert(Segment::new(
                "General commentary on market structure",
                SegmentType::Other,
                vec!["Notes".to_string()],
                None,
            ))
            .await;

        let retriever = retriever_with(
            r#"{"mode": "section", "term": "Nonexistent Chapter"}"#,
            store,
        )
        .await;
        let results = retriever.retrieve("market structure commentary").await.unwrap();
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_store_returns_empty_without_error() {
        let retriever = retriever_with(
            r#"{"mode": "general", "term": null}"#,
            InMemorySegmentStore::default(),
        )
        .await;
        let results = retriever.retrieve("anything").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_section_mode_deduplicates_across_passes() {
        let store = InMemorySegmentStore::default();
        // Matches the hierarchy filter AND ranks top in the broad pass.
        store
            .insert(Segment::new(
                "Chapter 3 policy tailwinds for green finance",
                SegmentType::Section,
                vec!["Chapter 3 Policy".to_string()],
                Some(8),
            ))
            .await;
        store
            .insert(Segment::new(
                "Unrelated appendix on methodology",
                SegmentType::Other,
                vec!["Appendix".to_string()],
                None,
            ))
            .await;

        let retriever = retriever_with(
            r#"{"mode": "section", "term": "Chapter 3"}"#,
            store,
        )
        .await;
        let results = retriever
            .retrieve("policy tailwinds green finance")
            .await
            .unwrap();

        let chapter_hits = results
            .iter()
            .filter(|s| s.text.contains("Chapter 3 policy tailwinds"))
            .count();
        assert_eq!(chapter_hits, 1);
    }

    #[tokio::test]
    async fn test_general_mode_deduplicates_by_text() {
        let store = InMemorySegmentStore::default();
        // Same text, different metadata: later duplicate must be dropped.
        store
            .insert(Segment::new(
                "Green finance outlook remains strong",
                SegmentType::Summary,
                vec!["A".to_string()],
                Some(1),
            ))
            .await;
        store
            .insert(Segment::new(
                "Green finance outlook remains strong",
                SegmentType::Section,
                vec!["B".to_string()],
                Some(2),
            ))
            .await;

        let retriever = retriever_with(r#"{"mode": "general", "term": null}"#, store).await;
        let results = retriever.retrieve("green finance outlook").await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_results_capped_at_final_k() {
        let store = InMemorySegmentStore::default();
        for i in 0..10 {
            store
                .insert(Segment::new(
                    format!("green finance note number {}", i),
                    SegmentType::Section,
                    vec![],
                    None,
                ))
                .await;
        }

        let retriever = retriever_with(r#"{"mode": "general", "term": null}"#, store).await;
        let results = retriever.retrieve("green finance note").await.unwrap();
        assert_eq!(results.len(), 3);
    }
}
