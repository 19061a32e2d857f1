//! Segment store interface and in-memory implementation
//!
//! The persistent vector index is an external collaborator; this module
//! defines the contract the retrieval strategies need from it, plus an
//! in-memory implementation for development and tests.

use crate::models::{Segment, SegmentType};
use crate::Result;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Metadata predicate for filtered search
#[derive(Debug, Clone)]
pub enum MetadataFilter {
    TypeIs(SegmentType),
    TypeIn(Vec<SegmentType>),
    /// Substring match against the joined hierarchy path
    HierarchyContains(String),
}

impl MetadataFilter {
    pub fn matches(&self, segment: &Segment) -> bool {
        match self {
            MetadataFilter::TypeIs(t) => segment.segment_type == *t,
            MetadataFilter::TypeIn(types) => types.contains(&segment.segment_type),
            MetadataFilter::HierarchyContains(term) => {
                segment.hierarchy_path().contains(term.as_str())
            }
        }
    }
}

/// Vector index over segments
#[async_trait::async_trait]
pub trait SegmentStore: Send + Sync {
    /// Top-k nearest neighbours by embedding similarity
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Segment>>;

    /// Diversity-aware top-k: greedily picks from a `fetch_k` candidate
    /// pool, balancing relevance against redundancy with `lambda`
    /// (1.0 = pure relevance).
    async fn mmr_search(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> Result<Vec<Segment>>;

    /// Similarity search restricted to segments matching the predicate
    async fn filtered_search(
        &self,
        query: &str,
        filter: &MetadataFilter,
        k: usize,
    ) -> Result<Vec<Segment>>;
}

/// Text embedding interface
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Deterministic hashed bag-of-words embedder. Not a real semantic
/// embedding; only used by the in-memory store.
pub struct HashedBowEmbedder {
    dims: usize,
}

impl HashedBowEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for HashedBowEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Embedder for HashedBowEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dims];

        for token in tokenize(text) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dims;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

/// Lowercased alphanumeric tokens; CJK text falls back to per-character
/// tokens since it carries no whitespace word boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            current.extend(ch.to_lowercase());
        } else {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            if ch.is_alphanumeric() {
                tokens.push(ch.to_string());
            }
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// In-memory segment store for development and tests
pub struct InMemorySegmentStore {
    entries: Arc<RwLock<Vec<(Segment, Vec<f32>)>>>,
    embedder: Box<dyn Embedder>,
}

impl InMemorySegmentStore {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            embedder,
        }
    }

    pub async fn insert(&self, segment: Segment) {
        let vector = self.embedder.embed(&segment.text);
        let mut entries = self.entries.write().await;
        entries.push((segment, vector));
    }

    async fn ranked_candidates(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
    ) -> Vec<(Segment, Vec<f32>, f32)> {
        let query_vector = self.embedder.embed(query);
        let entries = self.entries.read().await;

        let mut scored: Vec<(Segment, Vec<f32>, f32)> = entries
            .iter()
            .filter(|(segment, _)| filter.map_or(true, |f| f.matches(segment)))
            .map(|(segment, vector)| {
                let score = cosine(&query_vector, vector);
                (segment.clone(), vector.clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| b.2.total_cmp(&a.2));
        scored
    }
}

impl Default for InMemorySegmentStore {
    fn default() -> Self {
        Self::new(Box::new(HashedBowEmbedder::default()))
    }
}

#[async_trait::async_trait]
impl SegmentStore for InMemorySegmentStore {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Segment>> {
        let ranked = self.ranked_candidates(query, None).await;
        Ok(ranked.into_iter().take(k).map(|(s, _, _)| s).collect())
    }

    async fn mmr_search(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> Result<Vec<Segment>> {
        let pool: Vec<(Segment, Vec<f32>, f32)> = self
            .ranked_candidates(query, None)
            .await
            .into_iter()
            .take(fetch_k)
            .collect();

        let mut selected: Vec<(Segment, Vec<f32>)> = Vec::with_capacity(k);
        let mut remaining: Vec<(Segment, Vec<f32>, f32)> = pool;

        while selected.len() < k && !remaining.is_empty() {
            let mut best_index = 0;
            let mut best_score = f32::NEG_INFINITY;

            for (i, (_, vector, relevance)) in remaining.iter().enumerate() {
                let max_redundancy = selected
                    .iter()
                    .map(|(_, selected_vector)| cosine(vector, selected_vector))
                    .fold(0.0f32, f32::max);

                let mmr = lambda * relevance - (1.0 - lambda) * max_redundancy;
                if mmr > best_score {
                    best_score = mmr;
                    best_index = i;
                }
            }

            let (segment, vector, _) = remaining.remove(best_index);
            selected.push((segment, vector));
        }

        Ok(selected.into_iter().map(|(s, _)| s).collect())
    }

    async fn filtered_search(
        &self,
        query: &str,
        filter: &MetadataFilter,
        k: usize,
    ) -> Result<Vec<Segment>> {
        let ranked = self.ranked_candidates(query, Some(filter)).await;
        Ok(ranked.into_iter().take(k).map(|(s, _, _)| s).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_store() -> InMemorySegmentStore {
        let store = InMemorySegmentStore::default();
        store
            .insert(Segment::new(
                "Revenue grew 20 percent year over year",
                SegmentType::Section,
                vec!["Financials".to_string()],
                Some(3),
            ))
            .await;
        store
            .insert(Segment::new(
                "Supply chain disruption is the main risk factor",
                SegmentType::Risk,
                vec!["Risks".to_string()],
                Some(9),
            ))
            .await;
        store
            .insert(Segment::new(
                "Figure 4 shows quarterly revenue by region",
                SegmentType::Figure,
                vec!["Financials".to_string(), "Charts".to_string()],
                Some(4),
            ))
            .await;
        store
    }

    #[tokio::test]
    async fn test_similarity_search_ranks_by_overlap() {
        let store = seeded_store().await;
        let results = store.similarity_search("revenue growth", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].text.contains("Revenue grew"));
    }

    #[tokio::test]
    async fn test_filtered_search_respects_type_predicate() {
        let store = seeded_store().await;
        let results = store
            .filtered_search("risk", &MetadataFilter::TypeIs(SegmentType::Risk), 5)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].segment_type, SegmentType::Risk);
    }

    #[tokio::test]
    async fn test_hierarchy_filter_matches_substring() {
        let store = seeded_store().await;
        let results = store
            .filtered_search(
                "revenue",
                &MetadataFilter::HierarchyContains("Charts".to_string()),
                5,
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].text.contains("Figure 4"));
    }

    #[tokio::test]
    async fn test_mmr_returns_at_most_k() {
        let store = seeded_store().await;
        let results = store.mmr_search("revenue", 2, 4, 0.5).await.unwrap();
        assert!(results.len() <= 2);
        assert!(!results.is_empty());
    }

    #[test]
    fn test_tokenize_handles_cjk() {
        let tokens = tokenize("宁德时代的风险 risk factors");
        assert!(tokens.contains(&"风".to_string()));
        assert!(tokens.contains(&"risk".to_string()));
    }
}
