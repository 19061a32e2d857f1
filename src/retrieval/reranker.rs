//! Second-pass relevance scoring over a small candidate set

use crate::models::Segment;
use crate::retrieval::store::tokenize;
use std::collections::HashSet;
use tracing::debug;

/// Cross-encoder-style relevance model: scores one (query, text) pair,
/// higher is more relevant.
pub trait RelevanceModel: Send + Sync {
    fn score(&self, query: &str, text: &str) -> f32;
}

/// Token-overlap relevance model. A deterministic stand-in for a hosted
/// cross-encoder with the same interface.
pub struct LexicalRelevanceModel;

impl RelevanceModel for LexicalRelevanceModel {
    fn score(&self, query: &str, text: &str) -> f32 {
        let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();
        let text_tokens: HashSet<String> = tokenize(text).into_iter().collect();

        if query_tokens.is_empty() || text_tokens.is_empty() {
            return 0.0;
        }

        let overlap = query_tokens.intersection(&text_tokens).count() as f32;
        overlap / ((query_tokens.len() as f32) * (text_tokens.len() as f32)).sqrt()
    }
}

pub struct Reranker {
    model: Box<dyn RelevanceModel>,
}

impl Reranker {
    pub fn new(model: Box<dyn RelevanceModel>) -> Self {
        Self { model }
    }

    /// Score each segment independently, attach the score, and return the
    /// top `top_n` in descending score order. The sort is stable: tied
    /// scores keep the original candidate order. Empty input returns
    /// empty, never an error.
    pub fn rerank(&self, query: &str, mut segments: Vec<Segment>, top_n: usize) -> Vec<Segment> {
        if segments.is_empty() {
            return Vec::new();
        }

        debug!(candidates = segments.len(), "Reranking candidates");

        for segment in &mut segments {
            segment.rerank_score = Some(self.model.score(query, &segment.text));
        }

        // sort_by is stable, so equal scores preserve input order.
        segments.sort_by(|a, b| {
            b.rerank_score
                .unwrap_or(0.0)
                .total_cmp(&a.rerank_score.unwrap_or(0.0))
        });

        segments.truncate(top_n);
        segments
    }
}

impl Default for Reranker {
    fn default() -> Self {
        Self::new(Box::new(LexicalRelevanceModel))
    }
}
