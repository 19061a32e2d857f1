//! LLM-backed retrieval intent router
//!
//! Classifies a query into one of five retrieval modes. Classification
//! failures never reach the caller: the router degrades to the general
//! mode instead of failing the pipeline.

use crate::llm::{extract_json_payload, LanguageModel};
use crate::models::{RetrievalIntent, RetrievalMode};
use std::sync::Arc;
use tracing::{debug, warn};

const ROUTER_PROMPT: &str = r#"You are an expert at understanding user queries for a financial report analysis system.
Your task is to analyze the user's query and determine the best retrieval strategy.

Here are the available retrieval modes:
- "risk": Use this for questions about risks, challenges, downsides, or potential problems.
- "summary": Use this for general questions about the report's core ideas, summary, abstract, or main points.
- "figure_table": Use this for questions specifically asking for a chart, graph, table, or specific data points.
- "section": Use this for questions about a specific chapter or section of the report.
- "general": Use this for all other questions that don't fit the above categories.

If the mode is "section" or "figure_table", you MUST extract the specific search term. Otherwise, the term should be null.

User Query:
"{query}"

Respond with JSON: {"mode": "<mode>", "term": <string or null>}"#;

pub struct IntentRouter {
    llm: Arc<dyn LanguageModel>,
}

impl IntentRouter {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Classify a query. Never errors: malformed output, a missing
    /// required term, or a model failure all fall back to the general
    /// intent, trading retrieval quality for availability.
    pub async fn classify(&self, query: &str) -> RetrievalIntent {
        let prompt = ROUTER_PROMPT.replace("{query}", query);

        let raw = match self.llm.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Intent classification failed, falling back to general");
                return RetrievalIntent::general();
            }
        };

        let intent: RetrievalIntent = match serde_json::from_str(extract_json_payload(&raw)) {
            Ok(intent) => intent,
            Err(e) => {
                warn!(error = %e, "Malformed intent output, falling back to general");
                return RetrievalIntent::general();
            }
        };

        if RetrievalIntent::requires_term(intent.mode)
            && intent.term.as_deref().map_or(true, |t| t.trim().is_empty())
        {
            warn!(mode = %intent.mode, "Intent missing required term, falling back to general");
            return RetrievalIntent::general();
        }

        debug!(mode = %intent.mode, term = ?intent.term, "Intent classified");
        intent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLanguageModel;

    async fn classify_with(response: &str, query: &str) -> RetrievalIntent {
        let llm = Arc::new(ScriptedLanguageModel::new([response]));
        IntentRouter::new(llm).classify(query).await
    }

    #[tokio::test]
    async fn test_classifies_risk_mode() {
        let intent = classify_with(
            r#"{"mode": "risk", "term": null}"#,
            "What are the main risks?",
        )
        .await;
        assert_eq!(intent.mode, RetrievalMode::Risk);
        assert!(intent.term.is_none());
    }

    #[tokio::test]
    async fn test_classifies_section_with_fenced_output() {
        let intent = classify_with(
            "```json\n{\"mode\": \"section\", \"term\": \"经济影响\"}\n```",
            "第三章经济影响讲了什么",
        )
        .await;
        assert_eq!(intent.mode, RetrievalMode::Section);
        assert_eq!(intent.term.as_deref(), Some("经济影响"));
    }

    #[tokio::test]
    async fn test_malformed_output_falls_back_to_general() {
        let intent = classify_with("not json at all", "anything").await;
        assert_eq!(intent, RetrievalIntent::general());
    }

    #[tokio::test]
    async fn test_model_error_falls_back_to_general() {
        let llm = Arc::new(ScriptedLanguageModel::new(Vec::<String>::new()));
        let intent = IntentRouter::new(llm).classify("anything").await;
        assert_eq!(intent, RetrievalIntent::general());
    }

    #[tokio::test]
    async fn test_section_without_term_falls_back_to_general() {
        let intent =
            classify_with(r#"{"mode": "section", "term": null}"#, "about chapter 3").await;
        assert_eq!(intent, RetrievalIntent::general());
    }
}
