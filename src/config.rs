//! Process-wide configuration
//!
//! Built once at startup and passed by reference into every component
//! constructor. Components never read the environment themselves.

use std::env;
use std::time::Duration;

/// Retrieval engine tuning knobs
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// k for plain similarity search
    pub similarity_k: usize,
    /// k for filtered (metadata-restricted) search
    pub filtered_k: usize,
    /// Wider k used by the section strategy's broad pass
    pub section_k: usize,
    /// Number of segments returned by a retrieve() call
    pub final_k: usize,
    /// MMR relevance/diversity tradeoff, 1.0 = pure relevance
    pub mmr_lambda: f32,
    /// MMR candidate pool = mmr_fetch_multiplier * similarity_k
    pub mmr_fetch_multiplier: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_k: 10,
            filtered_k: 5,
            section_k: 5,
            final_k: 3,
            mmr_lambda: 0.5,
            mmr_fetch_multiplier: 2,
        }
    }
}

/// Control-loop termination limits
#[derive(Debug, Clone)]
pub struct LoopLimits {
    /// Replans allowed within a single turn
    pub replan_budget: u32,
    /// Hard cap on tasks per plan
    pub max_plan_tasks: usize,
    /// Per-tool-invocation timeout
    pub tool_timeout: Duration,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            replan_budget: 3,
            max_plan_tasks: 20,
            tool_timeout: Duration::from_secs(60),
        }
    }
}

/// LLM transport settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Top-level agent configuration
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub llm: LlmConfig,
    /// Base URL of the market-data quote API; price tools are disabled when absent
    pub market_data_base_url: Option<String>,
    pub retrieval: RetrievalConfig,
    pub limits: LoopLimits,
}

impl AgentConfig {
    /// Read configuration from the environment (after `dotenv` has run).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(key) = env::var("LLM_API_KEY") {
            config.llm.api_key = key;
        }
        if let Ok(url) = env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(url) = env::var("MARKET_DATA_BASE_URL") {
            config.market_data_base_url = Some(url.trim_end_matches('/').to_string());
        }
        if let Some(k) = read_usize("RETRIEVAL_FINAL_K") {
            config.retrieval.final_k = k;
        }
        if let Some(budget) = read_usize("REPLAN_BUDGET") {
            config.limits.replan_budget = budget as u32;
        }

        config
    }
}

fn read_usize(name: &str) -> Option<usize> {
    env::var(name).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.retrieval.final_k, 3);
        assert_eq!(
            config.retrieval.similarity_k * config.retrieval.mmr_fetch_multiplier,
            20
        );
        assert_eq!(config.limits.replan_budget, 3);
    }
}
