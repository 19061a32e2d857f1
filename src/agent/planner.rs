//! LLM-powered planner for query decomposition
//!
//! Decomposes a user query into an ordered tool-backed plan, or answers
//! directly when no tool is needed. Few-shot examples anchor the output
//! format.

use crate::error::AgentError;
use crate::llm::{extract_json_payload, LanguageModel};
use crate::models::PlannerOutput;
use crate::Result;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info};

/// Canonical few-shot examples: a multi-entity comparison needing four
/// tasks, a single-step report lookup, and a plain greeting.
const PLANNER_EXAMPLES: &[(&str, &str)] = &[
    (
        "根据研报，对比一下宁德时代和特斯拉的风险，并分别告诉我它们俩的最新股价。",
        r#"{
    "plan": {
        "thought": "The user wants a risk comparison from the report and real-time stock prices for two companies from different markets. I need four steps: search the report for each company's risks, then fetch each price with the correct market tool.",
        "tasks": [
            {"task_id": 1, "tool_name": "search_financial_reports", "tool_args": {"query": "宁德时代的风险"}, "question": "研报中提到了宁德时代的哪些风险？"},
            {"task_id": 2, "tool_name": "search_financial_reports", "tool_args": {"query": "特斯拉的风险"}, "question": "研报中提到了特斯拉的哪些风险？"},
            {"task_id": 3, "tool_name": "get_internal_stock_price", "tool_args": {"symbol": "宁德时代"}, "question": "宁德时代的最新A股股价是多少？"},
            {"task_id": 4, "tool_name": "get_international_financial_product_price", "tool_args": {"symbol": "TSLA"}, "question": "特斯拉(TSLA)的最新股价是多少？"}
        ]
    },
    "chat_response": null
}"#,
    ),
    (
        "这份报告的核心观点是什么？",
        r#"{
    "plan": {
        "thought": "The user is asking for the main summary of the report. A single step is sufficient.",
        "tasks": [
            {"task_id": 1, "tool_name": "search_financial_reports", "tool_args": {"query": "报告的核心观点和摘要"}, "question": "这份报告的核心观点是什么？"}
        ]
    },
    "chat_response": null
}"#,
    ),
    (
        "你好",
        r#"{
    "plan": null,
    "chat_response": "您好！我是您的研报分析助手，有什么可以帮您的吗？"
}"#,
    ),
];

fn format_examples() -> String {
    let mut out = String::new();
    for (query, reply) in PLANNER_EXAMPLES {
        let _ = writeln!(out, "*   **User Query**: \"{}\"", query);
        let _ = writeln!(out, "*   **Your Output**:\n```json\n{}\n```\n", reply);
    }
    out.trim_end().to_string()
}

/// Trait for plan generation (LLM controlled)
#[async_trait]
pub trait Planner: Send + Sync {
    /// Create a plan (or direct reply) for a query, given formatted
    /// conversation history and recalled user memories.
    async fn plan(&self, query: &str, history: &str, memories: &str) -> Result<PlannerOutput>;
}

pub struct LlmPlanner {
    llm: Arc<dyn LanguageModel>,
    /// (name, description) pairs from the tool registry
    tool_catalog: Vec<(String, String)>,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn LanguageModel>, tool_catalog: Vec<(String, String)>) -> Self {
        Self { llm, tool_catalog }
    }

    fn build_prompt(&self, query: &str, history: &str, memories: &str) -> String {
        let mut tools = String::new();
        for (name, description) in &self.tool_catalog {
            let _ = writeln!(tools, "- {} – {}", name, description);
        }

        format!(
            r#"You are the planning engine of a financial report analysis assistant.

Decompose the user's query into an ordered list of tool-backed sub-tasks, or
answer directly with "chat_response" when no tool is needed. Exactly one of
"plan" and "chat_response" must be non-null. Task ids are sequential
integers starting at 1 and must be unique.

Available tools:
{tools}
What you know about the user:
{memories}

Conversation so far:
{history}

Examples:
{examples}

User Query:
"{query}"

Return ONLY valid JSON in the format shown by the examples."#,
            tools = tools,
            memories = memories,
            history = history,
            examples = format_examples(),
            query = query,
        )
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, query: &str, history: &str, memories: &str) -> Result<PlannerOutput> {
        info!("Planner processing user query");

        let prompt = self.build_prompt(query, history, memories);
        let raw = self.llm.generate(&prompt).await?;
        debug!(raw = %raw, "Planner raw output");

        let payload = extract_json_payload(&raw);
        let output: PlannerOutput = serde_json::from_str(payload).map_err(|e| {
            AgentError::PlanningError(format!("invalid planner output: {} | raw={}", e, raw))
        })?;

        if let Some(plan) = output.plan() {
            plan.validate_task_ids()?;
            info!(tasks = plan.tasks.len(), "Planner created a plan");
        } else {
            info!("Planner chose a direct chat response");
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLanguageModel;
    use crate::models::TaskStatus;

    fn planner_with(response: &str) -> LlmPlanner {
        LlmPlanner::new(
            Arc::new(ScriptedLanguageModel::new([response])),
            vec![(
                "search_financial_reports".to_string(),
                "report search".to_string(),
            )],
        )
    }

    #[tokio::test]
    async fn test_multi_entity_query_yields_multi_task_plan() {
        // Scripted with the canonical comparison example output.
        let planner = planner_with(PLANNER_EXAMPLES[0].1);
        let output = planner
            .plan("帮我对比A和B的风险并查询A的股价", "", "")
            .await
            .unwrap();

        let plan = output.plan().expect("expected a plan");
        assert!(plan.tasks.len() >= 2);

        let searches = plan
            .tasks
            .iter()
            .filter(|t| t.tool_name == "search_financial_reports")
            .count();
        let prices = plan
            .tasks
            .iter()
            .filter(|t| t.tool_name.contains("price"))
            .count();
        assert!(searches >= 2);
        assert!(prices >= 1);
        assert!(plan.tasks.iter().all(|t| t.status == TaskStatus::Pending));
    }

    #[tokio::test]
    async fn test_greeting_yields_chat_response() {
        let planner = planner_with(PLANNER_EXAMPLES[2].1);
        let output = planner.plan("你好", "", "").await.unwrap();
        assert!(output.plan().is_none());
        assert!(output.chat_response().is_some());
    }

    #[tokio::test]
    async fn test_fenced_output_is_accepted() {
        let fenced = format!("```json\n{}\n```", PLANNER_EXAMPLES[1].1);
        let planner = planner_with(&fenced);
        let output = planner.plan("这份报告的核心观点是什么？", "", "").await.unwrap();
        assert_eq!(output.plan().unwrap().tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_output_is_planning_error() {
        let planner = planner_with("I cannot help with that");
        let result = planner.plan("anything", "", "").await;
        assert!(matches!(result, Err(AgentError::PlanningError(_))));
    }

    #[tokio::test]
    async fn test_duplicate_task_ids_rejected() {
        let planner = planner_with(
            r#"{"plan": {"thought": "t", "tasks": [
                {"task_id": 1, "tool_name": "a", "tool_args": {}, "question": "q1"},
                {"task_id": 1, "tool_name": "b", "tool_args": {}, "question": "q2"}
            ]}, "chat_response": null}"#,
        );
        let result = planner.plan("anything", "", "").await;
        assert!(matches!(result, Err(AgentError::InvalidPlan(_))));
    }
}
