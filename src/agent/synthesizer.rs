//! Final answer synthesis from accumulated task results
//!
//! The synthesizer only ever sees completed/failed task results, never
//! raw errors. If the model itself is unavailable the formatted task
//! transcript is returned directly rather than failing the turn.

use crate::llm::LanguageModel;
use crate::models::{Plan, TaskStatus};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Synthesizer {
    llm: Arc<dyn LanguageModel>,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Question/answer lines for settled tasks; pending tasks are omitted.
    pub fn format_plan_results(plan: &Plan) -> String {
        let mut out = String::new();
        for task in &plan.tasks {
            match task.status {
                TaskStatus::Completed => {
                    let _ = writeln!(
                        out,
                        "Question: {}\nAnswer: {}\n",
                        task.question,
                        task.result.as_deref().unwrap_or("")
                    );
                }
                TaskStatus::Failed => {
                    let _ = writeln!(
                        out,
                        "Question: {}\nAttempt failed. Error: {}\n",
                        task.question,
                        task.result.as_deref().unwrap_or("")
                    );
                }
                TaskStatus::Pending => {}
            }
        }
        out
    }

    pub async fn synthesize(&self, original_query: &str, plan: &Plan) -> String {
        info!("Synthesizing final answer");

        let results = Self::format_plan_results(plan);
        let prompt = format!(
            r#"You are a financial report analysis assistant composing a final answer.

Original user query:
{query}

Collected sub-task results:
{results}

Write a clear, structured answer to the original query based only on the
results above. If some sub-tasks failed, say what could not be determined
and why, without inventing data."#,
            query = original_query,
            results = results,
        );

        match self.llm.generate(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Synthesis model call failed, returning raw transcript");
                results
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLanguageModel;
    use crate::models::SubTask;

    fn settled_plan() -> Plan {
        let mut done = SubTask::new(1, "search_financial_reports", serde_json::Map::new(), "q1");
        done.mark_completed("the key risk is regulation".to_string());
        let mut failed = SubTask::new(2, "get_internal_stock_price", serde_json::Map::new(), "q2");
        failed.mark_failed("API limit reached".to_string());
        Plan {
            thought: "t".to_string(),
            tasks: vec![done, failed],
        }
    }

    #[test]
    fn test_format_includes_answers_and_failures() {
        let formatted = Synthesizer::format_plan_results(&settled_plan());
        assert!(formatted.contains("Answer: the key risk is regulation"));
        assert!(formatted.contains("Attempt failed. Error: API limit reached"));
    }

    #[tokio::test]
    async fn test_synthesize_uses_model_answer() {
        let synthesizer =
            Synthesizer::new(Arc::new(ScriptedLanguageModel::new(["final answer text"])));
        let answer = synthesizer.synthesize("what are the risks", &settled_plan()).await;
        assert_eq!(answer, "final answer text");
    }

    #[tokio::test]
    async fn test_model_outage_falls_back_to_transcript() {
        let synthesizer =
            Synthesizer::new(Arc::new(ScriptedLanguageModel::new(Vec::<String>::new())));
        let answer = synthesizer.synthesize("what are the risks", &settled_plan()).await;
        assert!(answer.contains("the key risk is regulation"));
    }
}
