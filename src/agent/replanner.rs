//! Plan regeneration after a reflected failure
//!
//! Formats a transcript of every task's outcome plus the failure
//! reasoning and asks the model for a fresh plan. The new plan replaces
//! the old one wholesale; completed results are not carried forward.

use crate::error::AgentError;
use crate::llm::{extract_json_payload, LanguageModel};
use crate::models::{Plan, PlannerOutput, Reflection, TaskStatus};
use crate::Result;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Replanner {
    llm: Arc<dyn LanguageModel>,
}

impl Replanner {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Transcript of every task: success with result, failed, or pending.
    fn format_plan_transcript(plan: &Plan) -> String {
        let mut out = String::new();
        for task in &plan.tasks {
            let _ = writeln!(out, "Task {}: {}", task.task_id, task.question);
            match task.status {
                TaskStatus::Completed => {
                    let _ = writeln!(
                        out,
                        "  Status: Success\n  Result: {}",
                        task.result.as_deref().unwrap_or("")
                    );
                }
                TaskStatus::Failed => {
                    let _ = writeln!(out, "  Status: Failed");
                }
                TaskStatus::Pending => {
                    let _ = writeln!(out, "  Status: Pending");
                }
            }
        }
        out
    }

    fn build_prompt(plan: &Plan, reflection: &Reflection) -> String {
        let suggestion = reflection
            .suggestion_for_next_step
            .as_deref()
            .unwrap_or("(none)");

        format!(
            r#"You are the replanning engine of a financial report analysis assistant.

The current plan hit a failure. Produce a COMPLETE new plan that still
answers the user's original intent. Do not assume results from the old
plan carry over; re-derive or re-request anything the new plan needs.
Keep task ids unique. If you reuse an id of an already-succeeded task,
its question must be unchanged.

Current plan and outcomes:
{transcript}

Failure reasoning:
{reasoning}

Suggestion:
{suggestion}

Respond with JSON of the form {{"plan": {{"thought": "...", "tasks": [...]}}, "chat_response": null}}."#,
            transcript = Self::format_plan_transcript(plan),
            reasoning = reflection.reasoning,
            suggestion = suggestion,
        )
    }

    /// Generate a replacement plan. Errors here leave the old plan in
    /// place; the control loop decides how to proceed.
    pub async fn replan(&self, plan: &Plan, reflection: &Reflection) -> Result<Plan> {
        info!("Replanner generating a fresh plan");

        let prompt = Self::build_prompt(plan, reflection);
        let raw = self.llm.generate(&prompt).await?;
        debug!(raw = %raw, "Replanner raw output");

        let output: PlannerOutput = serde_json::from_str(extract_json_payload(&raw))
            .map_err(|e| AgentError::ReplanningError(format!("invalid replanner output: {}", e)))?;

        let (new_plan, chat) = output.into_parts();
        match (new_plan, chat) {
            (Some(new_plan), _) => {
                new_plan.validate_task_ids()?;
                info!(tasks = new_plan.tasks.len(), "Replanning complete");
                Ok(new_plan)
            }
            (None, _) => Err(AgentError::ReplanningError(
                "replanner returned a chat response instead of a plan".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLanguageModel;
    use crate::models::SubTask;

    fn failed_plan() -> Plan {
        let mut done = SubTask::new(1, "search_financial_reports", serde_json::Map::new(), "q1");
        done.mark_completed("useful answer".to_string());
        let mut failed = SubTask::new(2, "get_internal_stock_price", serde_json::Map::new(), "q2");
        failed.mark_failed("API limit reached".to_string());
        let pending = SubTask::new(3, "search_financial_reports", serde_json::Map::new(), "q3");

        Plan {
            thought: "original".to_string(),
            tasks: vec![done, failed, pending],
        }
    }

    #[test]
    fn test_transcript_covers_all_statuses() {
        let transcript = Replanner::format_plan_transcript(&failed_plan());
        assert!(transcript.contains("Status: Success"));
        assert!(transcript.contains("Result: useful answer"));
        assert!(transcript.contains("Status: Failed"));
        assert!(transcript.contains("Status: Pending"));
    }

    #[tokio::test]
    async fn test_replan_produces_new_plan() {
        let llm = Arc::new(ScriptedLanguageModel::new([r#"{
            "plan": {"thought": "retry with broader terms", "tasks": [
                {"task_id": 2, "tool_name": "get_international_financial_product_price", "tool_args": {"symbol": "300750.SZ"}, "question": "q2 retried"}
            ]},
            "chat_response": null
        }"#]));
        let replanner = Replanner::new(llm);

        let reflection = Reflection::failure("quote API rejected the symbol");
        let new_plan = replanner.replan(&failed_plan(), &reflection).await.unwrap();
        assert_eq!(new_plan.tasks.len(), 1);
        assert_eq!(new_plan.thought, "retry with broader terms");
    }

    #[tokio::test]
    async fn test_chat_response_from_replanner_is_an_error() {
        let llm = Arc::new(ScriptedLanguageModel::new([
            r#"{"plan": null, "chat_response": "sorry"}"#,
        ]));
        let replanner = Replanner::new(llm);
        let result = replanner
            .replan(&failed_plan(), &Reflection::failure("x"))
            .await;
        assert!(matches!(result, Err(AgentError::ReplanningError(_))));
    }

    #[tokio::test]
    async fn test_malformed_output_is_replanning_error() {
        let llm = Arc::new(ScriptedLanguageModel::new(["no json here"]));
        let replanner = Replanner::new(llm);
        let result = replanner
            .replan(&failed_plan(), &Reflection::failure("x"))
            .await;
        assert!(matches!(result, Err(AgentError::ReplanningError(_))));
    }
}
