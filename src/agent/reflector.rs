//! Reflection over the most recently completed task
//!
//! The reflector never raises: model failures, malformed output, and
//! unresolvable task ids all come back as a failure reflection so the
//! control loop can still route deterministically.

use crate::llm::{extract_json_payload, LanguageModel};
use crate::models::{Plan, Reflection};
use std::sync::Arc;
use tracing::{error, info, warn};

const REFLECTOR_PROMPT: &str = r#"You are a critical reviewer of tool execution results in a financial report analysis system.

The sub-task below was just executed. Assess whether its result actually answers the question.

Question:
{question}

Tool Result:
{result}

Respond with JSON:
{
  "assessment": "success" | "partial_success" | "failure",
  "reasoning": "<brief critical explanation>",
  "suggestion_for_next_step": "<actionable suggestion, or null>",
  "is_sufficient": true | false
}

Rules:
- "failure" if the result is an error message, irrelevant, or empty.
- "partial_success" if the information is useful but incomplete.
- "is_sufficient" is true only when the process can stop here."#;

pub struct Reflector {
    llm: Arc<dyn LanguageModel>,
}

impl Reflector {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Assess the task identified by `last_completed_id`. With no
    /// completed task yet, the reflection is vacuously successful.
    pub async fn reflect(&self, plan: &Plan, last_completed_id: Option<u32>) -> Reflection {
        let task_id = match last_completed_id {
            Some(id) => id,
            None => return Reflection::vacuous_success(),
        };

        let task = match plan.task(task_id) {
            Some(task) => task,
            None => {
                // Fatal for the turn, but reported as a routable failure.
                error!(task_id, "Cannot find task in the plan");
                return Reflection::failure(format!("Task ID {} not found in plan.", task_id));
            }
        };

        info!(task_id, question = %task.question, "Reflecting on task");

        let result = task.result.as_deref().unwrap_or("(no result recorded)");
        let prompt = REFLECTOR_PROMPT
            .replace("{question}", &task.question)
            .replace("{result}", result);

        let raw = match self.llm.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Reflector model call failed");
                return Reflection::failure(format!("Reflection model call failed: {}", e));
            }
        };

        match serde_json::from_str::<Reflection>(extract_json_payload(&raw)) {
            Ok(reflection) => {
                info!(
                    assessment = ?reflection.assessment,
                    reasoning = %reflection.reasoning,
                    "Reflection complete"
                );
                reflection
            }
            Err(e) => {
                warn!(error = %e, "Malformed reflection output");
                Reflection::failure(format!("Malformed reflection output: {}", e))
            }
        }
    }
}
