//! Core data models for the report analysis agent

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

//
// ================= Segments =================
//

/// Closed set of segment types produced by the document segmenter.
/// Unknown types deserialize into the catch-all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    Section,
    Summary,
    Risk,
    Figure,
    #[default]
    #[serde(other)]
    Other,
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SegmentType::Section => "section",
            SegmentType::Summary => "summary",
            SegmentType::Risk => "risk",
            SegmentType::Figure => "figure",
            SegmentType::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// An immutable unit of retrievable report content.
///
/// Created once by the document segmenter and written to the segment store;
/// never mutated afterwards except for the transient `rerank_score` attached
/// during a retrieval call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Content hash of the segment text
    pub id: String,
    pub text: String,
    pub segment_type: SegmentType,
    /// Ordered enclosing heading titles, outermost first
    pub hierarchy: Vec<String>,
    pub page: Option<u32>,
    /// Attached transiently by the reranker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl Segment {
    pub fn new(
        text: impl Into<String>,
        segment_type: SegmentType,
        hierarchy: Vec<String>,
        page: Option<u32>,
    ) -> Self {
        let text = text.into();
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let id = hex::encode(hasher.finalize());

        Self {
            id,
            text,
            segment_type,
            hierarchy,
            page,
            rerank_score: None,
        }
    }

    /// Display form of the hierarchy path, e.g. "Chapter 2 > Risks"
    pub fn hierarchy_path(&self) -> String {
        self.hierarchy.join(" > ")
    }
}

//
// ================= Retrieval Intent =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    Risk,
    Summary,
    FigureTable,
    Section,
    General,
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RetrievalMode::Risk => "risk",
            RetrievalMode::Summary => "summary",
            RetrievalMode::FigureTable => "figure_table",
            RetrievalMode::Section => "section",
            RetrievalMode::General => "general",
        };
        write!(f, "{}", s)
    }
}

/// Per-query classification result; consumed immediately, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalIntent {
    #[serde(alias = "retrieval_mode")]
    pub mode: RetrievalMode,
    /// Search key, required for `section` and `figure_table`
    #[serde(default)]
    pub term: Option<String>,
}

impl RetrievalIntent {
    /// Fallback intent used whenever classification fails
    pub fn general() -> Self {
        Self {
            mode: RetrievalMode::General,
            term: None,
        }
    }

    /// Whether this mode is unusable without an extracted term
    pub fn requires_term(mode: RetrievalMode) -> bool {
        matches!(mode, RetrievalMode::Section | RetrievalMode::FigureTable)
    }
}

//
// ================= Plans =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

/// One step of a plan. Owned exclusively by its containing plan and
/// mutated in place by the task executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    /// Unique within a plan, sequential starting at 1
    pub task_id: u32,
    pub tool_name: String,
    #[serde(default)]
    pub tool_args: serde_json::Map<String, serde_json::Value>,
    /// The natural-language question this sub-task answers
    pub question: String,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Option<String>,
}

fn default_status() -> TaskStatus {
    TaskStatus::Pending
}

impl SubTask {
    pub fn new(
        task_id: u32,
        tool_name: impl Into<String>,
        tool_args: serde_json::Map<String, serde_json::Value>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            task_id,
            tool_name: tool_name.into(),
            tool_args,
            question: question.into(),
            status: TaskStatus::Pending,
            result: None,
        }
    }

    /// Status transitions are monotonic: only a pending task can settle.
    pub fn mark_completed(&mut self, result: String) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Completed;
            self.result = Some(result);
        }
    }

    pub fn mark_failed(&mut self, error: String) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Failed;
            self.result = Some(error);
        }
    }
}

/// An ordered list of tool-backed sub-tasks intended to jointly answer
/// a user query. Replaced wholesale by the replanner, never merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Planner rationale
    pub thought: String,
    pub tasks: Vec<SubTask>,
}

impl Plan {
    /// First pending task in declaration order. Declaration order is
    /// execution order.
    pub fn next_pending_index(&self) -> Option<usize> {
        self.tasks.iter().position(|t| t.status == TaskStatus::Pending)
    }

    pub fn task(&self, task_id: u32) -> Option<&SubTask> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    /// True when no task is pending
    pub fn all_settled(&self) -> bool {
        self.tasks.iter().all(|t| t.status != TaskStatus::Pending)
    }

    /// Task ids must be unique within a plan; they are the sole handle
    /// for cross-referencing completed work.
    pub fn validate_task_ids(&self) -> crate::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.task_id) {
                return Err(crate::error::AgentError::InvalidPlan(format!(
                    "duplicate task_id {} in plan",
                    task.task_id
                )));
            }
        }
        Ok(())
    }
}

//
// ================= Reflection =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    Success,
    PartialSuccess,
    Failure,
}

/// Post-hoc quality assessment of one completed sub-task's result.
/// Transient, one per control-loop iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reflection {
    pub assessment: Assessment,
    pub reasoning: String,
    #[serde(default)]
    pub suggestion_for_next_step: Option<String>,
    pub is_sufficient: bool,
}

impl Reflection {
    /// Vacuous success when there is nothing to criticize yet
    pub fn vacuous_success() -> Self {
        Self {
            assessment: Assessment::Success,
            reasoning: "No tasks to reflect on.".to_string(),
            suggestion_for_next_step: None,
            is_sufficient: true,
        }
    }

    pub fn failure(reasoning: impl Into<String>) -> Self {
        Self {
            assessment: Assessment::Failure,
            reasoning: reasoning.into(),
            suggestion_for_next_step: None,
            is_sufficient: false,
        }
    }
}

//
// ================= Planner Output =================
//

/// Exactly one of a plan or a direct chat reply.
///
/// The exclusivity is enforced at construction; deserialization goes
/// through the same check, so a payload with both or neither is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawPlannerOutput")]
pub struct PlannerOutput {
    plan: Option<Plan>,
    chat_response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlannerOutput {
    #[serde(default)]
    plan: Option<Plan>,
    #[serde(default)]
    chat_response: Option<String>,
}

impl TryFrom<RawPlannerOutput> for PlannerOutput {
    type Error = String;

    fn try_from(raw: RawPlannerOutput) -> std::result::Result<Self, Self::Error> {
        PlannerOutput::new(raw.plan, raw.chat_response)
    }
}

impl PlannerOutput {
    pub fn new(
        plan: Option<Plan>,
        chat_response: Option<String>,
    ) -> std::result::Result<Self, String> {
        match (&plan, &chat_response) {
            (Some(_), Some(_)) => {
                Err("either 'plan' or 'chat_response' can be provided, but not both".to_string())
            }
            (None, None) => {
                Err("either 'plan' or 'chat_response' must be provided".to_string())
            }
            _ => Ok(Self {
                plan,
                chat_response,
            }),
        }
    }

    pub fn from_plan(plan: Plan) -> Self {
        Self {
            plan: Some(plan),
            chat_response: None,
        }
    }

    pub fn from_chat(response: impl Into<String>) -> Self {
        Self {
            plan: None,
            chat_response: Some(response.into()),
        }
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn chat_response(&self) -> Option<&str> {
        self.chat_response.as_deref()
    }

    pub fn into_parts(self) -> (Option<Plan>, Option<String>) {
        (self.plan, self.chat_response)
    }
}
