//! Single-step task executor
//!
//! Advances exactly one pending task per invocation so the control loop
//! can interleave reflection between every tool call. Tool failure is
//! recorded on the task, never propagated upward.

use crate::models::{Plan, TaskStatus};
use crate::tools::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// One task was advanced to completed or failed
    Advanced { task_id: u32, status: TaskStatus },
    /// Nothing pending; the plan is settled
    NoPendingTasks,
}

pub struct TaskExecutor {
    registry: Arc<ToolRegistry>,
    tool_timeout: Duration,
}

impl TaskExecutor {
    pub fn new(registry: Arc<ToolRegistry>, tool_timeout: Duration) -> Self {
        Self {
            registry,
            tool_timeout,
        }
    }

    /// Run the first pending task in declaration order. A no-op when
    /// nothing is pending.
    pub async fn execute_next(&self, plan: &mut Plan) -> ExecutionOutcome {
        let index = match plan.next_pending_index() {
            Some(index) => index,
            None => {
                info!("No pending tasks found");
                return ExecutionOutcome::NoPendingTasks;
            }
        };

        let (task_id, tool_name, tool_args) = {
            let task = &plan.tasks[index];
            (task.task_id, task.tool_name.clone(), task.tool_args.clone())
        };

        info!(task_id, tool = %tool_name, "Executing task");

        let invocation = self.registry.invoke(&tool_name, &tool_args);
        let outcome = tokio::time::timeout(self.tool_timeout, invocation).await;

        let task = &mut plan.tasks[index];
        let status = match outcome {
            Ok(Ok(result)) => {
                task.mark_completed(result);
                TaskStatus::Completed
            }
            Ok(Err(e)) => {
                warn!(task_id, error = %e, "Tool invocation failed");
                task.mark_failed(e.to_string());
                TaskStatus::Failed
            }
            Err(_) => {
                warn!(task_id, tool = %tool_name, "Tool invocation timed out");
                task.mark_failed(format!(
                    "tool '{}' timed out after {:?}",
                    tool_name, self.tool_timeout
                ));
                TaskStatus::Failed
            }
        };

        ExecutionOutcome::Advanced { task_id, status }
    }
}
