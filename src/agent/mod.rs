//! Control loop - plan, execute, reflect, replan, synthesize
//!
//! A strict iterate-until-reflection-is-satisfied state machine:
//! PLANNING → {CHAT_END | DISPATCH}; EXECUTING → REFLECTING;
//! REFLECTING → {REPLANNING | EXECUTING | SYNTHESIZING};
//! REPLANNING → EXECUTING. A replan budget and an iteration cap bound
//! the EXECUTING/REPLANNING cycle.

pub mod executor;
pub mod planner;
pub mod reflector;
pub mod replanner;
pub mod synthesizer;

use crate::config::LoopLimits;
use crate::models::{Assessment, Plan};
use crate::Result;
use executor::{ExecutionOutcome, TaskExecutor};
use planner::Planner;
use reflector::Reflector;
use replanner::Replanner;
use synthesizer::Synthesizer;
use tracing::{info, warn};

/// Message used whenever the planner cannot produce a usable output
pub const CLARIFICATION_MESSAGE: &str =
    "I'm sorry, I'm having trouble understanding your request. Could you please rephrase it?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Planning,
    Dispatch,
    Executing,
    Reflecting,
    Replanning,
    Synthesizing,
    ChatEnd,
    End,
}

/// Outcome of one fully processed user turn
#[derive(Debug)]
pub struct TurnOutcome {
    pub reply: String,
    /// States visited, in order
    pub states: Vec<LoopState>,
    /// Final plan, None for chat-only turns
    pub plan: Option<Plan>,
    pub replans: u32,
}

pub struct AgentLoop {
    planner: Box<dyn Planner>,
    executor: TaskExecutor,
    reflector: Reflector,
    replanner: Replanner,
    synthesizer: Synthesizer,
    limits: LoopLimits,
}

impl AgentLoop {
    pub fn new(
        planner: Box<dyn Planner>,
        executor: TaskExecutor,
        reflector: Reflector,
        replanner: Replanner,
        synthesizer: Synthesizer,
        limits: LoopLimits,
    ) -> Self {
        Self {
            planner,
            executor,
            reflector,
            replanner,
            synthesizer,
            limits,
        }
    }

    /// Run one user turn to completion.
    pub async fn run_turn(&self, query: &str, history: &str, memories: &str) -> Result<TurnOutcome> {
        let mut states = vec![LoopState::Planning];
        info!(query = %query, "Turn started");

        // === PLANNING ===
        let mut plan = match self.planner.plan(query, history, memories).await {
            Ok(output) => {
                let (plan, chat_response) = output.into_parts();
                match (plan, chat_response) {
                    (None, Some(reply)) => {
                        states.push(LoopState::ChatEnd);
                        return Ok(TurnOutcome {
                            reply,
                            states,
                            plan: None,
                            replans: 0,
                        });
                    }
                    (Some(plan), None) if !plan.tasks.is_empty() => plan,
                    // A plan with no tasks is as unusable as no plan.
                    _ => {
                        warn!("Planner produced an empty plan");
                        states.push(LoopState::ChatEnd);
                        return Ok(TurnOutcome {
                            reply: CLARIFICATION_MESSAGE.to_string(),
                            states,
                            plan: None,
                            replans: 0,
                        });
                    }
                }
            }
            Err(e) => {
                // Parse/model failures are non-fatal: the turn degrades
                // to a clarification request.
                warn!(error = %e, "Planning failed, requesting clarification");
                states.push(LoopState::ChatEnd);
                return Ok(TurnOutcome {
                    reply: CLARIFICATION_MESSAGE.to_string(),
                    states,
                    plan: None,
                    replans: 0,
                });
            }
        };

        if plan.tasks.len() > self.limits.max_plan_tasks {
            warn!(tasks = plan.tasks.len(), "Plan exceeds task cap, requesting clarification");
            states.push(LoopState::ChatEnd);
            return Ok(TurnOutcome {
                reply: CLARIFICATION_MESSAGE.to_string(),
                states,
                plan: None,
                replans: 0,
            });
        }

        states.push(LoopState::Dispatch);
        info!(tasks = plan.tasks.len(), thought = %plan.thought, "Plan dispatched");

        // === EXECUTE / REFLECT / REPLAN ===
        let mut replans: u32 = 0;
        let mut iterations: usize = 0;

        loop {
            // Termination guard for adversarial or persistently failing
            // tool results.
            let max_iterations =
                plan.tasks.len().max(1) * (self.limits.replan_budget as usize + 1);
            if iterations >= max_iterations {
                warn!(iterations, "Iteration cap reached, synthesizing with partial results");
                break;
            }
            iterations += 1;

            states.push(LoopState::Executing);
            let last_task_id = match self.executor.execute_next(&mut plan).await {
                ExecutionOutcome::Advanced { task_id, .. } => task_id,
                ExecutionOutcome::NoPendingTasks => break,
            };

            states.push(LoopState::Reflecting);
            let reflection = self.reflector.reflect(&plan, Some(last_task_id)).await;

            if reflection.assessment == Assessment::Failure {
                if replans >= self.limits.replan_budget {
                    warn!(replans, "Replan budget exhausted, synthesizing with partial results");
                    break;
                }

                states.push(LoopState::Replanning);
                replans += 1;

                match self.replanner.replan(&plan, &reflection).await {
                    Ok(new_plan) if new_plan.tasks.len() <= self.limits.max_plan_tasks => {
                        // Wholesale replacement; the old plan's slot is
                        // fully overwritten, never merged.
                        info!(tasks = new_plan.tasks.len(), "Installing replacement plan");
                        plan = new_plan;
                    }
                    Ok(new_plan) => {
                        warn!(
                            tasks = new_plan.tasks.len(),
                            "Replacement plan exceeds task cap, keeping current plan"
                        );
                    }
                    Err(e) => {
                        // Keep the current plan; its remaining pending
                        // tasks (if any) still run.
                        warn!(error = %e, "Replanning failed, keeping current plan");
                    }
                }
                // REPLANNING always returns to EXECUTING; a zero-task
                // replacement is handled by the no-pending check there.
                continue;
            }

            if plan.all_settled() {
                break;
            }
        }

        // === SYNTHESIZE ===
        states.push(LoopState::Synthesizing);
        let reply = self.synthesizer.synthesize(query, &plan).await;
        states.push(LoopState::End);

        info!(replans, "Turn complete");
        Ok(TurnOutcome {
            reply,
            states,
            plan: Some(plan),
            replans,
        })
    }
}
