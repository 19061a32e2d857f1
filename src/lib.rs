//! Financial Research Report Agent
//!
//! A retrieval-augmented QA agent over financial research reports that:
//! - Routes each query to an intent-specific retrieval strategy
//! - Reranks candidates and keeps only the strongest evidence
//! - Decomposes complex questions into tool-backed subtasks
//! - Reflects on every tool result and replans on failure
//! - Remembers user facts across sessions on explicit request
//!
//! UNIFIED LOOP:
//! INPUT → PLAN → EXECUTE → REFLECT → REPLAN? → SYNTHESIZE

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod models;
pub mod retrieval;
pub mod tools;

pub use error::{AgentError, Result};

// Re-export common types
pub use agent::{AgentLoop, LoopState, TurnOutcome};
pub use models::*;
pub use retrieval::SmartRetriever;
