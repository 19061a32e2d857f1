//! Error types for the report analysis agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Planning error: {0}")]
    PlanningError(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Replanning error: {0}")]
    ReplanningError(String),

    #[error("Retrieval error: {0}")]
    RetrievalError(String),

    #[error("Segment store error: {0}")]
    StoreError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Memory error: {0}")]
    MemoryError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
