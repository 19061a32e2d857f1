//! Conversation history and per-user long-term memory

pub mod history;
pub mod long_term;

pub use history::{ConversationHistory, ConversationMessage, MessageRole};
pub use long_term::{MemoryEntry, MemoryStore};
