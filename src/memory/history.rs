//! Per-session conversation history
//!
//! Rolling window of user/assistant turns, rendered into the planner
//! prompt so follow-up questions resolve against earlier turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single message in the conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub message_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: String) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            content,
        }
    }
}

/// Conversation history for one session
///
/// Bounded by message count; the oldest messages are evicted first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    messages: VecDeque<ConversationMessage>,
    max_messages: usize,
}

impl ConversationHistory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            messages: VecDeque::new(),
            max_messages,
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(ConversationMessage::new(MessageRole::User, content.into()));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(ConversationMessage::new(
            MessageRole::Assistant,
            content.into(),
        ));
    }

    fn push(&mut self, message: ConversationMessage) {
        self.messages.push_back(message);
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }
        self.updated_at = Utc::now();
    }

    pub fn messages(&self) -> impl Iterator<Item = &ConversationMessage> {
        self.messages.iter()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Render history as prompt-ready text, oldest first.
    pub fn formatted_context(&self) -> String {
        let mut out = String::new();
        for msg in &self.messages {
            let role = match msg.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
            };
            out.push_str(role);
            out.push_str(": ");
            out.push_str(&msg.content);
            out.push('\n');
        }
        out
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_kept_in_turn_order() {
        let mut history = ConversationHistory::new(10);
        history.push_user("比较宁德时代和特斯拉");
        history.push_assistant("两家公司的对比如下...");

        let context = history.formatted_context();
        let user_pos = context.find("User: 比较宁德时代和特斯拉").unwrap();
        let assistant_pos = context.find("Assistant: 两家公司的对比如下...").unwrap();
        assert!(user_pos < assistant_pos);
    }

    #[test]
    fn test_oldest_messages_evicted_at_cap() {
        let mut history = ConversationHistory::new(4);
        for i in 0..6 {
            history.push_user(format!("question {}", i));
        }

        assert_eq!(history.message_count(), 4);
        let first = history.messages().next().unwrap();
        assert_eq!(first.content, "question 2");
    }

    #[test]
    fn test_empty_history_formats_to_empty_string() {
        let history = ConversationHistory::new(10);
        assert!(history.is_empty());
        assert_eq!(history.formatted_context(), "");
    }
}
