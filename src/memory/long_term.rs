//! Per-user long-term memory
//!
//! Durable-across-sessions facts keyed by user id. Writes happen when a
//! message carries an explicit remember marker; recall is lexical
//! overlap against the current query, newest-first on ties.

use crate::retrieval::store::tokenize;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

/// Markers that flag a message as a memory-write request
const REMEMBER_MARKERS: [&str; 2] = ["记住", "remember"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub memory_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub content: String,
}

impl MemoryEntry {
    fn new(content: String) -> Self {
        Self {
            memory_id: Uuid::new_v4(),
            created_at: Utc::now(),
            content,
        }
    }
}

/// In-memory store with one lock per user, so one user's writes never
/// block another user's recall.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, Arc<Mutex<Vec<MemoryEntry>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn user_entries(&self, user_id: &str) -> Arc<Mutex<Vec<MemoryEntry>>> {
        if let Some(entries) = self.users.read().await.get(user_id) {
            return entries.clone();
        }
        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_default().clone()
    }

    /// Store a fact for the user unconditionally.
    pub async fn remember(&self, user_id: &str, content: &str) -> Result<Uuid> {
        let entry = MemoryEntry::new(content.to_string());
        let id = entry.memory_id;
        let entries = self.user_entries(user_id).await;
        entries.lock().await.push(entry);
        info!(user_id = %user_id, memory_id = %id, "Memory stored");
        Ok(id)
    }

    /// Store the message only if it carries a remember marker.
    pub async fn maybe_remember(&self, user_id: &str, message: &str) -> Result<Option<Uuid>> {
        let lowered = message.to_lowercase();
        if !REMEMBER_MARKERS.iter().any(|m| lowered.contains(m)) {
            return Ok(None);
        }
        self.remember(user_id, message).await.map(Some)
    }

    /// Return up to `limit` memories relevant to the query, best match
    /// first. Memories sharing no tokens with the query are skipped.
    pub async fn recall(&self, user_id: &str, query: &str, limit: usize) -> Vec<String> {
        let query_tokens: Vec<String> = tokenize(query);
        let entries = self.user_entries(user_id).await;
        let entries = entries.lock().await;

        let mut scored: Vec<(usize, &MemoryEntry)> = entries
            .iter()
            .map(|entry| {
                let entry_tokens = tokenize(&entry.content);
                let overlap = query_tokens
                    .iter()
                    .filter(|t| entry_tokens.contains(*t))
                    .count();
                (overlap, entry)
            })
            .filter(|(overlap, _)| *overlap > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.created_at.cmp(&a.1.created_at)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, entry)| entry.content.clone())
            .collect()
    }

    /// Render recalled memories as prompt-ready text, one per line.
    pub async fn formatted_for_prompt(&self, user_id: &str, query: &str, limit: usize) -> String {
        let memories = self.recall(user_id, query, limit).await;
        if memories.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        for memory in memories {
            out.push_str("- ");
            out.push_str(&memory);
            out.push('\n');
        }
        out
    }

    pub async fn count(&self, user_id: &str) -> usize {
        let entries = self.user_entries(user_id).await;
        let entries = entries.lock().await;
        entries.len()
    }
}
