//! Conversation sessions for follow-up queries

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Who sent a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Sources cited by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

/// A conversation bound to one collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub collection: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Summary returned when listing sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub collection: String,
    pub message_count: usize,
    pub last_activity: DateTime<Utc>,
}

/// In-process session registry
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, ChatSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session, or return the existing one with the same id
    pub fn create(&self, collection: &str, id: Option<String>) -> ChatSession {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        self.sessions
            .entry(id.clone())
            .or_insert_with(|| {
                let now = Utc::now();
                tracing::info!("Created chat session {} for '{}'", id, collection);
                ChatSession {
                    id,
                    collection: collection.to_string(),
                    messages: Vec::new(),
                    created_at: now,
                    last_activity: now,
                }
            })
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<ChatSession> {
        self.sessions.get(id).map(|s| s.clone())
    }

    /// Append a message and bump the session's activity time
    pub fn add_message(
        &self,
        id: &str,
        role: Role,
        content: impl Into<String>,
        sources: Vec<String>,
    ) -> Result<ChatMessage> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        let message = ChatMessage {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            sources,
        };
        session.last_activity = message.timestamp;
        session.messages.push(message.clone());
        Ok(message)
    }

    /// The last `window` messages as a prompt-ready transcript
    pub fn formatted_history(&self, id: &str, window: usize) -> Result<String> {
        let session = self
            .sessions
            .get(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;

        if session.messages.is_empty() {
            return Ok("No previous conversation.".to_string());
        }

        let skip = session.messages.len().saturating_sub(window);
        let lines: Vec<String> = session.messages[skip..]
            .iter()
            .map(|m| match m.role {
                Role::User => format!("Human: {}", m.content),
                Role::Assistant => format!("Assistant: {}", m.content),
            })
            .collect();
        Ok(lines.join("\n"))
    }

    /// Consecutive (user, assistant) pairs; an unanswered question is dropped
    pub fn chat_pairs(&self, id: &str) -> Result<Vec<(String, String)>> {
        let session = self
            .sessions
            .get(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;

        Ok(session
            .messages
            .windows(2)
            .filter(|w| w[0].role == Role::User && w[1].role == Role::Assistant)
            .map(|w| (w[0].content.clone(), w[1].content.clone()))
            .collect())
    }

    /// Drop sessions idle for longer than `max_age`; returns how many
    pub fn expire_older_than(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.last_activity >= cutoff);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::info!("Expired {} idle chat sessions", removed);
        }
        removed
    }

    pub fn delete(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Summaries of all sessions, most recently active first
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|s| SessionSummary {
                id: s.id.clone(),
                collection: s.collection.clone(),
                message_count: s.messages.len(),
                last_activity: s.last_activity,
            })
            .collect();
        summaries.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_is_idempotent() {
        let store = SessionStore::new();
        let first = store.create("docs", Some("s1".into()));
        store.add_message("s1", Role::User, "hi", vec![]).unwrap();
        let again = store.create("other", Some("s1".into()));
        assert_eq!(again.collection, "docs");
        assert_eq!(again.messages.len(), 1);
        assert_eq!(first.id, "s1");
    }

    #[test]
    fn test_history_window_and_labels() {
        let store = SessionStore::new();
        store.create("docs", Some("s".into()));
        assert_eq!(
            store.formatted_history("s", 10).unwrap(),
            "No previous conversation."
        );

        for i in 0..3 {
            store.add_message("s", Role::User, format!("q{}", i), vec![]).unwrap();
            store
                .add_message("s", Role::Assistant, format!("a{}", i), vec!["x.pdf".into()])
                .unwrap();
        }
        let history = store.formatted_history("s", 2).unwrap();
        assert_eq!(history, "Human: q2\nAssistant: a2");
        assert_eq!(store.chat_pairs("s").unwrap().len(), 3);
    }

    #[test]
    fn test_missing_session() {
        let store = SessionStore::new();
        let err = store.add_message("nope", Role::User, "hi", vec![]).unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
        assert!(!store.delete("nope"));
    }

    #[test]
    fn test_expiry() {
        let store = SessionStore::new();
        store.create("docs", Some("old".into()));
        store.create("docs", Some("new".into()));
        if let Some(mut s) = store.sessions.get_mut("old") {
            s.last_activity = Utc::now() - Duration::hours(48);
        }
        assert_eq!(store.expire_older_than(Duration::hours(24)), 1);
        assert!(store.get("old").is_none());
        assert_eq!(store.list().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends() {
        let store = std::sync::Arc::new(SessionStore::new());
        store.create("docs", Some("shared".into()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .add_message("shared", Role::User, format!("m{}", i), vec![])
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get("shared").unwrap().messages.len(), 8);
    }
}
