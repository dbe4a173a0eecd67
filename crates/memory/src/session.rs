//! Per-conversation working memory.
//!
//! Each open conversation owns a bounded deque of recent messages and the
//! rolling summary.  Sessions are keyed by conversation id in a shared map,
//! never process-wide, and each carries its own lock so concurrent
//! conversations never serialise against each other.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: Role,
    pub content: String,
}

impl TurnMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sliding window plus rolling summary for one conversation.
#[derive(Debug)]
pub struct ConversationSession {
    window: VecDeque<TurnMessage>,
    summary: String,
    /// Maximum messages retained: twice the configured pair count.
    max_messages: usize,
}

impl ConversationSession {
    pub fn new(window_pairs: usize) -> Self {
        Self {
            window: VecDeque::new(),
            summary: String::new(),
            max_messages: window_pairs * 2,
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn messages(&self) -> impl Iterator<Item = &TurnMessage> {
        self.window.iter()
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn set_summary(&mut self, summary: String) {
        self.summary = summary;
    }

    /// Append one exchange, trimming the window back to capacity.
    pub fn push_pair(&mut self, user: &str, assistant: &str) {
        self.window.push_back(TurnMessage::user(user));
        self.window.push_back(TurnMessage::assistant(assistant));
        while self.window.len() > self.max_messages {
            self.window.pop_front();
        }
    }

    /// Overwrite the window with the tail of a persisted message sequence.
    pub fn replace_window(&mut self, messages: Vec<TurnMessage>) {
        let skip = messages.len().saturating_sub(self.max_messages);
        self.window = messages.into_iter().skip(skip).collect();
    }

    /// Render the window for prompt injection, one `role: content` line per
    /// message.
    pub fn format_recent(&self) -> String {
        if self.window.is_empty() {
            return "No recent messages.".to_string();
        }
        self.window
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Conversation-id-keyed registry of live sessions.
pub struct SessionMap {
    window_pairs: usize,
    inner: Mutex<HashMap<Uuid, Arc<Mutex<ConversationSession>>>>,
}

impl SessionMap {
    pub fn new(window_pairs: usize) -> Self {
        Self {
            window_pairs,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the session for a conversation, creating an empty one on first
    /// touch.
    pub async fn open(&self, conversation_id: Uuid) -> Arc<Mutex<ConversationSession>> {
        let mut map = self.inner.lock().await;
        Arc::clone(
            map.entry(conversation_id)
                .or_insert_with(|| Arc::new(Mutex::new(ConversationSession::new(self.window_pairs)))),
        )
    }

    /// Install a fresh empty session, discarding any previous state.
    pub async fn reset(&self, conversation_id: Uuid) -> Arc<Mutex<ConversationSession>> {
        let session = Arc::new(Mutex::new(ConversationSession::new(self.window_pairs)));
        self.inner
            .lock()
            .await
            .insert(conversation_id, Arc::clone(&session));
        session
    }

    pub async fn remove(&self, conversation_id: Uuid) {
        self.inner.lock().await.remove(&conversation_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_never_exceeds_twice_the_pair_count() {
        let mut session = ConversationSession::new(10);
        for turn in 0..12 {
            session.push_pair(&format!("u{turn}"), &format!("a{turn}"));
            assert!(session.len() <= 20);
        }

        // After 12 turns only the last 10 pairs remain, in insertion order.
        assert_eq!(session.len(), 20);
        let contents: Vec<&str> = session.messages().map(|m| m.content.as_str()).collect();
        assert_eq!(contents[0], "u2");
        assert_eq!(contents[1], "a2");
        assert_eq!(contents[18], "u11");
        assert_eq!(contents[19], "a11");
    }

    #[test]
    fn replace_window_keeps_only_the_tail() {
        let mut session = ConversationSession::new(2);
        let messages: Vec<TurnMessage> = (0..6)
            .map(|i| TurnMessage::user(format!("m{i}")))
            .collect();
        session.replace_window(messages);

        let contents: Vec<&str> = session.messages().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4", "m5"]);
    }

    #[test]
    fn format_recent_falls_back_when_empty() {
        let session = ConversationSession::new(10);
        assert_eq!(session.format_recent(), "No recent messages.");
    }

    #[test]
    fn format_recent_renders_role_prefixed_lines() {
        let mut session = ConversationSession::new(10);
        session.push_pair("hi", "hello!");
        assert_eq!(session.format_recent(), "user: hi\nassistant: hello!");
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_conversation() {
        let map = SessionMap::new(10);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        map.open(a).await.lock().await.push_pair("from a", "ok");
        assert!(map.open(b).await.lock().await.is_empty());
        assert_eq!(map.open(a).await.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn reset_discards_previous_window() {
        let map = SessionMap::new(10);
        let id = Uuid::new_v4();
        map.open(id).await.lock().await.push_pair("old", "old");
        map.reset(id).await;
        assert!(map.open(id).await.lock().await.is_empty());
    }
}
