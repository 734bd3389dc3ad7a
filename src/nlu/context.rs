//! Conversation history kept for contextual understanding

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Capitalised label used in formatted history
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

/// A single conversation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

/// Rolling window of recent conversation turns
#[derive(Debug, Clone)]
pub struct ConversationContext {
    max_turns: usize,
    history: VecDeque<ConversationMessage>,
}

impl ConversationContext {
    /// Create a context that remembers `max_turns` user/assistant exchanges
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        tracing::debug!(max_turns, "conversation context initialized");
        Self {
            max_turns,
            history: VecDeque::with_capacity(max_turns * 2),
        }
    }

    /// Record a user message; empty messages are ignored
    pub fn add_user_message(&mut self, message: &str) {
        self.push(Role::User, message);
    }

    /// Record an assistant message; empty messages are ignored
    pub fn add_assistant_message(&mut self, message: &str) {
        self.push(Role::Assistant, message);
    }

    fn push(&mut self, role: Role, message: &str) {
        if message.is_empty() || self.max_turns == 0 {
            return;
        }

        while self.history.len() >= self.max_turns * 2 {
            self.history.pop_front();
        }

        tracing::trace!(?role, preview = %preview(message), "added message to context");
        self.history.push_back(ConversationMessage {
            role,
            content: message.to_string(),
        });
    }

    /// Messages in chronological order
    #[must_use]
    pub fn history(&self) -> Vec<ConversationMessage> {
        self.history.iter().cloned().collect()
    }

    /// History as `Role: content` lines
    #[must_use]
    pub fn formatted_history(&self) -> String {
        self.history
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Forget all messages
    pub fn clear(&mut self) {
        self.history.clear();
        tracing::info!("conversation context cleared");
    }

    /// Most recent user message, or an empty string
    #[must_use]
    pub fn last_user_message(&self) -> &str {
        self.last_of(Role::User)
    }

    /// Most recent assistant message, or an empty string
    #[must_use]
    pub fn last_assistant_message(&self) -> &str {
        self.last_of(Role::Assistant)
    }

    fn last_of(&self, role: Role) -> &str {
        self.history
            .iter()
            .rev()
            .find(|m| m.role == role)
            .map_or("", |m| m.content.as_str())
    }

    /// Number of stored messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether no messages are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// First 50 characters of a message for log lines
fn preview(message: &str) -> String {
    message.chars().take(50).collect()
}
