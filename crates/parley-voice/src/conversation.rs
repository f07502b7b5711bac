//! Conversation turns and history windowing.
//!
//! The caller owns the conversation; nothing here is persisted. `window` keeps the
//! most recent turns so downstream completion cost stays bounded no matter how much
//! history a client sends.

use serde::{Deserialize, Serialize};

/// Number of caller-visible turns forwarded to the completion service.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Who authored a turn. Serialized lowercase, matching the chat-completions wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Chronological sequence of turns.
pub type Conversation = Vec<ConversationTurn>;

/// Last `limit` turns of `conversation`, in original order.
///
/// Borrows the retained suffix; a conversation already within the limit is returned whole.
pub fn window(conversation: &[ConversationTurn], limit: usize) -> &[ConversationTurn] {
    let start = conversation.len().saturating_sub(limit);
    &conversation[start..]
}
