//! Types for conversation management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ConversationId, MessageId};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user of the copilot.
    User,
    /// Model reply.
    Assistant,
    /// Instructions injected ahead of the dialogue.
    System,
}

impl Role {
    /// Wire name of the role, as used by the completion API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Whether messages with this role must carry non-empty content.
    #[must_use]
    pub const fn requires_content(self) -> bool {
        matches!(self, Self::User | Self::Assistant)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversation metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier.
    pub id: ConversationId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Optional display title.
    pub title: Option<String>,
}

impl Conversation {
    /// Create metadata for a fresh conversation.
    #[must_use]
    pub fn new(title: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: ConversationId::new(),
            created_at: now,
            title,
        }
    }
}

/// One stored turn of a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier.
    pub id: MessageId,
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Append timestamp.
    pub created_at: DateTime<Utc>,
}

/// A role and its content, not bound to any stored conversation.
///
/// This is what the completion gateway consumes and produces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatTurn {
    /// Build a turn from a role and content.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Shorthand for a system turn.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Shorthand for a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Shorthand for an assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}
