//! Error types for the conversation store.

use thiserror::Error;

use super::ids::ConversationId;

/// Errors returned by conversation store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No conversation with this identifier exists.
    #[error("conversation not found: {0}")]
    NotFound(ConversationId),

    /// The message failed validation and was not stored.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The conversation already holds the maximum number of messages.
    #[error("conversation {id} reached its limit of {limit} messages")]
    CapacityExceeded {
        /// Conversation that is full.
        id: ConversationId,
        /// Configured message limit.
        limit: usize,
    },
}

/// Result type for conversation store operations.
pub type StoreResult<T> = Result<T, StoreError>;
