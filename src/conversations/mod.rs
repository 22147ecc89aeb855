//! Conversation and message storage.

pub mod error;
pub mod ids;
pub mod store;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use ids::{ConversationId, MessageId};
pub use store::{
    ConversationStore, InMemoryConversationStore, OpenedTurn, StoreFuture, StoreLimits, TURN_MESSAGES,
};
pub use types::{ChatTurn, Conversation, Message, Role};
