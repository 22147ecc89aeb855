//! Conversation and message storage.
//!
//! [`ConversationStore`] is the seam request handlers depend on. The only
//! implementation today keeps everything in process memory and loses it on
//! restart; a durable backend implements the same trait.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

use super::error::{StoreError, StoreResult};
use super::ids::{ConversationId, MessageId};
use super::types::{Conversation, Message, Role};

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Messages a chat turn adds: the user message and the reply.
pub const TURN_MESSAGES: usize = 2;

/// User message that opened a chat turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenedTurn {
    /// Conversation the message went to.
    pub conversation: Conversation,
    /// Every message of the conversation, ending with the new user message.
    pub history: Vec<Message>,
}

/// Trait for conversation and message storage.
pub trait ConversationStore: Send + Sync {
    /// Create a new conversation with an optional title.
    fn create_conversation(&self, title: Option<String>) -> StoreFuture<'_, StoreResult<Conversation>>;

    /// Get a conversation by ID.
    fn get_conversation(&self, id: ConversationId) -> StoreFuture<'_, StoreResult<Conversation>>;

    /// List all conversations, newest first.
    fn list_conversations(&self) -> StoreFuture<'_, StoreResult<Vec<Conversation>>>;

    /// Replace the title of a conversation. A blank title clears it.
    fn set_title(
        &self,
        id: ConversationId,
        title: Option<String>,
    ) -> StoreFuture<'_, StoreResult<Conversation>>;

    /// Append a message at the end of a conversation.
    fn append_message(
        &self,
        id: ConversationId,
        role: Role,
        content: String,
    ) -> StoreFuture<'_, StoreResult<Message>>;

    /// List the messages of a conversation in append order.
    fn list_messages(&self, id: ConversationId) -> StoreFuture<'_, StoreResult<Vec<Message>>>;

    /// Append the user message of a chat turn.
    ///
    /// Without `id` the conversation is created in the same step, titled
    /// `title`. The message is stored only if the conversation keeps room for
    /// [`TURN_MESSAGES`]; a rejected turn creates and stores nothing.
    fn begin_turn(
        &self,
        id: Option<ConversationId>,
        title: Option<String>,
        content: String,
    ) -> StoreFuture<'_, StoreResult<OpenedTurn>>;
}

/// Bounds applied to every conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreLimits {
    /// Maximum number of messages held by one conversation.
    pub max_messages_per_conversation: usize,
    /// Maximum message length, in characters.
    pub max_content_chars: usize,
}

impl StoreLimits {
    /// Default message count limit.
    pub const DEFAULT_MAX_MESSAGES: usize = 1_000;
    /// Default message length limit.
    pub const DEFAULT_MAX_CONTENT_CHARS: usize = 32_000;
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_messages_per_conversation: Self::DEFAULT_MAX_MESSAGES,
            max_content_chars: Self::DEFAULT_MAX_CONTENT_CHARS,
        }
    }
}

struct ConversationEntry {
    conversation: Conversation,
    messages: Vec<Message>,
    /// Insertion rank, breaks `created_at` ties when listing.
    sequence: u64,
}

impl ConversationEntry {
    const fn new(conversation: Conversation, sequence: u64) -> Self {
        Self {
            conversation,
            messages: Vec::new(),
            sequence,
        }
    }

    fn push(&mut self, role: Role, content: String) -> Message {
        // Wall clock may step backwards; keep the sequence non-decreasing.
        let now = Utc::now();
        let created_at = self
            .messages
            .last()
            .map_or(now, |last| last.created_at.max(now));

        let message = Message {
            id: MessageId::new(),
            conversation_id: self.conversation.id,
            role,
            content,
            created_at,
        };
        self.messages.push(message.clone());
        tracing::debug!(
            conversation_id = %self.conversation.id,
            role = %role,
            position = self.messages.len(),
            "Message appended"
        );
        message
    }

    fn opened(&self) -> OpenedTurn {
        OpenedTurn {
            conversation: self.conversation.clone(),
            history: self.messages.clone(),
        }
    }
}

/// In-memory implementation of [`ConversationStore`].
///
/// Each conversation lives in its own map slot. An append holds that slot's
/// write guard until the message is pushed, so concurrent appends to one
/// conversation are serialized and never interleave or get lost.
#[derive(Default)]
pub struct InMemoryConversationStore {
    entries: DashMap<ConversationId, ConversationEntry>,
    next_sequence: AtomicU64,
    limits: StoreLimits,
}

impl InMemoryConversationStore {
    /// Create an empty store with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with the given limits.
    #[must_use]
    pub fn with_limits(limits: StoreLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Number of conversations held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no conversation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn new_entry(&self, title: Option<String>) -> ConversationEntry {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        ConversationEntry::new(Conversation::new(normalize_title(title), Utc::now()), sequence)
    }

    fn validate(&self, role: Role, content: &str) -> StoreResult<()> {
        if role.requires_content() && content.trim().is_empty() {
            return Err(StoreError::InvalidMessage(format!(
                "{role} message content must not be empty"
            )));
        }

        let chars = content.chars().count();
        if chars > self.limits.max_content_chars {
            return Err(StoreError::InvalidMessage(format!(
                "message is {chars} characters long, limit is {}",
                self.limits.max_content_chars
            )));
        }

        Ok(())
    }

    fn ensure_room(&self, entry: &ConversationEntry, needed: usize) -> StoreResult<()> {
        let limit = self.limits.max_messages_per_conversation;
        if entry.messages.len().saturating_add(needed) > limit {
            return Err(StoreError::CapacityExceeded {
                id: entry.conversation.id,
                limit,
            });
        }
        Ok(())
    }
}

fn normalize_title(title: Option<String>) -> Option<String> {
    title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

impl ConversationStore for InMemoryConversationStore {
    fn create_conversation(&self, title: Option<String>) -> StoreFuture<'_, StoreResult<Conversation>> {
        Box::pin(async move {
            let entry = self.new_entry(title);
            let conversation = entry.conversation.clone();
            self.entries.insert(conversation.id, entry);
            tracing::info!(conversation_id = %conversation.id, "Conversation created");
            Ok(conversation)
        })
    }

    fn get_conversation(&self, id: ConversationId) -> StoreFuture<'_, StoreResult<Conversation>> {
        Box::pin(async move {
            self.entries
                .get(&id)
                .map(|entry| entry.conversation.clone())
                .ok_or(StoreError::NotFound(id))
        })
    }

    fn list_conversations(&self) -> StoreFuture<'_, StoreResult<Vec<Conversation>>> {
        Box::pin(async move {
            let mut ranked: Vec<(u64, Conversation)> = self
                .entries
                .iter()
                .map(|entry| (entry.sequence, entry.conversation.clone()))
                .collect();
            ranked.sort_by(|(seq_a, a), (seq_b, b)| {
                b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
            });
            Ok(ranked.into_iter().map(|(_, conversation)| conversation).collect())
        })
    }

    fn set_title(
        &self,
        id: ConversationId,
        title: Option<String>,
    ) -> StoreFuture<'_, StoreResult<Conversation>> {
        Box::pin(async move {
            let mut entry = self.entries.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            entry.conversation.title = normalize_title(title);
            Ok::<_, StoreError>(entry.conversation.clone())
        })
    }

    fn append_message(
        &self,
        id: ConversationId,
        role: Role,
        content: String,
    ) -> StoreFuture<'_, StoreResult<Message>> {
        Box::pin(async move {
            let mut entry = self.entries.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            self.validate(role, &content)?;
            self.ensure_room(&entry, 1)?;
            Ok::<_, StoreError>(entry.push(role, content))
        })
    }

    fn list_messages(&self, id: ConversationId) -> StoreFuture<'_, StoreResult<Vec<Message>>> {
        Box::pin(async move {
            self.entries
                .get(&id)
                .map(|entry| entry.messages.clone())
                .ok_or(StoreError::NotFound(id))
        })
    }

    fn begin_turn(
        &self,
        id: Option<ConversationId>,
        title: Option<String>,
        content: String,
    ) -> StoreFuture<'_, StoreResult<OpenedTurn>> {
        Box::pin(async move {
            if let Some(id) = id {
                let mut entry = self.entries.get_mut(&id).ok_or(StoreError::NotFound(id))?;
                self.validate(Role::User, &content)?;
                self.ensure_room(&entry, TURN_MESSAGES)?;
                entry.push(Role::User, content);
                return Ok(entry.opened());
            }

            self.validate(Role::User, &content)?;
            let mut entry = self.new_entry(title);
            self.ensure_room(&entry, TURN_MESSAGES)?;
            entry.push(Role::User, content);

            let opened = entry.opened();
            self.entries.insert(opened.conversation.id, entry);
            tracing::info!(conversation_id = %opened.conversation.id, "Conversation created");
            Ok::<_, StoreError>(opened)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = InMemoryConversationStore::new();
        let conversation = store.create_conversation(None).await.unwrap();

        for i in 0..50 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            store
                .append_message(conversation.id, role, format!("message {i}"))
                .await
                .unwrap();
        }

        let messages = store.list_messages(conversation.id).await.unwrap();
        assert_eq!(messages.len(), 50);
        for (i, message) in messages.iter().enumerate() {
            assert_eq!(message.content, format!("message {i}"));
            assert_eq!(message.conversation_id, conversation.id);
        }
        assert!(messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn test_list_messages_is_idempotent() {
        let store = InMemoryConversationStore::new();
        let conversation = store.create_conversation(None).await.unwrap();
        store
            .append_message(conversation.id, Role::User, "hello".to_string())
            .await
            .unwrap();

        let first = store.list_messages(conversation.id).await.unwrap();
        let second = store.list_messages(conversation.id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_returned_messages_are_copies() {
        let store = InMemoryConversationStore::new();
        let conversation = store.create_conversation(None).await.unwrap();
        store
            .append_message(conversation.id, Role::User, "hello".to_string())
            .await
            .unwrap();

        let mut listed = store.list_messages(conversation.id).await.unwrap();
        listed[0].content = "tampered".to_string();
        listed.clear();

        let fresh = store.list_messages(conversation.id).await.unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].content, "hello");
    }

    #[tokio::test]
    async fn test_append_unknown_conversation() {
        let store = InMemoryConversationStore::new();
        let existing = store.create_conversation(None).await.unwrap();
        let unknown = ConversationId::new();

        let err = store
            .append_message(unknown, Role::User, "hello".to_string())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound(unknown));

        assert_eq!(store.len(), 1);
        assert!(store.list_messages(existing.id).await.unwrap().is_empty());
        assert_eq!(
            store.list_messages(unknown).await.unwrap_err(),
            StoreError::NotFound(unknown)
        );
    }

    #[tokio::test]
    async fn test_conversation_ids_are_unique() {
        let store = InMemoryConversationStore::new();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let conversation = store.create_conversation(None).await.unwrap();
            assert!(seen.insert(conversation.id));
        }
        assert_eq!(store.len(), 200);
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let store = InMemoryConversationStore::new();
        let conversation = store.create_conversation(None).await.unwrap();

        let err = store
            .append_message(conversation.id, Role::User, "   ".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidMessage(_)));

        // System messages may be empty.
        store
            .append_message(conversation.id, Role::System, String::new())
            .await
            .unwrap();
        assert_eq!(store.list_messages(conversation.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_limits_enforced() {
        let store = InMemoryConversationStore::with_limits(StoreLimits {
            max_messages_per_conversation: 2,
            max_content_chars: 5,
        });
        let conversation = store.create_conversation(None).await.unwrap();

        let err = store
            .append_message(conversation.id, Role::User, "too long".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidMessage(_)));

        for _ in 0..2 {
            store
                .append_message(conversation.id, Role::User, "ok".to_string())
                .await
                .unwrap();
        }
        let err = store
            .append_message(conversation.id, Role::User, "ok".to_string())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::CapacityExceeded {
                id: conversation.id,
                limit: 2
            }
        );
        assert_eq!(store.list_messages(conversation.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_titles() {
        let store = InMemoryConversationStore::new();
        let conversation = store
            .create_conversation(Some("  First chat ".to_string()))
            .await
            .unwrap();
        assert_eq!(conversation.title.as_deref(), Some("First chat"));

        let renamed = store
            .set_title(conversation.id, Some("Renamed".to_string()))
            .await
            .unwrap();
        assert_eq!(renamed.title.as_deref(), Some("Renamed"));

        let cleared = store.set_title(conversation.id, Some(" ".to_string())).await.unwrap();
        assert_eq!(cleared.title, None);
        assert_eq!(store.get_conversation(conversation.id).await.unwrap(), cleared);
    }

    #[tokio::test]
    async fn test_list_conversations() {
        let store = InMemoryConversationStore::new();
        let a = store.create_conversation(Some("a".to_string())).await.unwrap();
        let b = store.create_conversation(Some("b".to_string())).await.unwrap();

        let listed = store.list_conversations().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert!(listed.contains(&a));
        assert!(listed.contains(&b));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_lose_nothing() {
        let store = Arc::new(InMemoryConversationStore::new());
        let conversation = store.create_conversation(None).await.unwrap();

        let mut handles = Vec::new();
        for task in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    store
                        .append_message(conversation.id, Role::User, format!("{task}-{i}"))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let messages = store.list_messages(conversation.id).await.unwrap();
        assert_eq!(messages.len(), 200);

        // Each task's own messages keep their relative order.
        for task in 0..8 {
            let prefix = format!("{task}-");
            let own: Vec<&str> = messages
                .iter()
                .filter_map(|m| m.content.strip_prefix(&prefix))
                .collect();
            let expected: Vec<String> = (0..25).map(|i| i.to_string()).collect();
            assert_eq!(own, expected);
        }
    }

    #[tokio::test]
    async fn test_unknown_id_wins_over_invalid_content() {
        let store = InMemoryConversationStore::with_limits(StoreLimits {
            max_messages_per_conversation: 10,
            max_content_chars: 5,
        });
        let unknown = ConversationId::new();

        for content in [String::new(), "   ".to_string(), "far too long".to_string()] {
            let err = store
                .append_message(unknown, Role::User, content)
                .await
                .unwrap_err();
            assert_eq!(err, StoreError::NotFound(unknown));
        }

        let err = store
            .begin_turn(Some(unknown), None, String::new())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound(unknown));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_begin_turn_creates_conversation() {
        let store = InMemoryConversationStore::new();

        let opened = store
            .begin_turn(None, Some(" Intro ".to_string()), "hello".to_string())
            .await
            .unwrap();
        assert_eq!(opened.conversation.title.as_deref(), Some("Intro"));
        assert_eq!(opened.history.len(), 1);
        assert_eq!(opened.history[0].role, Role::User);
        assert_eq!(opened.history[0].conversation_id, opened.conversation.id);

        assert_eq!(store.len(), 1);
        assert_eq!(
            store.list_messages(opened.conversation.id).await.unwrap(),
            opened.history
        );
    }

    #[tokio::test]
    async fn test_rejected_turn_creates_nothing() {
        let store = InMemoryConversationStore::with_limits(StoreLimits {
            max_messages_per_conversation: 10,
            max_content_chars: 5,
        });
        let err = store
            .begin_turn(None, None, "too long content".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidMessage(_)));
        assert!(store.is_empty());

        let cramped = InMemoryConversationStore::with_limits(StoreLimits {
            max_messages_per_conversation: 1,
            max_content_chars: 100,
        });
        let err = cramped
            .begin_turn(None, None, "hello".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CapacityExceeded { limit: 1, .. }));
        assert!(cramped.is_empty());
    }

    #[tokio::test]
    async fn test_begin_turn_keeps_room_for_reply() {
        let store = InMemoryConversationStore::with_limits(StoreLimits {
            max_messages_per_conversation: 3,
            max_content_chars: 100,
        });
        let conversation = store.create_conversation(None).await.unwrap();
        store
            .append_message(conversation.id, Role::User, "a".to_string())
            .await
            .unwrap();
        store
            .append_message(conversation.id, Role::Assistant, "b".to_string())
            .await
            .unwrap();

        // A single append still fits, a whole turn does not.
        let err = store
            .begin_turn(Some(conversation.id), None, "c".to_string())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::CapacityExceeded {
                id: conversation.id,
                limit: 3
            }
        );
        assert_eq!(store.list_messages(conversation.id).await.unwrap().len(), 2);

        store
            .append_message(conversation.id, Role::User, "c".to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_begin_turn_returns_full_history() {
        let store = InMemoryConversationStore::new();
        let conversation = store.create_conversation(None).await.unwrap();
        store
            .append_message(conversation.id, Role::System, "be brief".to_string())
            .await
            .unwrap();

        let opened = store
            .begin_turn(Some(conversation.id), Some("ignored".to_string()), "hi".to_string())
            .await
            .unwrap();
        assert_eq!(opened.conversation, conversation);
        let contents: Vec<&str> = opened.history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["be brief", "hi"]);
    }

    #[tokio::test]
    async fn test_list_conversations_breaks_ties_by_insertion() {
        let store = InMemoryConversationStore::new();
        let created_at = Utc::now();

        let mut inserted = Vec::new();
        for i in 0..20 {
            let conversation = Conversation::new(Some(format!("c{i}")), created_at);
            let sequence = store.next_sequence.fetch_add(1, Ordering::Relaxed);
            inserted.push(conversation.id);
            store
                .entries
                .insert(conversation.id, ConversationEntry::new(conversation, sequence));
        }

        let first: Vec<ConversationId> = store
            .list_conversations()
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        let second: Vec<ConversationId> = store
            .list_conversations()
            .await
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();

        inserted.reverse();
        assert_eq!(first, inserted);
        assert_eq!(second, first);
    }
}
