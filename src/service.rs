//! Chat orchestration on top of the store and the gateway.
//!
//! A chat turn selects or creates a conversation, appends the user message,
//! sends the accumulated history upstream and appends the assistant reply.
//! The one-shot helpers (`generate`, `explain`, `debug`) call the gateway
//! without touching the store.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::conversations::{
    ChatTurn, ConversationId, ConversationStore, Message, Role, StoreError,
};
use crate::gateway::{CompletionGateway, GatewayError, Usage};

const GENERATE_SYSTEM_PROMPT: &str =
    "You are an AI coding copilot. Write correct, idiomatic code for the request. \
     Keep explanations short.";

const EXPLAIN_SYSTEM_PROMPT: &str =
    "You are an AI coding copilot. Explain what the given code does, step by step, \
     for a developer who has not seen it before.";

const DEBUG_SYSTEM_PROMPT: &str =
    "You are an AI coding copilot. Find the bugs in the given code, explain their cause \
     and propose a corrected version.";

/// Errors surfaced by [`ChatService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Store failure (unknown conversation, invalid message, capacity).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Upstream failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The request itself is unusable.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Input of one chat turn.
#[derive(Clone, Debug, Default)]
pub struct SendMessage {
    /// Conversation to continue; a new one is created when absent.
    pub conversation_id: Option<ConversationId>,
    /// User message text.
    pub content: String,
    /// Model override.
    pub model: Option<String>,
    /// Title for a newly created conversation.
    pub title: Option<String>,
}

/// Outcome of one chat turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    /// Conversation the turn was appended to.
    pub conversation_id: ConversationId,
    /// Stored assistant reply.
    pub message: Message,
    /// Model that produced the reply.
    pub model: String,
    /// Token usage reported upstream.
    pub usage: Usage,
}

/// Outcome of a one-shot prompt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AiResponse {
    /// Assistant reply text.
    pub content: String,
    /// Model that produced the reply.
    pub model: String,
    /// Token usage reported upstream.
    pub usage: Usage,
}

/// Coordinates the conversation store and the completion gateway.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ConversationStore>,
    gateway: Arc<dyn CompletionGateway>,
}

impl ChatService {
    /// Create a service over the given collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn ConversationStore>, gateway: Arc<dyn CompletionGateway>) -> Self {
        Self { store, gateway }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &dyn ConversationStore {
        self.store.as_ref()
    }

    /// Run one chat turn and return the stored assistant reply.
    ///
    /// The user message is stored only when the conversation has room for the
    /// reply as well. If the gateway fails, the user message stays in the
    /// conversation and the gateway error is returned.
    ///
    /// # Errors
    /// Returns a store error for unknown conversations, invalid content or a
    /// full conversation, and a gateway error when the upstream call fails or
    /// its reply cannot be stored.
    pub async fn send_message(&self, request: SendMessage) -> ServiceResult<ChatReply> {
        require("content", &request.content)?;

        let opened = self
            .store
            .begin_turn(request.conversation_id, request.title, request.content)
            .await?;
        let conversation_id = opened.conversation.id;

        let history: Vec<ChatTurn> = opened.history.iter().map(ChatTurn::from).collect();

        let completion = self
            .gateway
            .complete(&history, request.model.as_deref())
            .await?;

        let message = self
            .store
            .append_message(conversation_id, Role::Assistant, completion.message.content)
            .await
            .map_err(reply_rejected)?;

        Ok(ChatReply {
            conversation_id,
            message,
            model: completion.model,
            usage: completion.usage,
        })
    }

    /// Generate code or text for a free-form prompt.
    ///
    /// # Errors
    /// Returns an error if the prompt is blank or the upstream call fails.
    pub async fn generate(&self, prompt: &str, model: Option<&str>) -> ServiceResult<AiResponse> {
        let prompt = require("prompt", prompt)?;
        self.one_shot(GENERATE_SYSTEM_PROMPT, prompt.to_string(), model)
            .await
    }

    /// Explain a code snippet.
    ///
    /// # Errors
    /// Returns an error if the code is blank or the upstream call fails.
    pub async fn explain(
        &self,
        code: &str,
        language: Option<&str>,
        model: Option<&str>,
    ) -> ServiceResult<AiResponse> {
        let code = require("code", code)?;
        let prompt = format!("Explain this code:\n\n{}", fenced(code, language));
        self.one_shot(EXPLAIN_SYSTEM_PROMPT, prompt, model).await
    }

    /// Find and fix bugs in a code snippet.
    ///
    /// # Errors
    /// Returns an error if the code is blank or the upstream call fails.
    pub async fn debug(
        &self,
        code: &str,
        language: Option<&str>,
        error: Option<&str>,
        model: Option<&str>,
    ) -> ServiceResult<AiResponse> {
        let code = require("code", code)?;
        let mut prompt = format!("Debug this code:\n\n{}", fenced(code, language));
        if let Some(error) = error.map(str::trim).filter(|e| !e.is_empty()) {
            prompt.push_str("\n\nObserved error:\n");
            prompt.push_str(error);
        }
        self.one_shot(DEBUG_SYSTEM_PROMPT, prompt, model).await
    }

    async fn one_shot(
        &self,
        system_prompt: &str,
        prompt: String,
        model: Option<&str>,
    ) -> ServiceResult<AiResponse> {
        let turns = [ChatTurn::system(system_prompt), ChatTurn::user(prompt)];
        let completion = self.gateway.complete(&turns, model).await?;

        Ok(AiResponse {
            content: completion.message.content,
            model: completion.model,
            usage: completion.usage,
        })
    }
}

/// Reply content comes from upstream, never from the caller.
fn reply_rejected(err: StoreError) -> ServiceError {
    tracing::warn!("Assistant reply not stored: {err}");
    let mapped = match err {
        StoreError::InvalidMessage(reason) => {
            GatewayError::BadGateway(format!("upstream reply rejected: {reason}"))
        }
        other => GatewayError::Internal(other.to_string()),
    };
    ServiceError::Gateway(mapped)
}

fn require<'a>(field: &str, value: &'a str) -> ServiceResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}

fn fenced(code: &str, language: Option<&str>) -> String {
    let language = language.map(str::trim).unwrap_or_default();
    format!("```{language}\n{code}\n```")
}
