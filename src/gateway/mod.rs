//! Upstream chat-completion gateway.
//!
//! The gateway forwards a message history to an OpenAI-compatible API and
//! maps every failure onto one of three [`GatewayErrorKind`]s:
//! - connection, DNS and TLS failures, and non-success statuses: `bad_gateway`
//! - requests exceeding the configured timeout: `gateway_timeout`
//! - everything else, including malformed responses: `internal`

pub mod config;
pub mod error;
pub mod openai;
#[cfg(test)]
pub(crate) mod testing;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayErrorKind, GatewayResult};
pub use openai::OpenAiGateway;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::conversations::ChatTurn;

/// Boxed future type for gateway calls.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Token accounting reported by the upstream API.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Tokens in the completion.
    #[serde(default)]
    pub completion_tokens: u32,
    /// Sum of both.
    #[serde(default)]
    pub total_tokens: u32,
}

/// Result of one completion call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    /// The assistant reply, not yet stored anywhere.
    pub message: ChatTurn,
    /// Model that produced the reply.
    pub model: String,
    /// Token usage, zeroed when the upstream does not report it.
    pub usage: Usage,
}

/// Anything that turns a message history into the next assistant turn.
pub trait CompletionGateway: Send + Sync {
    /// Send `messages` upstream and return the assistant reply.
    ///
    /// `model` overrides the configured default model.
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatTurn],
        model: Option<&'a str>,
    ) -> GatewayFuture<'a, GatewayResult<Completion>>;
}
