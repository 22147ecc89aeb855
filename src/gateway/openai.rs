//! OpenAI-compatible `/chat/completions` client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::conversations::{ChatTurn, Role};

use super::config::GatewayConfig;
use super::error::{GatewayError, GatewayResult};
use super::{Completion, CompletionGateway, GatewayFuture, Usage};

/// Upper bound for establishing the upstream connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Gateway talking to an OpenAI-compatible completion API over HTTP.
pub struct OpenAiGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl OpenAiGateway {
    /// Create a gateway with its own HTTP client.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(config.request_timeout))
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn send(&self, messages: &[ChatTurn], model: &str) -> GatewayResult<Completion> {
        let request = ChatCompletionRequest {
            model,
            messages: messages
                .iter()
                .map(|turn| WireMessage {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
        };

        tracing::debug!(model, messages = messages.len(), "Calling upstream completion API");

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport_error(&e))?;

        if !status.is_success() {
            let err = GatewayError::upstream_status(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), "Upstream returned an error: {err}");
            return Err(err);
        }

        parse_completion(&body, model)
    }
}

impl CompletionGateway for OpenAiGateway {
    fn complete<'a>(
        &'a self,
        messages: &'a [ChatTurn],
        model: Option<&'a str>,
    ) -> GatewayFuture<'a, GatewayResult<Completion>> {
        Box::pin(async move {
            let model = model
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(self.config.default_model.as_str());
            self.send(messages, model).await
        })
    }
}

fn transport_error(err: &reqwest::Error) -> GatewayError {
    let mapped = GatewayError::from_transport(err);
    tracing::warn!(kind = mapped.kind().as_str(), "Upstream call failed: {err}");
    mapped
}

/// Validate an upstream response body into a [`Completion`].
fn parse_completion(body: &str, requested_model: &str) -> GatewayResult<Completion> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        tracing::error!("Upstream response did not match the expected schema: {e}");
        GatewayError::Internal("upstream response did not match the expected schema".to_string())
    })?;

    let choice = parsed.choices.into_iter().next().ok_or_else(|| {
        tracing::error!("Upstream response contained no choices");
        GatewayError::Internal("upstream response contained no choices".to_string())
    })?;

    if choice.message.content.trim().is_empty() {
        tracing::error!("Upstream returned an empty completion");
        return Err(GatewayError::Internal(
            "upstream returned an empty completion".to_string(),
        ));
    }

    Ok(Completion {
        message: ChatTurn::new(Role::Assistant, choice.message.content),
        model: parsed
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| requested_model.to_string()),
        usage: parsed.usage.unwrap_or_default(),
    })
}
