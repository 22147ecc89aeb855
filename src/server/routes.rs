//! HTTP route handlers for the copilot API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::conversations::{Conversation, ConversationId, Message};
use crate::service::{AiResponse, ChatReply, SendMessage};

use super::error::ApiError;
use super::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/conversations", post(create_conversation).get(list_conversations))
        .route("/conversations/{id}", get(get_conversation))
        .route("/conversations/{id}/messages", get(list_messages))
        .route("/chat", post(chat))
        .route("/generate", post(generate))
        .route("/explain", post(explain))
        .route("/debug", post(debug))
        .with_state(state)
}

/// Basic liveness probe.
async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Healthy" }))
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "copilot-backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Unparsable identifiers cannot name a stored conversation.
fn parse_conversation_id(raw: &str) -> ApiResult<ConversationId> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("conversation not found: {raw}")))
}

/// Conversation creation request.
#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    /// Optional title.
    #[serde(default)]
    pub title: Option<String>,
}

async fn create_conversation(
    State(state): State<Arc<AppState>>,
    request: Option<Json<CreateConversationRequest>>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let conversation = state
        .service
        .store()
        .create_conversation(request.title)
        .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

async fn list_conversations(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Conversation>>> {
    Ok(Json(state.service.store().list_conversations().await?))
}

async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Conversation>> {
    let id = parse_conversation_id(&id)?;
    Ok(Json(state.service.store().get_conversation(id).await?))
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Message>>> {
    let id = parse_conversation_id(&id)?;
    Ok(Json(state.service.store().list_messages(id).await?))
}

/// Chat turn request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Conversation to continue; omitted to start a new one.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// The user's message.
    pub content: String,
    /// Model override.
    #[serde(default)]
    pub model: Option<String>,
    /// Title for a new conversation.
    #[serde(default)]
    pub title: Option<String>,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatReply>> {
    let conversation_id = request
        .conversation_id
        .as_deref()
        .map(parse_conversation_id)
        .transpose()?;

    let reply = state
        .service
        .send_message(SendMessage {
            conversation_id,
            content: request.content,
            model: request.model,
            title: request.title,
        })
        .await?;
    Ok(Json(reply))
}

/// Free-form generation request.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// What to generate.
    pub prompt: String,
    /// Model override.
    #[serde(default)]
    pub model: Option<String>,
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<AiResponse>> {
    let response = state
        .service
        .generate(&request.prompt, request.model.as_deref())
        .await?;
    Ok(Json(response))
}

/// Code explanation request.
#[derive(Debug, Deserialize)]
pub struct ExplainRequest {
    /// Code to explain.
    pub code: String,
    /// Language hint for the code fence.
    #[serde(default)]
    pub language: Option<String>,
    /// Model override.
    #[serde(default)]
    pub model: Option<String>,
}

async fn explain(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExplainRequest>,
) -> ApiResult<Json<AiResponse>> {
    let response = state
        .service
        .explain(
            &request.code,
            request.language.as_deref(),
            request.model.as_deref(),
        )
        .await?;
    Ok(Json(response))
}

/// Debugging request.
#[derive(Debug, Deserialize)]
pub struct DebugRequest {
    /// Code to debug.
    pub code: String,
    /// Language hint for the code fence.
    #[serde(default)]
    pub language: Option<String>,
    /// Observed error message or stack trace.
    #[serde(default)]
    pub error: Option<String>,
    /// Model override.
    #[serde(default)]
    pub model: Option<String>,
}

async fn debug(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DebugRequest>,
) -> ApiResult<Json<AiResponse>> {
    let response = state
        .service
        .debug(
            &request.code,
            request.language.as_deref(),
            request.error.as_deref(),
            request.model.as_deref(),
        )
        .await?;
    Ok(Json(response))
}
