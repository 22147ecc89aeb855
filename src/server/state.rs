//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::conversations::InMemoryConversationStore;
use crate::gateway::{GatewayResult, OpenAiGateway};
use crate::service::ChatService;

/// Shared application state.
pub struct AppState {
    /// Chat orchestration over the store and the gateway.
    pub service: ChatService,
}

impl AppState {
    /// Wrap an already assembled service.
    #[must_use]
    pub fn new(service: ChatService) -> Arc<Self> {
        Arc::new(Self { service })
    }

    /// Build the production state: an in-memory store and an OpenAI gateway.
    ///
    /// # Errors
    /// Returns an error if the upstream HTTP client cannot be created.
    pub fn from_config(config: &AppConfig) -> GatewayResult<Arc<Self>> {
        let store = Arc::new(InMemoryConversationStore::with_limits(config.store));
        let gateway = Arc::new(OpenAiGateway::new(config.gateway.clone())?);
        Ok(Self::new(ChatService::new(store, gateway)))
    }
}
