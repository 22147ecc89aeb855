//! Environment-driven configuration for the backend.

use std::time::Duration;

use thiserror::Error;

use crate::conversations::StoreLimits;
use crate::gateway::GatewayConfig;
use crate::gateway::config::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT};

/// Upstream API key (required).
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Upstream base URL.
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
/// Default model name.
pub const MODEL_ENV: &str = "DEFAULT_OPENAI_MODEL";
/// Upstream request timeout, in seconds.
pub const TIMEOUT_ENV: &str = "REQUEST_TIMEOUT";
/// Allowed CORS origins, as a JSON array or a comma-separated list.
pub const CORS_ENV: &str = "BACKEND_CORS_ORIGINS";
/// Listen port.
pub const PORT_ENV: &str = "PORT";
/// Message count limit per conversation.
pub const MAX_MESSAGES_ENV: &str = "MAX_MESSAGES_PER_CONVERSATION";
/// Message length limit, in characters.
pub const MAX_CHARS_ENV: &str = "MAX_MESSAGE_CHARS";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3001;

/// Origins allowed when none are configured.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:3000"];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The upstream API key is not set.
    #[error("OPENAI_API_KEY must be set")]
    MissingApiKey,

    /// A variable holds a value that cannot be used.
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// HTTP listener settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// TCP port to bind on all interfaces.
    pub port: u16,
    /// Allowed CORS origins; `*` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Complete backend configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Upstream gateway settings.
    pub gateway: GatewayConfig,
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Conversation store bounds.
    pub store: StoreLimits,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if the API key is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns an error if the API key is missing or a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get(API_KEY_ENV).ok_or(ConfigError::MissingApiKey)?;

        let base_url = get(BASE_URL_ENV).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        url::Url::parse(&base_url).map_err(|e| ConfigError::InvalidValue {
            name: BASE_URL_ENV,
            value: base_url.clone(),
            reason: e.to_string(),
        })?;

        let default_model = get(MODEL_ENV).unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let request_timeout = match get(TIMEOUT_ENV) {
            Some(raw) => Duration::from_secs(parse_positive(TIMEOUT_ENV, &raw)?),
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                name: PORT_ENV,
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let defaults = StoreLimits::default();
        let store = StoreLimits {
            max_messages_per_conversation: match get(MAX_MESSAGES_ENV) {
                Some(raw) => to_usize(MAX_MESSAGES_ENV, &raw, parse_positive(MAX_MESSAGES_ENV, &raw)?)?,
                None => defaults.max_messages_per_conversation,
            },
            max_content_chars: match get(MAX_CHARS_ENV) {
                Some(raw) => to_usize(MAX_CHARS_ENV, &raw, parse_positive(MAX_CHARS_ENV, &raw)?)?,
                None => defaults.max_content_chars,
            },
        };

        Ok(Self {
            gateway: GatewayConfig::new(api_key)
                .with_base_url(base_url)
                .with_default_model(default_model)
                .with_timeout(request_timeout),
            server: ServerConfig {
                port,
                cors_origins: parse_cors_origins(get(CORS_ENV).as_deref()),
            },
            store,
        })
    }
}

fn parse_positive(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn to_usize(name: &'static str, raw: &str, value: u64) -> Result<usize, ConfigError> {
    usize::try_from(value).map_err(|e| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn default_cors_origins() -> Vec<String> {
    DEFAULT_CORS_ORIGINS.iter().map(|o| (*o).to_string()).collect()
}

/// Parse a CORS origin list.
///
/// Accepts a JSON array of strings or a comma-separated list. Blank input, or
/// input that yields no origin, falls back to [`DEFAULT_CORS_ORIGINS`].
#[must_use]
pub fn parse_cors_origins(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return default_cors_origins();
    };

    let origins: Vec<String> = if raw.starts_with('[') {
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("Ignoring malformed {CORS_ENV}: {e}");
                Vec::new()
            }
        }
    } else {
        raw.split(',').map(str::to_string).collect()
    };

    let origins: Vec<String> = origins
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

    if origins.is_empty() {
        default_cors_origins()
    } else {
        origins
    }
}
