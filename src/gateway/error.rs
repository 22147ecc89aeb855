//! Error types for the completion gateway.

use serde::Serialize;
use thiserror::Error;

/// Longest upstream error summary carried by a [`GatewayError`].
pub const MAX_SUMMARY_CHARS: usize = 200;

/// Stable classification of gateway failures, exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorKind {
    /// Upstream unreachable or answered with an error.
    BadGateway,
    /// Upstream exceeded the request deadline.
    GatewayTimeout,
    /// Unclassified failure.
    Internal,
}

impl GatewayErrorKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadGateway => "bad_gateway",
            Self::GatewayTimeout => "gateway_timeout",
            Self::Internal => "internal",
        }
    }
}

/// Errors produced by a completion gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Connection, DNS or TLS failure, or a non-success upstream status.
    #[error("bad gateway: {0}")]
    BadGateway(String),

    /// The upstream call did not finish before the configured timeout.
    #[error("gateway timeout: {0}")]
    GatewayTimeout(String),

    /// Anything else, including responses that do not match the expected schema.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Classification of this error.
    #[must_use]
    pub const fn kind(&self) -> GatewayErrorKind {
        match self {
            Self::BadGateway(_) => GatewayErrorKind::BadGateway,
            Self::GatewayTimeout(_) => GatewayErrorKind::GatewayTimeout,
            Self::Internal(_) => GatewayErrorKind::Internal,
        }
    }

    /// Caller-facing message, without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::BadGateway(msg) | Self::GatewayTimeout(msg) | Self::Internal(msg) => msg,
        }
    }

    /// Classify a transport-level `reqwest` failure.
    #[must_use]
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::GatewayTimeout("upstream completion API did not respond in time".to_string())
        } else if err.is_connect() || err.is_request() {
            Self::BadGateway("could not reach upstream completion API".to_string())
        } else {
            Self::Internal("unexpected failure while calling upstream completion API".to_string())
        }
    }

    /// Build the error for a non-success upstream status.
    ///
    /// Only a bounded, sanitized summary of the body is kept.
    #[must_use]
    pub fn upstream_status(status: u16, body: &str) -> Self {
        let summary = summarize_upstream_body(body);
        if summary.is_empty() {
            Self::BadGateway(format!("upstream returned {status}"))
        } else {
            Self::BadGateway(format!("upstream returned {status}: {summary}"))
        }
    }
}

/// Convenience result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Extract a short, printable summary from an upstream error body.
///
/// Prefers the `error.message` field of an OpenAI-style error envelope and
/// falls back to the raw body.
#[must_use]
pub fn summarize_upstream_body(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());

    let cleaned = message
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() > MAX_SUMMARY_CHARS {
        let truncated: String = collapsed.chars().take(MAX_SUMMARY_CHARS).collect();
        format!("{truncated}...")
    } else {
        collapsed
    }
}
