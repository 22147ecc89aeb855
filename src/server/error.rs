//! Translation of service errors into HTTP error envelopes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::conversations::StoreError;
use crate::gateway::{GatewayError, GatewayErrorKind};
use crate::service::ServiceError;

/// Body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    /// Stable error classification.
    pub error_kind: &'static str,
    /// Human-readable description.
    pub message: String,
}

/// Error returned by route handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    /// Unknown resource.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: "not_found",
            message: message.into(),
        }
    }

    /// Request failed validation.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            kind: "invalid_request",
            message: message.into(),
        }
    }

    /// HTTP status of the response.
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Error classification.
    pub const fn kind(&self) -> &'static str {
        self.kind
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::not_found(err.to_string()),
            StoreError::InvalidMessage(_) | StoreError::CapacityExceeded { .. } => {
                Self::invalid_request(err.to_string())
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let kind = err.kind();
        let status = match kind {
            GatewayErrorKind::BadGateway => StatusCode::BAD_GATEWAY,
            GatewayErrorKind::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: kind.as_str(),
            message: err.message().to_string(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Store(e) => e.into(),
            ServiceError::Gateway(e) => e.into(),
            ServiceError::InvalidRequest(msg) => Self::invalid_request(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(kind = self.kind, status = self.status.as_u16(), "{}", self.message);
        }
        let body = ErrorEnvelope {
            error_kind: self.kind,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
