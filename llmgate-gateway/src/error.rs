//! Gateway error types and their HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use llmgate_core::CoreError;
use llmgate_store::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the HTTP API.
///
/// Upstream failures are never represented here: they are data inside a
/// chat or test result, not HTTP errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Bad input (malformed JSON, unknown field, invalid value).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown provider or resource.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Reading or writing gateway state failed.
    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),

    /// The registry change was saved but the secrets file was not rewritten.
    #[error("Registry updated but secrets sync failed: {0}")]
    Sync(#[source] StoreError),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Sync(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the machine-readable kind for the error body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) => "io_error",
            Self::Sync(_) => "sync_failed",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProviderNotFound(id) => Self::NotFound(format!("provider {id}")),
            StoreError::Validation(message) => Self::Validation(message),
            other => Self::Storage(other),
        }
    }
}

impl From<CoreError> for GatewayError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProviderNotFound(id) => Self::NotFound(format!("provider {id}")),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        let body = json!({
            "success": false,
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
