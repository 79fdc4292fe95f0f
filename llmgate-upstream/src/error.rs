//! Upstream error types.

use llmgate_core::{ChatError, ErrorKind};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Upstream Error
// ============================================================================

/// A classified failure of one upstream call.
///
/// `message` is always credential-free: text echoed by the provider is
/// scrubbed before an `UpstreamError` is built.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind}: {message}")]
pub struct UpstreamError {
    /// Stable failure kind.
    pub kind: ErrorKind,
    /// Provider-reported or transport error message.
    pub message: String,
    /// HTTP status, when the provider answered at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Time from dispatch to the terminal error.
    pub elapsed_ms: u64,
    /// Delay requested by the provider's `Retry-After` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl UpstreamError {
    /// Creates an error with no status.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            elapsed_ms: 0,
            retry_after_ms: None,
        }
    }

    /// Sets the HTTP status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the elapsed time.
    #[must_use]
    pub fn with_elapsed(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    /// Sets the provider-requested retry delay.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after_ms: Option<u64>) -> Self {
        self.retry_after_ms = retry_after_ms;
        self
    }

    /// Classifies a transport-level failure.
    pub fn from_transport(err: reqwest::Error, elapsed_ms: u64) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_decode() {
            ErrorKind::InvalidResponse
        } else {
            ErrorKind::Unreachable
        };
        // Strip the URL: it is already recorded with the request.
        let message = err.without_url().to_string();
        Self::new(kind, message).with_elapsed(elapsed_ms)
    }

    /// Returns true if the same provider may be called again.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Converts to the error carried by a chat result.
    pub fn to_chat_error(&self) -> ChatError {
        ChatError {
            kind: self.kind,
            message: self.message.clone(),
            status: self.status,
        }
    }
}

/// Maps a non-success HTTP status onto an error kind.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::AuthFailure,
        429 => ErrorKind::RateLimited,
        408 | 504 => ErrorKind::Timeout,
        500..=599 => ErrorKind::ServerError,
        _ => ErrorKind::Rejected,
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// Errors building the HTTP client or a request.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The underlying client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),

    /// A header value could not be encoded.
    #[error("Invalid header value for {0}")]
    InvalidHeader(String),
}
