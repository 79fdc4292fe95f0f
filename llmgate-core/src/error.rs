//! Core error types for `llmgate`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for `llmgate` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Provider not found or not enabled.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// A record or patch failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

// ============================================================================
// Error Kind
// ============================================================================

/// Stable, machine-readable classification of a failed chat outcome.
///
/// The serialized names are part of the HTTP contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The upstream did not answer within the request timeout.
    Timeout,
    /// The upstream rejected the credential (401/403).
    AuthFailure,
    /// The upstream throttled the request (429).
    RateLimited,
    /// The upstream failed with a 5xx status.
    ServerError,
    /// The upstream could not be reached at all.
    Unreachable,
    /// The upstream rejected the request with another 4xx status.
    Rejected,
    /// The upstream answered 2xx but the body held no completion.
    InvalidResponse,
    /// The requested provider does not exist or is disabled.
    ProviderNotFound,
}

impl ErrorKind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::AuthFailure => "auth_failure",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Unreachable => "unreachable",
            Self::Rejected => "rejected",
            Self::InvalidResponse => "invalid_response",
            Self::ProviderNotFound => "provider_not_found",
        }
    }

    /// Returns true if the same provider may be called again for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited | Self::ServerError | Self::Unreachable
        )
    }

    /// Returns true if a different provider may be tried after this error.
    ///
    /// Every upstream failure qualifies, including auth failures: another
    /// provider may hold a valid credential.
    pub fn is_fallback_eligible(&self) -> bool {
        !matches!(self, Self::ProviderNotFound)
    }

    /// Returns all kinds.
    pub fn all() -> &'static [ErrorKind] {
        &[
            Self::Timeout,
            Self::AuthFailure,
            Self::RateLimited,
            Self::ServerError,
            Self::Unreachable,
            Self::Rejected,
            Self::InvalidResponse,
            Self::ProviderNotFound,
        ]
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(ErrorKind::ServerError.is_retryable());
        assert!(ErrorKind::Unreachable.is_retryable());
        assert!(!ErrorKind::AuthFailure.is_retryable());
        assert!(!ErrorKind::Rejected.is_retryable());
    }

    #[test]
    fn test_auth_failure_is_fallback_eligible() {
        assert!(ErrorKind::AuthFailure.is_fallback_eligible());
        assert!(!ErrorKind::ProviderNotFound.is_fallback_eligible());
    }

    #[test]
    fn test_wire_names_match_serde() {
        for kind in ErrorKind::all() {
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
