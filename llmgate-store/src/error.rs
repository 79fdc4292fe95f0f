//! Store error types.

use llmgate_core::CoreError;
use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Provider not found.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// A record or patch failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted state is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProviderNotFound(id) => StoreError::ProviderNotFound(id),
            CoreError::Validation(message) => StoreError::Validation(message),
            CoreError::Serialization(e) => StoreError::Serialization(e),
        }
    }
}
