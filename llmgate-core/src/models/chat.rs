//! Chat request and result types.
//!
//! - [`ChatRequest`] - What a client sends to the gateway
//! - [`CompletionRequest`] - A request resolved against one provider and the settings
//! - [`Completion`] - A successful upstream answer
//! - [`ChatResult`] - What the gateway returns, success or failure

use serde::{Deserialize, Serialize};

use super::provider::ProviderConfig;
use super::settings::Settings;
use crate::error::{CoreError, ErrorKind};

// ============================================================================
// Chat Request
// ============================================================================

/// A chat request as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// User message.
    pub message: String,
    /// Explicit provider; `None` uses the default provider.
    #[serde(
        default,
        rename = "providerID",
        alias = "providerId",
        skip_serializing_if = "Option::is_none"
    )]
    pub provider_id: Option<String>,
    /// Model override; `None` uses the provider's configured model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// System prompt override; `None` uses the settings' prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl ChatRequest {
    /// Creates a request for the default provider.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Targets an explicit provider.
    #[must_use]
    pub fn with_provider(mut self, id: impl Into<String>) -> Self {
        self.provider_id = Some(id.into());
        self
    }

    /// Overrides the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the message is blank.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.message.trim().is_empty() {
            return Err(CoreError::validation("message must not be empty"));
        }
        Ok(())
    }
}

// ============================================================================
// Resolved Completion Request
// ============================================================================

/// A chat request with every optional field resolved for one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    /// Model to ask for.
    pub model: String,
    /// System prompt; omitted from the wire when empty.
    pub system_prompt: String,
    /// User message.
    pub message: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion length limit.
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Resolves `request` against `provider` and `settings`.
    ///
    /// A request-level model or system prompt wins over the configured one.
    pub fn resolve(request: &ChatRequest, provider: &ProviderConfig, settings: &Settings) -> Self {
        let model = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&provider.model)
            .to_string();
        let system_prompt = request
            .system_prompt
            .clone()
            .unwrap_or_else(|| settings.system_prompt.clone());

        Self {
            model,
            system_prompt,
            message: request.message.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

// ============================================================================
// Completion
// ============================================================================

/// A successful upstream answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    /// Completion text.
    pub text: String,
    /// Prompt tokens reported by the upstream (0 when unreported).
    pub tokens_in: u64,
    /// Completion tokens reported by the upstream (0 when unreported).
    pub tokens_out: u64,
    /// Dispatch-to-response latency.
    pub latency_ms: u64,
    /// Model that answered, as reported by the upstream or as requested.
    pub model: String,
}

// ============================================================================
// Chat Result
// ============================================================================

/// Machine-readable failure attached to a [`ChatResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatError {
    /// Stable failure kind.
    pub kind: ErrorKind,
    /// Human-readable description, credential-free.
    pub message: String,
    /// HTTP status returned by the upstream, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// One upstream call made while serving a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    /// Provider called.
    pub provider: String,
    /// 1-based attempt number against this provider.
    pub attempt: u32,
    /// Whether the call produced a completion.
    pub success: bool,
    /// Failure kind, if the call failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Latency of this call.
    pub latency_ms: u64,
}

/// Result of one chat request, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResult {
    /// Completion text; empty on failure.
    pub text: String,
    /// Provider that produced this outcome.
    pub provider_used: String,
    /// True iff the fallback provider produced the result.
    pub fallback_used: bool,
    /// Prompt tokens.
    pub tokens_in: u64,
    /// Completion tokens.
    pub tokens_out: u64,
    /// Latency of the call that produced the outcome.
    pub latency_ms: u64,
    /// Failure, if no provider produced a completion.
    pub error: Option<ChatError>,
    /// Model that answered; empty on failure.
    #[serde(default)]
    pub model: String,
    /// Every upstream call made for this request, in order.
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
}

impl ChatResult {
    /// Builds a successful result.
    pub fn success(
        provider: impl Into<String>,
        completion: Completion,
        fallback_used: bool,
        attempts: Vec<AttemptRecord>,
    ) -> Self {
        Self {
            text: completion.text,
            provider_used: provider.into(),
            fallback_used,
            tokens_in: completion.tokens_in,
            tokens_out: completion.tokens_out,
            latency_ms: completion.latency_ms,
            error: None,
            model: completion.model,
            attempts,
        }
    }

    /// Builds a failed result.
    pub fn failure(
        provider: impl Into<String>,
        error: ChatError,
        latency_ms: u64,
        attempts: Vec<AttemptRecord>,
    ) -> Self {
        Self {
            text: String::new(),
            provider_used: provider.into(),
            fallback_used: false,
            tokens_in: 0,
            tokens_out: 0,
            latency_ms,
            error: Some(error),
            model: String::new(),
            attempts,
        }
    }

    /// Returns true if a completion was produced.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns the failure kind, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}
