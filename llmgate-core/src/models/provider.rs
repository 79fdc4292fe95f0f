//! Provider-related types.
//!
//! This module contains types related to upstream providers:
//! - [`ProviderFamily`] - Wire dialect spoken by the provider
//! - [`ProviderConfig`] - One provider's full configuration
//! - [`ProviderPatch`] - Partial update, validated as a whole record
//! - [`RedactedProvider`] - Listing view with the credential masked

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::status::ConnectionStatus;
use crate::error::CoreError;
use crate::redact::redact_credential;

// ============================================================================
// Provider Family
// ============================================================================

/// Wire dialect of a provider's chat-completion endpoint.
///
/// Every family speaks the same request/response shape; they differ only in
/// how generation parameters and credentials are put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    /// OpenAI-compatible endpoint with bearer auth.
    #[default]
    OpenAi,
    /// OpenAI-compatible endpoint for models that reject `max_tokens`
    /// and `temperature`.
    Reasoning,
    /// Self-hosted endpoint; auth header only when a credential is set.
    Local,
}

impl ProviderFamily {
    /// Returns the display name for this family.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI-compatible",
            Self::Reasoning => "Reasoning",
            Self::Local => "Local",
        }
    }
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for one upstream provider.
///
/// Records are never deleted, only disabled. They change only through
/// [`ProviderPatch::apply`], which re-validates the whole record.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Provider identifier (registry key).
    pub id: String,
    /// Whether the provider may serve requests.
    pub enabled: bool,
    /// Human-readable name.
    pub display_name: String,
    /// API credential. Empty for credential-less local providers.
    #[serde(default)]
    pub credential: String,
    /// Model used when a request does not name one.
    pub model: String,
    /// Absolute base URL of the OpenAI-compatible API (e.g. `https://api.openai.com/v1`).
    #[serde(rename = "baseURL", alias = "baseUrl")]
    pub base_url: Url,
    /// Wire dialect.
    #[serde(default)]
    pub family: ProviderFamily,
    /// Last-known connection status.
    #[serde(default)]
    pub status: ConnectionStatus,
    /// When `status` was last determined.
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
}

impl ProviderConfig {
    /// Creates a disabled provider with no credential.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        model: impl Into<String>,
        base_url: Url,
    ) -> Self {
        Self {
            id: id.into(),
            enabled: false,
            display_name: display_name.into(),
            credential: String::new(),
            model: model.into(),
            base_url,
            family: ProviderFamily::default(),
            status: ConnectionStatus::default(),
            last_checked: None,
        }
    }

    /// Sets the wire family.
    #[must_use]
    pub fn with_family(mut self, family: ProviderFamily) -> Self {
        self.family = family;
        self
    }

    /// Sets the credential.
    #[must_use]
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = credential.into();
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns true if a credential is configured.
    pub fn has_credential(&self) -> bool {
        !self.credential.is_empty()
    }

    /// Returns the chat-completion endpoint for this provider.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the joined URL cannot be parsed.
    pub fn chat_endpoint(&self) -> Result<Url, CoreError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/chat/completions"))
            .map_err(|e| CoreError::validation(format!("invalid endpoint for {}: {e}", self.id)))
    }

    /// Validates the whole record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_id(&self.id)?;

        if self.display_name.trim().is_empty() {
            return Err(CoreError::validation("displayName must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(CoreError::validation("model must not be empty"));
        }
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(CoreError::validation(format!(
                "baseURL must use http or https, got {}",
                self.base_url.scheme()
            )));
        }
        if self.base_url.host_str().is_none_or(str::is_empty) {
            return Err(CoreError::validation("baseURL must include a host"));
        }
        // The secrets file is line-oriented.
        if self.credential.chars().any(char::is_control) {
            return Err(CoreError::validation(
                "credential must not contain control characters",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("enabled", &self.enabled)
            .field("display_name", &self.display_name)
            .field("credential", &redact_credential(&self.credential))
            .field("model", &self.model)
            .field("base_url", &self.base_url.as_str())
            .field("family", &self.family)
            .field("status", &self.status)
            .field("last_checked", &self.last_checked)
            .finish()
    }
}

/// Validates a provider identifier.
///
/// Ids appear in URL paths and secrets-file keys, so they are restricted to
/// ASCII alphanumerics, `-`, `_` and `.`.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] if the id is empty or has other characters.
pub fn validate_id(id: &str) -> Result<(), CoreError> {
    if id.is_empty() {
        return Err(CoreError::validation("provider id must not be empty"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(CoreError::validation(format!(
            "provider id {id:?} may only contain ASCII letters, digits, '-', '_' and '.'"
        )));
    }
    Ok(())
}

// ============================================================================
// Provider Patch
// ============================================================================

/// Partial update for a provider. Unknown fields are rejected.
///
/// `status` and `lastChecked` are not patchable; only
/// the registry's status tracking writes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProviderPatch {
    /// New enabled flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// New credential. An empty string clears it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// New default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// New base URL, validated as an absolute http(s) URL.
    #[serde(
        default,
        rename = "baseURL",
        alias = "baseUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub base_url: Option<String>,
    /// New wire family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<ProviderFamily>,
}

impl ProviderPatch {
    /// Applies the patch to a copy of `current` and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the base URL does not parse or
    /// the patched record is invalid. `current` is never modified.
    pub fn apply(&self, current: &ProviderConfig) -> Result<ProviderConfig, CoreError> {
        let mut next = current.clone();

        if let Some(enabled) = self.enabled {
            next.enabled = enabled;
        }
        if let Some(name) = &self.display_name {
            next.display_name = name.trim().to_string();
        }
        if let Some(credential) = &self.credential {
            next.credential = credential.trim().to_string();
        }
        if let Some(model) = &self.model {
            next.model = model.trim().to_string();
        }
        if let Some(raw) = &self.base_url {
            next.base_url = Url::parse(raw.trim()).map_err(|e| {
                CoreError::validation(format!("baseURL {raw:?} is not a valid absolute URL: {e}"))
            })?;
        }
        if let Some(family) = self.family {
            next.family = family;
        }

        // A changed endpoint or credential invalidates the last check.
        if next.base_url != current.base_url || next.credential != current.credential {
            next.status = ConnectionStatus::Disconnected;
        }

        next.validate()?;
        Ok(next)
    }
}

// ============================================================================
// Redacted View
// ============================================================================

/// Provider as shown by listings: the credential is replaced by a
/// fixed-length placeholder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactedProvider {
    /// Provider identifier.
    pub id: String,
    /// Whether the provider may serve requests.
    pub enabled: bool,
    /// Human-readable name.
    pub display_name: String,
    /// Placeholder when a credential is set, empty otherwise.
    pub credential: String,
    /// Whether a credential is set.
    pub has_credential: bool,
    /// Default model.
    pub model: String,
    /// Base URL.
    #[serde(rename = "baseURL")]
    pub base_url: String,
    /// Wire family.
    pub family: ProviderFamily,
    /// Last-known status.
    pub status: ConnectionStatus,
    /// When the status was last determined.
    pub last_checked: Option<DateTime<Utc>>,
}

impl From<&ProviderConfig> for RedactedProvider {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            id: config.id.clone(),
            enabled: config.enabled,
            display_name: config.display_name.clone(),
            credential: redact_credential(&config.credential),
            has_credential: config.has_credential(),
            model: config.model.clone(),
            base_url: config.base_url.to_string(),
            family: config.family,
            status: config.status,
            last_checked: config.last_checked,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
