//! Routing and generation settings.

use serde::{Deserialize, Deserializer, Serialize};

use super::provider::ProviderConfig;
use crate::error::CoreError;

/// Upper bound for [`Settings::retry_attempts`].
pub const MAX_RETRY_ATTEMPTS: u32 = 3;

// ============================================================================
// Settings
// ============================================================================

/// Gateway-wide settings. There is exactly one per registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Provider used when a request does not name one.
    pub default_provider: String,
    /// Provider tried once after a fallback-eligible failure.
    pub fallback_provider: Option<String>,
    /// Sampling temperature sent to upstreams that accept it.
    pub temperature: f64,
    /// Completion length limit.
    pub max_tokens: u32,
    /// System prompt used when a request does not carry one.
    pub system_prompt: String,
    /// Whether the router may use the fallback provider at all.
    pub auto_fallback: bool,
    /// Extra attempts against the same provider for retryable errors.
    pub retry_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_provider: "local-llm".to_string(),
            fallback_provider: None,
            temperature: 0.7,
            max_tokens: 2048,
            system_prompt: "You are a helpful assistant.".to_string(),
            auto_fallback: true,
            retry_attempts: 0,
        }
    }
}

impl Settings {
    /// Returns the fallback provider to use after `tried` failed, if any.
    ///
    /// Never returns `tried` itself, so a request cannot fall back onto
    /// the provider that just failed.
    pub fn fallback_for(&self, tried: &str) -> Option<&str> {
        if !self.auto_fallback {
            return None;
        }
        self.fallback_provider
            .as_deref()
            .filter(|fallback| !fallback.is_empty() && *fallback != tried)
    }

    /// Validates the settings against the current provider table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if a referenced provider does not
    /// exist or a numeric field is out of range.
    pub fn validate(&self, providers: &[ProviderConfig]) -> Result<(), CoreError> {
        let exists = |id: &str| providers.iter().any(|p| p.id == id);

        if !exists(&self.default_provider) {
            return Err(CoreError::validation(format!(
                "defaultProvider {:?} does not reference an existing provider",
                self.default_provider
            )));
        }
        if let Some(fallback) = &self.fallback_provider {
            if !exists(fallback) {
                return Err(CoreError::validation(format!(
                    "fallbackProvider {fallback:?} does not reference an existing provider"
                )));
            }
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(CoreError::validation(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(CoreError::validation("maxTokens must be greater than zero"));
        }
        if self.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(CoreError::validation(format!(
                "retryAttempts must be at most {MAX_RETRY_ATTEMPTS}, got {}",
                self.retry_attempts
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Settings Patch
// ============================================================================

/// Partial update for [`Settings`]. Unknown fields are rejected.
///
/// `fallbackProvider` distinguishes "absent" (keep) from `null` (clear).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsPatch {
    /// New default provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
    /// New fallback provider; `Some(None)` clears it.
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub fallback_provider: Option<Option<String>>,
    /// New temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// New completion length limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// New system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// New auto-fallback flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_fallback: Option<bool>,
    /// New retry budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempts: Option<u32>,
}

impl SettingsPatch {
    /// Applies the patch to a copy of `current` and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the patched settings are invalid.
    pub fn apply(
        &self,
        current: &Settings,
        providers: &[ProviderConfig],
    ) -> Result<Settings, CoreError> {
        let mut next = current.clone();

        if let Some(id) = &self.default_provider {
            next.default_provider = id.trim().to_string();
        }
        if let Some(fallback) = &self.fallback_provider {
            next.fallback_provider = fallback
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(ToString::to_string);
        }
        if let Some(temperature) = self.temperature {
            next.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            next.max_tokens = max_tokens;
        }
        if let Some(prompt) = &self.system_prompt {
            next.system_prompt.clone_from(prompt);
        }
        if let Some(auto_fallback) = self.auto_fallback {
            next.auto_fallback = auto_fallback;
        }
        if let Some(retry_attempts) = self.retry_attempts {
            next.retry_attempts = retry_attempts;
        }

        next.validate(providers)?;
        Ok(next)
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn providers() -> Vec<ProviderConfig> {
        ["local-llm", "openai", "groq"]
            .iter()
            .map(|id| {
                ProviderConfig::new(*id, *id, "m1", Url::parse("http://localhost:1/v1").unwrap())
            })
            .collect()
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate(&providers()).is_ok());
    }

    #[test]
    fn test_fallback_never_self() {
        let settings = Settings {
            fallback_provider: Some("openai".to_string()),
            ..Settings::default()
        };
        assert_eq!(settings.fallback_for("local-llm"), Some("openai"));
        assert_eq!(settings.fallback_for("openai"), None);
    }

    #[test]
    fn test_fallback_disabled_by_flag() {
        let settings = Settings {
            fallback_provider: Some("openai".to_string()),
            auto_fallback: false,
            ..Settings::default()
        };
        assert_eq!(settings.fallback_for("local-llm"), None);
    }

    #[test]
    fn test_unknown_default_rejected() {
        let settings = Settings {
            default_provider: "nope".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate(&providers()).is_err());
    }

    #[test]
    fn test_out_of_range_numbers_rejected() {
        let p = providers();
        let hot = SettingsPatch {
            temperature: Some(2.5),
            ..Default::default()
        };
        assert!(hot.apply(&Settings::default(), &p).is_err());

        let zero = SettingsPatch {
            max_tokens: Some(0),
            ..Default::default()
        };
        assert!(zero.apply(&Settings::default(), &p).is_err());

        let retries = SettingsPatch {
            retry_attempts: Some(MAX_RETRY_ATTEMPTS + 1),
            ..Default::default()
        };
        assert!(retries.apply(&Settings::default(), &p).is_err());
    }

    #[test]
    fn test_patch_null_clears_fallback() {
        let current = Settings {
            fallback_provider: Some("groq".to_string()),
            ..Settings::default()
        };
        let patch: SettingsPatch = serde_json::from_str(r#"{"fallbackProvider": null}"#).unwrap();
        let next = patch.apply(&current, &providers()).unwrap();
        assert_eq!(next.fallback_provider, None);

        let keep: SettingsPatch = serde_json::from_str(r#"{"temperature": 0.2}"#).unwrap();
        let next = keep.apply(&current, &providers()).unwrap();
        assert_eq!(next.fallback_provider.as_deref(), Some("groq"));
    }

    #[test]
    fn test_patch_unknown_field_rejected() {
        let result: Result<SettingsPatch, _> = serde_json::from_str(r#"{"theme": "dark"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"defaultProvider": "openai"}"#).unwrap();
        assert_eq!(settings.default_provider, "openai");
        assert_eq!(settings.max_tokens, 2048);
        assert!(settings.auto_fallback);
    }
}
