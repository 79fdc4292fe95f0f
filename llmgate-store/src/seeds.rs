//! Provider table written on first start.
//!
//! Providers are ordered by how commonly they are used; the order is kept
//! by the registry and by the secrets file.

use llmgate_core::{ProviderConfig, ProviderFamily};
use url::Url;

use crate::error::StoreError;

/// Id of the credential-less local provider that is enabled by default.
pub const LOCAL_PROVIDER_ID: &str = "local-llm";

struct Seed {
    id: &'static str,
    display_name: &'static str,
    model: &'static str,
    base_url: &'static str,
    family: ProviderFamily,
    enabled: bool,
}

const SEEDS: &[Seed] = &[
    Seed {
        id: "openai",
        display_name: "OpenAI",
        model: "gpt-4o-mini",
        base_url: "https://api.openai.com/v1",
        family: ProviderFamily::OpenAi,
        enabled: false,
    },
    Seed {
        id: "anthropic",
        display_name: "Anthropic",
        model: "claude-3-5-haiku-latest",
        base_url: "https://api.anthropic.com/v1",
        family: ProviderFamily::OpenAi,
        enabled: false,
    },
    Seed {
        id: "deepseek",
        display_name: "DeepSeek",
        model: "deepseek-chat",
        base_url: "https://api.deepseek.com/v1",
        family: ProviderFamily::OpenAi,
        enabled: false,
    },
    Seed {
        id: "groq",
        display_name: "Groq",
        model: "llama-3.1-8b-instant",
        base_url: "https://api.groq.com/openai/v1",
        family: ProviderFamily::OpenAi,
        enabled: false,
    },
    Seed {
        id: "openrouter",
        display_name: "OpenRouter",
        model: "openai/gpt-4o-mini",
        base_url: "https://openrouter.ai/api/v1",
        family: ProviderFamily::OpenAi,
        enabled: false,
    },
    Seed {
        id: LOCAL_PROVIDER_ID,
        display_name: "Local LLM",
        model: "llama3.1",
        base_url: "http://127.0.0.1:11434/v1",
        family: ProviderFamily::Local,
        enabled: true,
    },
];

/// Returns the default provider table.
///
/// # Errors
///
/// Returns [`StoreError::Config`] if a built-in base URL fails to parse.
pub fn default_providers() -> Result<Vec<ProviderConfig>, StoreError> {
    SEEDS
        .iter()
        .map(|seed| {
            let base_url = Url::parse(seed.base_url).map_err(|e| {
                StoreError::Config(format!("built-in URL for {} is invalid: {e}", seed.id))
            })?;
            Ok(
                ProviderConfig::new(seed.id, seed.display_name, seed.model, base_url)
                    .with_family(seed.family)
                    .with_enabled(seed.enabled),
            )
        })
        .collect()
}
