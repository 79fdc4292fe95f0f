//! JSON output formatting.

use anyhow::Result;
use llmgate_core::{ProviderConfig, RedactedProvider, Settings};
use llmgate_store::DataPaths;
use serde::Serialize;

// ============================================================================
// Output Types
// ============================================================================

/// Data directory layout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathsOutput {
    pub data_dir: String,
    pub providers_file: String,
    pub secrets_file: String,
    pub usage_file: String,
}

impl From<&DataPaths> for PathsOutput {
    fn from(paths: &DataPaths) -> Self {
        Self {
            data_dir: paths.root().display().to_string(),
            providers_file: paths.providers().display().to_string(),
            secrets_file: paths.secrets().display().to_string(),
            usage_file: paths.usage().display().to_string(),
        }
    }
}

/// Data paths and routing settings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOutput<'a> {
    pub paths: PathsOutput,
    pub settings: &'a Settings,
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats the provider list with credentials redacted.
    pub fn format_providers(&self, providers: &[ProviderConfig]) -> Result<String> {
        let outputs: Vec<RedactedProvider> = providers.iter().map(RedactedProvider::from).collect();
        self.format(&outputs)
    }
}
