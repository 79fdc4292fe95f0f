//! The secrets snapshot.
//!
//! A [`SecretsSnapshot`] is derived from the provider table and never edited
//! by hand. It renders to a dotenv file whose body depends only on the
//! provider table, so re-rendering an unchanged table gives byte-identical
//! output apart from the `# Generated:` line.

use chrono::{DateTime, SecondsFormat, Utc};

use super::provider::ProviderConfig;
use crate::redact::REDACTED;

/// First line of every rendered snapshot.
pub const SNAPSHOT_HEADER: &str = "# Managed by llmgate. Do not edit.";

/// Prefix of the timestamp comment line.
pub const GENERATED_PREFIX: &str = "# Generated: ";

/// Credentials of enabled providers, in registry order.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretsSnapshot {
    entries: Vec<(String, String)>,
}

impl SecretsSnapshot {
    /// Builds the snapshot from the provider table.
    ///
    /// Only providers that are enabled and have a non-empty credential are
    /// included.
    pub fn from_providers<'a, I>(providers: I) -> Self
    where
        I: IntoIterator<Item = &'a ProviderConfig>,
    {
        let entries = providers
            .into_iter()
            .filter(|p| p.enabled && p.has_credential())
            .map(|p| (p.id.clone(), p.credential.clone()))
            .collect();
        Self { entries }
    }

    /// An empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the provider ids present, in order.
    pub fn provider_ids(&self) -> Vec<String> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Returns true if `id` is in the snapshot.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|(entry, _)| entry == id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the snapshot as a dotenv file.
    pub fn render(&self, generated_at: DateTime<Utc>) -> String {
        let mut out = String::new();
        out.push_str(SNAPSHOT_HEADER);
        out.push('\n');
        out.push_str(GENERATED_PREFIX);
        out.push_str(&generated_at.to_rfc3339_opts(SecondsFormat::Secs, true));
        out.push('\n');
        for (id, credential) in &self.entries {
            out.push_str(&Self::env_key(id));
            out.push('=');
            out.push_str(&quote_value(credential));
            out.push('\n');
        }
        out
    }

    /// Returns the environment variable name for a provider id.
    ///
    /// `local-llm` becomes `LOCAL_LLM_API_KEY`.
    pub fn env_key(id: &str) -> String {
        let mut key: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        key.push_str("_API_KEY");
        key
    }

    /// Parses the provider keys present in a rendered file.
    ///
    /// Values are not returned; this only serves status reporting.
    pub fn keys_in(contents: &str) -> Vec<String> {
        contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('=').map(|(key, _)| key.trim().to_string()))
            .collect()
    }
}

impl std::fmt::Debug for SecretsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(id, _)| (id, REDACTED)))
            .finish()
    }
}

fn quote_value(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '=' | '\\'));
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
