//! Text output formatting with colors.

use chrono::{DateTime, Local, Utc};
use llmgate_core::{ConnectionStatus, RedactedProvider, Settings, UsageSummary, UsageTotals};
use llmgate_gateway::TestResult;
use llmgate_store::SecretsStatus;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    // ========================================================================
    // Providers
    // ========================================================================

    /// Formats the provider list header.
    pub fn format_providers_header(&self) -> String {
        format!(
            "{:<14} {:<9} {:<9} {:<24} {}",
            self.bold("Provider"),
            self.bold("Enabled"),
            self.bold("Key"),
            self.bold("Model"),
            self.bold("Status")
        )
    }

    /// Formats one provider row. `is_default` marks the default provider.
    pub fn format_provider_line(&self, provider: &RedactedProvider, is_default: bool) -> String {
        let enabled = if provider.enabled {
            self.green("✓")
        } else {
            self.dim("−")
        };
        let key = if provider.has_credential {
            self.green("set")
        } else {
            self.dim("−")
        };
        let id = if is_default {
            format!("{}*", provider.id)
        } else {
            provider.id.clone()
        };

        format!(
            "{:<14} {:<9} {:<9} {:<24} {}",
            id,
            enabled,
            key,
            provider.model,
            self.format_status(provider.status)
        )
    }

    fn format_status(&self, status: ConnectionStatus) -> String {
        match status {
            ConnectionStatus::Connected => self.green(status.label()),
            ConnectionStatus::Error => self.red(status.label()),
            ConnectionStatus::Disconnected => self.dim(status.label()),
        }
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Formats a diagnostic test result.
    pub fn format_test_result(&self, result: &TestResult) -> String {
        let mut lines = Vec::new();

        lines.push(format!("{} diagnostic test", self.bold(&result.provider_id)));
        lines.push("─".repeat(40));

        let connection = &result.connection_test;
        lines.push(format!(
            "Connection: {} {} {}",
            self.check(connection.success),
            connection.message,
            self.dim(&format!("({} ms)", connection.latency_ms))
        ));

        let chat = &result.chat_test;
        match (&chat.response, &chat.error) {
            (Some(response), _) => {
                lines.push(format!("Chat:       {} {}", self.check(true), chat.model));
                lines.push(format!(
                    "Tokens:     {} in / {} out",
                    chat.tokens_in, chat.tokens_out
                ));
                lines.push(format!("Response:   {}", self.cyan(response.trim())));
            }
            (None, Some(error)) => {
                lines.push(format!(
                    "Chat:       {} {}: {}",
                    self.check(false),
                    self.yellow(error.kind.as_str()),
                    error.message
                ));
            }
            (None, None) => lines.push(format!("Chat:       {}", self.check(chat.success))),
        }

        if let Some(raw) = &result.raw_data {
            lines.push(String::new());
            lines.push(self.dim("Request:"));
            lines.push(format!("  {} {}", raw.request.method, raw.request.url));
            for (name, value) in &raw.request.headers {
                lines.push(format!("  {name}: {value}"));
            }
            lines.push(format!("  {}", raw.request.body));
            if let Some(response) = &raw.response {
                lines.push(self.dim("Response:"));
                lines.push(format!("  {response}"));
            }
            if let Some(details) = &raw.error_details {
                lines.push(self.dim("Error details:"));
                let status = details
                    .status
                    .map_or_else(|| "no response".to_string(), |s| format!("HTTP {s}"));
                lines.push(format!(
                    "  {} ({}, {} ms): {}",
                    details.kind, status, details.elapsed_ms, details.message
                ));
            }
        }

        lines.push(String::new());
        lines.push(self.dim(&format!("Tested {}", format_time(result.tested_at))));
        lines.join("\n")
    }

    // ========================================================================
    // Usage
    // ========================================================================

    /// Formats a usage summary with per-provider rows.
    pub fn format_usage(&self, summary: &UsageSummary) -> String {
        let mut lines = Vec::new();

        let title = match &summary.provider {
            Some(provider) => format!("Usage for {provider}"),
            None => "Usage".to_string(),
        };
        lines.push(format!(
            "{} {}",
            self.bold(&title),
            self.dim(&format!("({} to {})", summary.from, summary.to))
        ));
        lines.push("─".repeat(56));
        lines.push(format!(
            "{:<14} {:>9} {:>9} {:>9} {:>9}",
            "Provider", "Requests", "In", "Out", "Errors"
        ));

        for (provider, totals) in &summary.providers {
            lines.push(self.format_usage_row(provider, totals));
        }
        if summary.providers.is_empty() {
            lines.push(self.dim("No usage recorded"));
        }

        lines.push("─".repeat(56));
        lines.push(self.bold(&self.format_usage_row("Total", &summary.totals)));
        lines.join("\n")
    }

    fn format_usage_row(&self, label: &str, totals: &UsageTotals) -> String {
        let errors = if totals.error_count > 0 {
            self.red(&totals.error_count.to_string())
        } else {
            totals.error_count.to_string()
        };
        format!(
            "{:<14} {:>9} {:>9} {:>9} {:>9}",
            label,
            format_number(totals.request_count),
            format_number(totals.tokens_in),
            format_number(totals.tokens_out),
            errors
        )
    }

    // ========================================================================
    // Secrets & Settings
    // ========================================================================

    /// Formats the secrets file status.
    pub fn format_secrets_status(&self, status: &SecretsStatus) -> String {
        let mut lines = Vec::new();
        lines.push(self.bold("Secrets File"));
        lines.push("─".repeat(40));
        lines.push(format!("Path:      {}", status.path));

        if status.exists {
            lines.push(format!("Exists:    {}", self.green("yes")));
            lines.push(format!("Size:      {} bytes", status.size_bytes));
            if let Some(modified) = status.modified_at {
                lines.push(format!("Modified:  {}", format_time(modified)));
            }
            lines.push(format!("Keys for:  {}", join_or_none(&status.providers)));
        } else {
            lines.push(format!("Exists:    {}", self.yellow("no")));
        }
        lines.push(format!("Enabled:   {}", join_or_none(&status.enabled_providers)));
        lines.join("\n")
    }

    /// Formats routing settings.
    pub fn format_settings(&self, settings: &Settings) -> String {
        let fallback = settings.fallback_provider.as_deref().unwrap_or("−");
        [
            format!("Default provider:  {}", self.cyan(&settings.default_provider)),
            format!("Fallback provider: {fallback}"),
            format!("Auto fallback:     {}", settings.auto_fallback),
            format!("Retry attempts:    {}", settings.retry_attempts),
            format!("Temperature:       {}", settings.temperature),
            format!("Max tokens:        {}", settings.max_tokens),
            format!("System prompt:     {}", self.dim(&settings.system_prompt)),
        ]
        .join("\n")
    }

    // ========================================================================
    // Color Helpers
    // ========================================================================

    fn check(&self, ok: bool) -> String {
        if ok {
            self.green("✓")
        } else {
            self.red("✗")
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

/// Formats a count with K/M suffixes above a thousand.
#[allow(clippy::cast_precision_loss)]
pub fn format_number(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn join_or_none(ids: &[String]) -> String {
    if ids.is_empty() {
        "−".to_string()
    } else {
        ids.join(", ")
    }
}
