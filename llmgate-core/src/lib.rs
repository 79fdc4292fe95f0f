// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # llmgate Core
//!
//! Core types, models, and the error taxonomy shared by every `llmgate`
//! crate.
//!
//! This crate provides the foundational abstractions used across the
//! gateway, including:
//!
//! - Domain models (providers, settings, chat requests/results, usage)
//! - Error types and the machine-readable [`ErrorKind`] taxonomy
//! - Credential redaction helpers
//!
//! ## Key Types
//!
//! ### Provider Types
//! - [`ProviderConfig`] - One upstream provider (enabled flag, model, base URL, credential)
//! - [`ProviderPatch`] - Partial update applied through the registry
//! - [`ProviderFamily`] - Wire dialect spoken by the provider
//! - [`ConnectionStatus`] - Last-known connectivity
//!
//! ### Routing Types
//! - [`Settings`] - Default/fallback provider and generation defaults
//! - [`ChatRequest`] / [`ChatResult`] - Gateway request and response
//! - [`CompletionRequest`] / [`Completion`] - Resolved upstream call and its result
//!
//! ### Accounting Types
//! - [`UsageRecord`] / [`UsageTotals`] / [`UsageSummary`] - Per-day, per-provider counters
//! - [`SecretsSnapshot`] - Credentials of enabled providers, rendered as a dotenv file

pub mod error;
pub mod models;
pub mod redact;

// Re-export error types
pub use error::{CoreError, ErrorKind};

// Re-export all model types
pub use models::{
    // Provider types
    ConnectionStatus,
    ProviderConfig,
    ProviderFamily,
    ProviderPatch,
    RedactedProvider,
    validate_id,
    // Settings
    MAX_RETRY_ATTEMPTS,
    Settings,
    SettingsPatch,
    // Chat types
    AttemptRecord,
    ChatError,
    ChatRequest,
    ChatResult,
    Completion,
    CompletionRequest,
    // Usage types
    DateRange,
    UsageRecord,
    UsageSummary,
    UsageTotals,
    // Secrets
    GENERATED_PREFIX,
    SNAPSHOT_HEADER,
    SecretsSnapshot,
};

pub use redact::{
    MIN_SCRUB_LEN, REDACTED, redact_credential, redact_header, redact_secret, redact_value,
};
