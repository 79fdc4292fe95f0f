//! Domain models for llmgate.
//!
//! ## Submodules
//!
//! - [`provider`] - Provider configuration, patches and the redacted view
//! - [`status`] - Connection status
//! - [`settings`] - Routing and generation settings
//! - [`chat`] - Chat requests, resolved completions and results
//! - [`usage`] - Usage records, date ranges and summaries
//! - [`secrets`] - The derived secrets snapshot

mod chat;
mod provider;
mod secrets;
mod settings;
mod status;
mod usage;

pub use chat::{
    AttemptRecord, ChatError, ChatRequest, ChatResult, Completion, CompletionRequest,
};
pub use provider::{
    ProviderConfig, ProviderFamily, ProviderPatch, RedactedProvider, validate_id,
};
pub use secrets::{GENERATED_PREFIX, SNAPSHOT_HEADER, SecretsSnapshot};
pub use settings::{MAX_RETRY_ATTEMPTS, Settings, SettingsPatch};
pub use status::ConnectionStatus;
pub use usage::{DateRange, UsageRecord, UsageSummary, UsageTotals};
