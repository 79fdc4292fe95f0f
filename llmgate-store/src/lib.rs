// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # llmgate Store
//!
//! Durable state for the gateway.
//!
//! This crate provides:
//!
//! - **Registry**: provider table and settings, persisted synchronously on every mutation
//! - **CredentialSync**: regenerates the secrets file from the registry
//! - **UsageLedger**: per-day, per-provider counters with lock-free increments
//! - **Persistence**: atomic file writes with owner-only permissions
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use llmgate_store::{CredentialSync, Registry, UsageLedger, DataPaths};
//!
//! let paths = DataPaths::new(data_dir);
//! let registry = Arc::new(Registry::load(paths.providers()).await?);
//! let sync = CredentialSync::new(registry.clone(), paths.secrets());
//! let ledger = UsageLedger::load(paths.usage()).await?;
//!
//! registry.update("openai", &patch).await?;
//! sync.refresh().await?;
//! ```

pub mod error;
pub mod ledger;
pub mod persistence;
pub mod registry;
pub mod secrets;
pub mod seeds;

pub use error::StoreError;
pub use ledger::UsageLedger;
pub use persistence::{
    DataPaths, PROVIDERS_FILE, SECRETS_FILE, USAGE_FILE, default_data_dir, ensure_dir, load_json,
    load_json_or_default, save_json, write_atomic,
};
pub use registry::{Registry, RegistryFile};
pub use secrets::{CredentialSync, SecretsStatus};
pub use seeds::{LOCAL_PROVIDER_ID, default_providers};
