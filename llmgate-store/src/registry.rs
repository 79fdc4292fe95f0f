//! Provider registry.
//!
//! The registry owns the provider table and the settings. It is read-mostly:
//! reads take a shared lock and clone, while every mutation runs
//! read-validate-persist-swap under one writer lock. The new state is
//! written to disk before it becomes visible, so a successful mutation is
//! always durable and a reader never observes a half-applied patch.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use llmgate_core::{
    ConnectionStatus, ProviderConfig, ProviderPatch, SecretsSnapshot, Settings, SettingsPatch,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::persistence::{load_json, save_json};
use crate::seeds::default_providers;

// ============================================================================
// Backing File
// ============================================================================

/// On-disk shape of the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryFile {
    /// Gateway settings.
    #[serde(default)]
    pub settings: Settings,
    /// Providers in insertion order.
    pub providers: Vec<ProviderConfig>,
}

impl RegistryFile {
    /// Validates every provider, id uniqueness and the settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] naming the first problem.
    pub fn validate(&self) -> Result<(), StoreError> {
        for (i, provider) in self.providers.iter().enumerate() {
            provider
                .validate()
                .map_err(|e| StoreError::Validation(format!("provider {}: {e}", provider.id)))?;
            if self.providers[..i].iter().any(|p| p.id == provider.id) {
                return Err(StoreError::Validation(format!(
                    "duplicate provider id {:?}",
                    provider.id
                )));
            }
            // Each provider needs its own line in the secrets file.
            let key = SecretsSnapshot::env_key(&provider.id);
            if let Some(other) = self.providers[..i]
                .iter()
                .find(|p| SecretsSnapshot::env_key(&p.id) == key)
            {
                return Err(StoreError::Validation(format!(
                    "provider ids {:?} and {:?} both map to secrets key {key}",
                    other.id, provider.id
                )));
            }
        }
        self.settings.validate(&self.providers)?;
        Ok(())
    }

    fn position(&self, id: &str) -> Result<usize, StoreError> {
        self.providers
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoreError::ProviderNotFound(id.to_string()))
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Persistent provider table and settings.
pub struct Registry {
    state: RwLock<RegistryFile>,
    writer: Mutex<()>,
    path: PathBuf,
}

impl Registry {
    /// Loads the registry from `path`, seeding it on first start.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated, or if the seeded registry cannot be written. A corrupt
    /// file is never replaced by defaults.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            info!(path = %path.display(), "Loading registry");
            let file: RegistryFile = load_json(&path).await?;
            file.validate()?;
            return Ok(Self::from_parts(path, file));
        }

        debug!(path = %path.display(), "Registry file not found, seeding defaults");
        let file = RegistryFile {
            settings: Settings::default(),
            providers: default_providers()?,
        };
        Self::create(path, file).await
    }

    /// Creates a registry with the given contents and persists it.
    ///
    /// # Errors
    ///
    /// Returns an error if the contents are invalid or cannot be written.
    pub async fn create(path: impl Into<PathBuf>, file: RegistryFile) -> Result<Self, StoreError> {
        let path = path.into();
        file.validate()?;
        save_json(&path, &file).await?;
        info!(path = %path.display(), providers = file.providers.len(), "Registry created");
        Ok(Self::from_parts(path, file))
    }

    fn from_parts(path: PathBuf, file: RegistryFile) -> Self {
        Self {
            state: RwLock::new(file),
            writer: Mutex::new(()),
            path,
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Gets a provider by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ProviderNotFound`] if no provider has that id.
    pub async fn get(&self, id: &str) -> Result<ProviderConfig, StoreError> {
        let state = self.state.read().await;
        let index = state.position(id)?;
        Ok(state.providers[index].clone())
    }

    /// Lists all providers in insertion order.
    pub async fn list(&self) -> Vec<ProviderConfig> {
        self.state.read().await.providers.clone()
    }

    /// Gets a copy of the current settings.
    pub async fn settings(&self) -> Settings {
        self.state.read().await.settings.clone()
    }

    /// Gets settings and providers from one consistent state.
    pub async fn snapshot(&self) -> RegistryFile {
        self.state.read().await.clone()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Applies `patch` to provider `id`, persists, then publishes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ProviderNotFound`] for an unknown id,
    /// [`StoreError::Validation`] if the patched record is invalid, or an
    /// IO error if persisting fails. On any error nothing changes.
    #[instrument(skip(self, patch), fields(provider = %id))]
    pub async fn update(&self, id: &str, patch: &ProviderPatch) -> Result<ProviderConfig, StoreError> {
        let updated = self
            .mutate(|file| {
                let index = file.position(id)?;
                let next = patch.apply(&file.providers[index])?;
                file.providers[index] = next.clone();
                Ok(next)
            })
            .await?;

        info!(enabled = updated.enabled, model = %updated.model, "Provider updated");
        Ok(updated)
    }

    /// Applies a settings patch, persists, then publishes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if the patched settings are
    /// invalid, or an IO error if persisting fails.
    #[instrument(skip(self, patch))]
    pub async fn update_settings(&self, patch: &SettingsPatch) -> Result<Settings, StoreError> {
        let settings = self
            .mutate(|file| {
                let next = patch.apply(&file.settings, &file.providers)?;
                file.settings = next.clone();
                Ok(next)
            })
            .await?;

        info!(
            default_provider = %settings.default_provider,
            fallback_provider = ?settings.fallback_provider,
            "Settings updated"
        );
        Ok(settings)
    }

    /// Records the outcome of a connectivity check.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ProviderNotFound`] for an unknown id or an IO
    /// error if persisting fails.
    pub async fn set_status(
        &self,
        id: &str,
        status: ConnectionStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.mutate(|file| {
            let index = file.position(id)?;
            let provider = &mut file.providers[index];
            provider.status = status;
            provider.last_checked = Some(checked_at);
            Ok(())
        })
        .await?;

        debug!(provider = %id, status = status.label(), "Provider status recorded");
        Ok(())
    }

    /// Runs `f` on a copy of the state, persists the copy, then swaps it in.
    async fn mutate<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut RegistryFile) -> Result<T, StoreError>,
    {
        let _writer = self.writer.lock().await;

        let mut next = self.state.read().await.clone();
        let value = f(&mut next)?;
        save_json(&self.path, &next).await?;

        *self.state.write().await = next;
        Ok(value)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("path", &self.path).finish_non_exhaustive()
    }
}
