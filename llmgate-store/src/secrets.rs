//! Credential synchronizer.
//!
//! Derives the secrets file from the registry. The file is regenerated
//! wholesale on every refresh and never patched in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use llmgate_core::SecretsSnapshot;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;
use crate::persistence::write_atomic;
use crate::registry::Registry;

/// Status of the secrets file, without any secret values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsStatus {
    /// Whether the file exists.
    pub exists: bool,
    /// Absolute or configured path of the file.
    pub path: String,
    /// File size.
    pub size_bytes: u64,
    /// Last modification time.
    pub modified_at: Option<DateTime<Utc>>,
    /// Provider ids whose key is present in the file.
    pub providers: Vec<String>,
    /// Provider ids currently enabled in the registry.
    pub enabled_providers: Vec<String>,
}

/// Keeps the secrets file consistent with the registry.
///
/// Reads the registry but never mutates it. Refreshes are serialized so an
/// older snapshot can never overwrite a newer one.
pub struct CredentialSync {
    registry: Arc<Registry>,
    path: PathBuf,
    lock: Mutex<()>,
}

impl CredentialSync {
    /// Creates a synchronizer writing to `path`.
    pub fn new(registry: Arc<Registry>, path: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the secrets file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recomputes the snapshot from the registry and writes it atomically.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the write fails; the previous file is left
    /// untouched and the registry is not rolled back.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn refresh(&self) -> Result<SecretsSnapshot, StoreError> {
        let _guard = self.lock.lock().await;

        let providers = self.registry.list().await;
        let snapshot = SecretsSnapshot::from_providers(&providers);
        let contents = snapshot.render(Utc::now());

        if let Err(e) = write_atomic(&self.path, contents.as_bytes()).await {
            warn!(error = %e, "Secrets refresh failed; previous file kept");
            return Err(e);
        }

        info!(entries = snapshot.len(), "Secrets file refreshed");
        Ok(snapshot)
    }

    /// Rewrites the secrets file with no entries.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the write fails.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        let contents = SecretsSnapshot::empty().render(Utc::now());
        write_atomic(&self.path, contents.as_bytes()).await?;

        info!("Secrets file cleared");
        Ok(())
    }

    /// Reports on the secrets file without reading out any values.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file exists but cannot be read.
    pub async fn status(&self) -> Result<SecretsStatus, StoreError> {
        let providers = self.registry.list().await;
        let enabled_providers = providers
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.id.clone())
            .collect();

        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Secrets file not found");
                return Ok(SecretsStatus {
                    exists: false,
                    path: self.path.display().to_string(),
                    size_bytes: 0,
                    modified_at: None,
                    providers: Vec::new(),
                    enabled_providers,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let contents = tokio::fs::read_to_string(&self.path).await?;
        let keys = SecretsSnapshot::keys_in(&contents);
        let present = providers
            .iter()
            .filter(|p| keys.contains(&SecretsSnapshot::env_key(&p.id)))
            .map(|p| p.id.clone())
            .collect();

        Ok(SecretsStatus {
            exists: true,
            path: self.path.display().to_string(),
            size_bytes: metadata.len(),
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            providers: present,
            enabled_providers,
        })
    }
}

impl std::fmt::Debug for CredentialSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSync").field("path", &self.path).finish_non_exhaustive()
    }
}
