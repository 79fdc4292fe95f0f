//! Shared gateway state.

use std::sync::Arc;

use anyhow::{Context, Result};
use llmgate_core::{ProviderPatch, RedactedProvider, Settings, SettingsPatch};
use llmgate_store::{CredentialSync, Registry, UsageLedger, ensure_dir};
use llmgate_upstream::{ChatCompletion, HttpChatClient};
use tracing::{info, instrument, warn};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::harness::TestHarness;
use crate::router::ChatRouter;

/// Every component of one gateway, wired together.
///
/// Cheap to clone; handlers receive it as axum state.
#[derive(Clone)]
pub struct Gateway {
    /// Provider table and settings.
    pub registry: Arc<Registry>,
    /// Secrets file writer.
    pub sync: Arc<CredentialSync>,
    /// Usage counters.
    pub ledger: Arc<UsageLedger>,
    /// Chat routing.
    pub router: Arc<ChatRouter>,
    /// Diagnostic tests.
    pub harness: Arc<TestHarness>,
}

impl Gateway {
    /// Wires components around an upstream client.
    pub fn new(
        registry: Arc<Registry>,
        sync: Arc<CredentialSync>,
        ledger: Arc<UsageLedger>,
        client: Arc<dyn ChatCompletion>,
    ) -> Self {
        let router = Arc::new(ChatRouter::new(registry.clone(), client.clone(), ledger.clone()));
        let harness = Arc::new(TestHarness::new(registry.clone(), client));
        Self {
            registry,
            sync,
            ledger,
            router,
            harness,
        }
    }

    /// Opens (or seeds) the state in `config.data_dir` with an HTTP client.
    ///
    /// The secrets file is regenerated once so it matches the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a state file is corrupt or cannot be written.
    pub async fn open(config: &GatewayConfig) -> Result<Self> {
        let client = HttpChatClient::new(config.request_timeout)
            .context("failed to build upstream HTTP client")?;
        Self::open_with_client(config, Arc::new(client)).await
    }

    /// Like [`Gateway::open`] with a caller-supplied upstream client.
    ///
    /// # Errors
    ///
    /// Returns an error if a state file is corrupt or cannot be written.
    pub async fn open_with_client(
        config: &GatewayConfig,
        client: Arc<dyn ChatCompletion>,
    ) -> Result<Self> {
        let paths = config.paths();
        ensure_dir(paths.root())
            .await
            .with_context(|| format!("failed to create {}", paths.root().display()))?;

        let registry = Arc::new(
            Registry::load(paths.providers())
                .await
                .with_context(|| format!("failed to load {}", paths.providers().display()))?,
        );
        let ledger = Arc::new(
            UsageLedger::load(paths.usage())
                .await
                .with_context(|| format!("failed to load {}", paths.usage().display()))?,
        );
        let sync = Arc::new(CredentialSync::new(registry.clone(), paths.secrets()));
        sync.refresh().await.context("failed to write secrets file")?;

        info!(data_dir = %paths.root().display(), "Gateway state opened");
        Ok(Self::new(registry, sync, ledger, client))
    }

    /// Applies a provider patch and regenerates the secrets file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Validation` if the patch is rejected, or
    /// `Sync` if the update was saved but the secrets file was not
    /// rewritten. The update is never rolled back.
    #[instrument(skip(self, patch))]
    pub async fn update_provider(
        &self,
        id: &str,
        patch: &ProviderPatch,
    ) -> Result<RedactedProvider, GatewayError> {
        let updated = self.registry.update(id, patch).await?;

        if let Err(e) = self.sync.refresh().await {
            warn!(provider = %id, error = %e, "Provider updated but secrets sync failed");
            return Err(GatewayError::Sync(e));
        }

        Ok(RedactedProvider::from(&updated))
    }

    /// Applies a settings patch.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the patch is rejected or an IO error if it
    /// cannot be saved.
    pub async fn update_settings(&self, patch: &SettingsPatch) -> Result<Settings, GatewayError> {
        Ok(self.registry.update_settings(patch).await?)
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("registry", &self.registry.path())
            .field("secrets", &self.sync.path())
            .field("usage", &self.ledger.path())
            .finish_non_exhaustive()
    }
}
