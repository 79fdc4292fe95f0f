//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

use llmgate_store::{DataPaths, default_data_dir};

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

/// Default bound on one upstream call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default interval between usage ledger flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Runtime configuration for one gateway process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Directory holding the registry, secrets and usage files.
    pub data_dir: PathBuf,
    /// Address to listen on; port 0 picks a free port.
    pub bind: String,
    /// Bound on each upstream call.
    pub request_timeout: Duration,
    /// How often dirty usage counters are written out.
    pub usage_flush_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bind: DEFAULT_BIND.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            usage_flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl GatewayConfig {
    /// Creates a configuration rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Sets the listen address.
    #[must_use]
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// Sets the upstream call timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the usage flush interval.
    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.usage_flush_interval = interval;
        self
    }

    /// Returns the file layout inside the data directory.
    pub fn paths(&self) -> DataPaths {
        DataPaths::new(&self.data_dir)
    }
}
