//! Serve command - run the HTTP gateway until interrupted.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use llmgate_gateway::{DEFAULT_BIND, GatewayConfig, serve};
use tracing::info;

use crate::{Cli, ExitCode};

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, short, default_value = DEFAULT_BIND, env = "LLMGATE_BIND")]
    pub bind: String,

    /// Upstream call timeout in seconds.
    #[arg(long, default_value = "60")]
    pub timeout: u64,

    /// Usage flush interval in seconds.
    #[arg(long, default_value = "30")]
    pub flush_interval: u64,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            timeout: 60,
            flush_interval: 30,
        }
    }
}

impl ServeArgs {
    fn config(&self, cli: &Cli) -> GatewayConfig {
        GatewayConfig::new(cli.data_dir())
            .with_bind(self.bind.clone())
            .with_request_timeout(Duration::from_secs(self.timeout.max(1)))
            .with_flush_interval(Duration::from_secs(self.flush_interval.max(1)))
    }
}

/// Runs the gateway until Ctrl-C.
pub async fn run(args: &ServeArgs, cli: &Cli) -> Result<ExitCode> {
    let config = args.config(cli);
    let handle = serve(&config).await?;

    if !cli.quiet {
        eprintln!("llmgate listening on {}", handle.base_url());
        eprintln!("Data directory: {}", config.data_dir.display());
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutting down");
    handle.shutdown().await?;

    Ok(ExitCode::Success)
}
