//! Providers command - list configured providers.

use anyhow::Result;
use llmgate_core::RedactedProvider;
use llmgate_store::{DataPaths, Registry};
use tracing::info;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Runs the providers command.
pub async fn run(cli: &Cli) -> Result<ExitCode> {
    info!("Listing providers");

    let paths = DataPaths::new(cli.data_dir());
    let registry = Registry::load(paths.providers()).await?;
    let snapshot = registry.snapshot().await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);

            println!("{}", formatter.format_providers_header());
            println!("{}", "─".repeat(70));

            for provider in &snapshot.providers {
                let is_default = provider.id == snapshot.settings.default_provider;
                println!(
                    "{}",
                    formatter.format_provider_line(&RedactedProvider::from(provider), is_default)
                );
            }

            println!();
            println!(
                "Total: {} providers ({} enabled, * = default)",
                snapshot.providers.len(),
                snapshot.providers.iter().filter(|p| p.enabled).count()
            );
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_providers(&snapshot.providers)?);
        }
    }

    Ok(ExitCode::Success)
}
