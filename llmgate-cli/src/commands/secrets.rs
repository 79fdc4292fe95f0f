//! Secrets command - inspect or regenerate the secrets file.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand};
use llmgate_store::{CredentialSync, DataPaths, Registry};
use tracing::info;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the secrets command.
#[derive(Args)]
pub struct SecretsArgs {
    #[command(subcommand)]
    pub action: SecretsAction,
}

/// Secrets subcommands.
#[derive(Subcommand)]
pub enum SecretsAction {
    /// Show whether the file exists and which providers it covers.
    Status,

    /// Regenerate the file from the registry.
    Refresh,

    /// Remove every credential from the file.
    Clear,
}

/// Runs the secrets command.
pub async fn run(args: &SecretsArgs, cli: &Cli) -> Result<ExitCode> {
    let paths = DataPaths::new(cli.data_dir());
    let registry = Arc::new(Registry::load(paths.providers()).await?);
    let sync = CredentialSync::new(registry, paths.secrets());

    match &args.action {
        SecretsAction::Status => {
            let status = sync.status().await?;
            match cli.format {
                OutputFormat::Text => {
                    let formatter = TextFormatter::new(!cli.no_color);
                    println!("{}", formatter.format_secrets_status(&status));
                }
                OutputFormat::Json => {
                    println!("{}", JsonFormatter::new(cli.pretty).format(&status)?);
                }
            }
        }
        SecretsAction::Refresh => {
            let snapshot = sync.refresh().await?;
            info!(entries = snapshot.len(), "Secrets refreshed");
            report(cli, &serde_json::json!({
                "success": true,
                "providers": snapshot.provider_ids(),
            }))?;
        }
        SecretsAction::Clear => {
            sync.clear().await?;
            report(cli, &serde_json::json!({"success": true}))?;
        }
    }

    Ok(ExitCode::Success)
}

fn report(cli: &Cli, value: &serde_json::Value) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            let providers = value["providers"]
                .as_array()
                .map(|ids| {
                    ids.iter()
                        .filter_map(serde_json::Value::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            if providers.is_empty() {
                println!("Secrets file written with no credentials");
            } else {
                println!("Secrets file written for: {providers}");
            }
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(value)?),
    }
    Ok(())
}
