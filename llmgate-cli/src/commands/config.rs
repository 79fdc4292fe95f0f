//! Config command - show configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use llmgate_store::{DataPaths, Registry};

use crate::output::{ConfigOutput, JsonFormatter, PathsOutput, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show data paths and routing settings.
    Show,

    /// Show data paths.
    Path,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<ExitCode> {
    let paths = DataPaths::new(cli.data_dir());
    match &args.action {
        ConfigAction::Show => show_config(&paths, cli).await?,
        ConfigAction::Path => show_paths(&paths, cli)?,
    }
    Ok(ExitCode::Success)
}

async fn show_config(paths: &DataPaths, cli: &Cli) -> Result<()> {
    let registry = Registry::load(paths.providers()).await?;
    let settings = registry.settings().await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("llmgate Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("{}", formatter.format_settings(&settings));
            println!();
            println!("Data dir: {}", paths.root().display());
        }
        OutputFormat::Json => {
            let output = ConfigOutput {
                paths: PathsOutput::from(paths),
                settings: &settings,
            };
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }

    Ok(())
}

fn show_paths(paths: &DataPaths, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Data dir:       {}", paths.root().display());
            println!("Providers file: {}", paths.providers().display());
            println!("Secrets file:   {}", paths.secrets().display());
            println!("Usage file:     {}", paths.usage().display());
        }
        OutputFormat::Json => {
            let output = PathsOutput::from(paths);
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }

    Ok(())
}
