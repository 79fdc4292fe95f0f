// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! llmgate CLI - run the gateway and inspect its state.
//!
//! # Examples
//!
//! ```bash
//! # Start the gateway on the default address
//! llmgate serve
//!
//! # List providers (credentials redacted)
//! llmgate providers
//!
//! # Test one provider and show the raw exchange
//! llmgate test openai --raw
//!
//! # Usage for the last week, as JSON
//! llmgate usage --format json --pretty
//!
//! # Regenerate the secrets file
//! llmgate secrets refresh
//! ```

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use llmgate_store::default_data_dir;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{config, providers, secrets, serve, test, usage};

// ============================================================================
// CLI Definition
// ============================================================================

/// llmgate CLI - chat gateway for interchangeable LLM providers.
#[derive(Parser)]
#[command(name = "llmgate")]
#[command(about = "Chat gateway for interchangeable LLM providers")]
#[command(long_about = r#"
llmgate routes chat requests to OpenAI-compatible providers, with
one-hop fallback, per-provider diagnostics and daily usage counters.

Examples:
  llmgate serve --bind 127.0.0.1:8787   # Run the HTTP gateway
  llmgate providers                     # List providers
  llmgate test groq --raw               # Diagnose one provider
  llmgate usage --from 2025-06-01       # Usage since a date
  llmgate secrets status                # Secrets file status
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'serve'.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Data directory (registry, secrets and usage files).
    #[arg(long, short = 'd', global = true, env = "LLMGATE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (debug logging).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (no logging).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

impl Cli {
    /// Resolves the data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP gateway (default if no command specified).
    Serve(serve::ServeArgs),

    /// List providers.
    #[command(visible_alias = "p")]
    Providers,

    /// Run a diagnostic test against one provider.
    #[command(visible_alias = "t")]
    Test(test::TestArgs),

    /// Show usage counters.
    #[command(visible_alias = "u")]
    Usage(usage::UsageArgs),

    /// Manage the secrets file.
    Secrets(secrets::SecretsArgs),

    /// Show configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// A diagnostic test ran but the provider failed it.
    TestFailed = 2,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let serving = matches!(cli.command, None | Some(Commands::Serve(_)));
    let default = match (cli.verbose, serving) {
        (true, _) => "llmgate=debug,info",
        (false, true) => "llmgate=info",
        (false, false) => "llmgate=warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli);

    let result = match &cli.command {
        Some(Commands::Serve(args)) => serve::run(args, &cli).await,
        Some(Commands::Providers) => providers::run(&cli).await,
        Some(Commands::Test(args)) => test::run(args, &cli).await,
        Some(Commands::Usage(args)) => usage::run(args, &cli).await,
        Some(Commands::Secrets(args)) => secrets::run(args, &cli).await,
        Some(Commands::Config(args)) => config::run(args, &cli).await,
        None => serve::run(&serve::ServeArgs::default(), &cli).await,
    };

    match result {
        Ok(ExitCode::Success) => Ok(()),
        Ok(code) => std::process::exit(code as i32),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    }
}
