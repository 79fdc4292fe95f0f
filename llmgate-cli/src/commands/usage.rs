//! Usage command - show recorded usage counters.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::Args;
use llmgate_core::DateRange;
use llmgate_gateway::api::DEFAULT_USAGE_DAYS;
use llmgate_store::{DataPaths, UsageLedger};
use tracing::debug;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the usage command.
#[derive(Args, Default)]
pub struct UsageArgs {
    /// First day (YYYY-MM-DD). Defaults to a week before `--to`.
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Only count this provider.
    #[arg(long, short)]
    pub provider: Option<String>,
}

/// Runs the usage command.
///
/// Reads the usage file; counters not yet flushed by a running gateway
/// are not included.
pub async fn run(args: &UsageArgs, cli: &Cli) -> Result<ExitCode> {
    let range = DateRange::from_bounds(
        args.from,
        args.to,
        Utc::now().date_naive(),
        DEFAULT_USAGE_DAYS,
    )?;
    debug!(from = %range.from, to = %range.to, "Querying usage");

    let paths = DataPaths::new(cli.data_dir());
    let ledger = UsageLedger::load(paths.usage()).await?;
    let summary = ledger.query(range, args.provider.as_deref()).await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_usage(&summary));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&summary)?);
        }
    }

    Ok(ExitCode::Success)
}
