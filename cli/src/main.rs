//! Closebook operations CLI
//!
//! Applies migrations, seeds the chart of accounts, repairs cached balances and
//! runs period closing against a PostgreSQL ledger, using the same library code
//! as the server.

use clap::{Args, Parser, Subcommand};
use chrono::NaiveDate;
use closebook_common::DateRange;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    closebook_common::parse_date(value, "date").map_err(|e| e.to_string())
}

/// Closebook operations CLI
#[derive(Parser, Debug)]
#[command(name = "closebook")]
#[command(about = "General ledger maintenance and period closing")]
pub struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", global = true, default_value = "postgres://localhost/closebook")]
    database_url: String,

    /// Connection pool size
    #[arg(long, env = "CLOSEBOOK_MAX_CONNECTIONS", global = true, default_value = "5")]
    max_connections: u32,

    /// Code of the retained earnings account
    #[arg(long, env = "CLOSEBOOK_RETAINED_EARNINGS_CODE", global = true, default_value = "3201")]
    retained_earnings_code: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply database migrations
    Migrate,
    /// Insert the default chart of accounts
    Seed,
    /// Recompute every cached account balance from posted journal lines
    RebuildBalances,
    /// Compare cached balances with the ledger; fails when inconsistent
    Verify,
    /// Print the trial balance
    TrialBalance {
        #[arg(long, value_parser = parse_date_arg)]
        as_of: Option<NaiveDate>,
    },
    /// Show what closing a period would post
    Preview {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Close a period
    Close {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Lock a closed period
    Lock { period_id: String },
    /// Reopen a closed period
    Reopen {
        period_id: String,
        #[arg(long)]
        reason: String,
    },
    /// Void closing entries no closed period references
    CleanupOrphanClosings {
        /// Only list the orphaned entries
        #[arg(long)]
        dry_run: bool,
    },
}

/// Period to preview or close: `--start/--end`, or `--year` with an optional `--month`.
#[derive(Args, Debug)]
pub struct RangeArgs {
    #[arg(long, value_parser = parse_date_arg, requires = "end", conflicts_with = "year")]
    start: Option<NaiveDate>,
    #[arg(long, value_parser = parse_date_arg, requires = "start")]
    end: Option<NaiveDate>,
    /// Whole calendar year
    #[arg(long)]
    year: Option<i32>,
    /// Single month of --year
    #[arg(long, requires = "year")]
    month: Option<u32>,
}

impl RangeArgs {
    pub fn resolve(&self) -> anyhow::Result<DateRange> {
        let range = match (self.start, self.end, self.year, self.month) {
            (Some(start), Some(end), None, None) => DateRange::new(start, end)?,
            (None, None, Some(year), Some(month)) => DateRange::month(year, month)?,
            (None, None, Some(year), None) => DateRange::year(year)?,
            _ => anyhow::bail!("give either --start and --end, or --year"),
        };
        Ok(range)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    commands::run(cli).await
}
