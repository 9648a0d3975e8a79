use std::sync::Arc;

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::{info, warn};

use closebook_closing::{ClosingConfig, Metrics, PeriodClosingService, StoreBackend};
use closebook_common::{now, PeriodId};
use closebook_ledger::PgStore;

use crate::{Cli, Command};

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn period_id(raw: &str) -> anyhow::Result<PeriodId> {
    PeriodId::parse(raw).with_context(|| format!("{raw} is not a valid period id"))
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = Arc::new(
        PgStore::connect(&cli.database_url, cli.max_connections)
            .await
            .context("connecting to database")?,
    );

    let config = ClosingConfig {
        database_url: cli.database_url.clone(),
        max_connections: cli.max_connections,
        store: StoreBackend::Postgres,
        retained_earnings_code: cli.retained_earnings_code.clone(),
        ..ClosingConfig::default()
    };
    config.validate().map_err(anyhow::Error::msg)?;

    let service = PeriodClosingService::new(store.clone(), &config, Arc::new(Metrics::new()));
    let ledger = service.ledger();

    match cli.command {
        Command::Migrate => {
            store.migrate().await?;
            info!("Migrations applied");
        }
        Command::Seed => {
            let created = ledger.seed_default_chart().await?;
            info!(created, "Chart of accounts seeded");
        }
        Command::RebuildBalances => {
            let summary = service.rebuild_balances().await?;
            print(&summary)?;
        }
        Command::Verify => {
            let report = ledger.verify().await?;
            print(&report)?;
            if !report.is_healthy {
                bail!(
                    "ledger is inconsistent: {} account(s), {} orphaned closing entr(ies)",
                    report.inconsistent_count,
                    report.orphan_closings.len()
                );
            }
        }
        Command::TrialBalance { as_of } => {
            let report = ledger.trial_balance(as_of.unwrap_or_else(|| now().date_naive())).await?;
            print(&report)?;
        }
        Command::Preview { range } => {
            let range = range.resolve()?;
            print(&service.preview(range.start, range.end).await?)?;
        }
        Command::Close { range, description } => {
            let range = range.resolve()?;
            info!(
                start = %range.start,
                end = %range.end,
                days = range.days(),
                fiscal_year = range.is_fiscal_year(),
                "Closing period"
            );
            let result = service.execute(range.start, range.end, &description).await?;
            print(&result)?;
        }
        Command::Lock { period_id: raw } => {
            print(&service.lock(period_id(&raw)?).await?)?;
        }
        Command::Reopen { period_id: raw, reason } => {
            print(&service.reopen(period_id(&raw)?, &reason).await?)?;
        }
        Command::CleanupOrphanClosings { dry_run } => {
            if dry_run {
                let report = ledger.verify().await?;
                if report.orphan_closings.is_empty() {
                    info!("No orphaned closing entries");
                } else {
                    warn!(count = report.orphan_closings.len(), "Orphaned closing entries found");
                }
                print(&report.orphan_closings)?;
            } else {
                print(&service.cleanup_orphan_closings().await?)?;
            }
        }
    }

    Ok(())
}
