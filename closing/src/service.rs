//! Period closing service.
//!
//! Runs the closing routine inside one ledger transaction:
//! aggregate balances at the period end, build and post the closing entry,
//! rewrite every cached balance, mark the period closed and validate.
//! Any failure drops the transaction, so nothing half-closed survives.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use closebook_common::{
    next_day, AccountId, AccountingPeriod, ErrorCategory, JournalId, LedgerError, PeriodId,
    PeriodStatus, Result,
};
use closebook_ledger::engine::{
    aggregate, closing_entries, record_entry, recompute_balances, void_entry,
};
use closebook_ledger::report::orphan_closings;
use closebook_ledger::{
    Account, AccountType, Cutoff, JournalEntry, JournalStatus, LedgerEngine, LedgerStore,
    LedgerTx, RecomputeSummary,
};

use crate::builder::{ClosingLine, ClosingPlan};
use crate::config::ClosingConfig;
use crate::metrics::Metrics;
use crate::validator::ClosingValidator;

/// Default page size for period listings.
pub const DEFAULT_PERIOD_PAGE: usize = 12;
const MAX_PAGE: usize = 100;

/// Retained earnings account the closing entry credits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetainedEarnings {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
}

impl From<&Account> for RetainedEarnings {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id,
            code: account.code.clone(),
            name: account.name.clone(),
        }
    }
}

/// Read-only view of what a closing would do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosingPreview {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_revenue: Decimal,
    pub total_expense: Decimal,
    pub net_income: Decimal,
    /// Amount the closing entry would credit to retained earnings.
    pub retained_earnings_change: Decimal,
    pub revenue_accounts: usize,
    pub expense_accounts: usize,
    /// The closing would be accepted.
    pub can_close: bool,
    /// Some revenue or expense account carries a balance.
    pub requires_closing_entry: bool,
    /// Why `can_close` is false.
    pub reason: Option<String>,
    /// Status of an existing period with this exact range.
    pub period_status: Option<PeriodStatus>,
    pub retained_earnings: RetainedEarnings,
    pub lines: Vec<ClosingLine>,
}

/// Outcome of a committed closing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosingResult {
    pub period: AccountingPeriod,
    pub closing_journal_id: Option<JournalId>,
    pub total_revenue: Decimal,
    pub total_expense: Decimal,
    pub net_income: Decimal,
    /// Amount credited to retained earnings.
    pub retained_earnings_change: Decimal,
    pub revenue_accounts: usize,
    pub expense_accounts: usize,
    pub lines_posted: usize,
    pub balances_updated: usize,
}

/// Outcome of a reopen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReopenResult {
    pub period: AccountingPeriod,
    pub voided_journal_id: Option<JournalId>,
    pub balances_updated: usize,
}

/// Most recent closing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastClosingInfo {
    pub has_previous_closing: bool,
    pub period_id: Option<PeriodId>,
    pub last_closing_date: Option<NaiveDate>,
    pub next_start_date: Option<NaiveDate>,
    pub last_net_income: Option<Decimal>,
}

/// Where a history item comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySource {
    AccountingPeriod,
    JournalEntry,
}

/// One row of the closing history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosingHistoryItem {
    pub id: String,
    pub code: String,
    pub source: HistorySource,
    pub start_date: Option<NaiveDate>,
    pub end_date: NaiveDate,
    pub description: String,
    pub status: String,
    pub total_revenue: Option<Decimal>,
    pub total_expense: Option<Decimal>,
    pub net_income: Option<Decimal>,
    /// Debit total of the closing entry.
    pub amount: Option<Decimal>,
    pub closing_journal_id: Option<JournalId>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl ClosingHistoryItem {
    fn from_period(period: &AccountingPeriod, entries: &[JournalEntry]) -> Self {
        let amount = period
            .closing_journal_id
            .and_then(|id| entries.iter().find(|e| e.id == id))
            .map(|e| e.total_debit);
        Self {
            id: period.id.to_string(),
            code: period.code(),
            source: HistorySource::AccountingPeriod,
            start_date: Some(period.start_date),
            end_date: period.end_date,
            description: period.description.clone(),
            status: period.status().as_str().to_string(),
            total_revenue: Some(period.total_revenue),
            total_expense: Some(period.total_expense),
            net_income: Some(period.net_income),
            amount,
            closing_journal_id: period.closing_journal_id,
            closed_at: period.closed_at,
        }
    }

    fn from_entry(entry: &JournalEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            code: format!("CLO-{}", entry.id),
            source: HistorySource::JournalEntry,
            start_date: None,
            end_date: entry.entry_date,
            description: entry.description.clone(),
            status: entry.status.as_str().to_string(),
            total_revenue: None,
            total_expense: None,
            net_income: None,
            amount: Some(entry.total_debit),
            closing_journal_id: Some(entry.id),
            closed_at: entry.posted_at,
        }
    }
}

/// Closing history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosingHistory {
    pub items: Vec<ClosingHistoryItem>,
    pub count: usize,
}

/// Period listing filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeriodFilter {
    pub status: Option<PeriodStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// One page of periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodPage {
    pub periods: Vec<AccountingPeriod>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Outcome of an orphaned closing cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupSummary {
    pub voided: Vec<JournalId>,
    pub balances_updated: usize,
}

/// Period closing, lifecycle and history over a ledger store.
pub struct PeriodClosingService<S> {
    store: Arc<S>,
    ledger: LedgerEngine<S>,
    validator: ClosingValidator,
    retained_earnings_code: String,
    history_limit: usize,
    metrics: Arc<Metrics>,
}

impl<S: LedgerStore> PeriodClosingService<S> {
    /// Create a service with the configured retained earnings code and tolerance.
    pub fn new(store: Arc<S>, config: &ClosingConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            ledger: LedgerEngine::new(store.clone()).with_epsilon(config.balance_epsilon),
            store,
            validator: ClosingValidator::new(config.balance_epsilon),
            retained_earnings_code: config.retained_earnings_code.clone(),
            history_limit: config.history_limit,
            metrics,
        }
    }

    pub fn ledger(&self) -> &LedgerEngine<S> {
        &self.ledger
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    async fn retained_earnings<T: LedgerTx>(&self, tx: &mut T) -> Result<Account> {
        let code = &self.retained_earnings_code;
        match tx.find_account_by_code(code).await? {
            Some(account) if account.account_type == AccountType::Equity && !account.is_header => {
                Ok(account)
            }
            _ => Err(LedgerError::RetainedEarningsNotFound(code.clone())),
        }
    }

    /// Period with this exact range, plus the reason the range cannot be closed:
    /// the period itself is closed or locked, a closed period overlaps it, or a
    /// closed period starts after it. A later closing already swept this range's
    /// activity into retained earnings.
    async fn blocking_period<T: LedgerTx>(
        &self,
        tx: &mut T,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(Option<AccountingPeriod>, Option<LedgerError>)> {
        let existing = tx.find_period_by_range(start, end).await?;
        if let Some(period) = &existing {
            match period.status() {
                PeriodStatus::Locked => {
                    return Ok((existing.clone(), Some(LedgerError::PeriodLocked(period.id))))
                }
                PeriodStatus::Closed => {
                    return Ok((
                        existing.clone(),
                        Some(LedgerError::PeriodAlreadyClosed { start, end }),
                    ))
                }
                PeriodStatus::Open => {}
            }
        }

        let closed: Vec<AccountingPeriod> = tx
            .list_periods()
            .await?
            .into_iter()
            .filter(|p| p.is_closed)
            .collect();

        if let Some(p) = closed.iter().find(|p| p.overlaps(start, end)) {
            let overlap = LedgerError::PeriodOverlap {
                start,
                end,
                existing: p.id,
            };
            return Ok((existing, Some(overlap)));
        }

        // newest first, so the first match is the latest closed period
        let later = closed
            .iter()
            .find(|p| p.start_date > end)
            .map(|p| LedgerError::LaterPeriodClosed {
                start,
                end,
                later_end: p.end_date,
            });
        Ok((existing, later))
    }

    /// Show what closing the range would post, without writing anything.
    #[instrument(skip(self))]
    pub async fn preview(&self, start: NaiveDate, end: NaiveDate) -> Result<ClosingPreview> {
        if start > end {
            return Err(LedgerError::InvalidDateRange { start, end });
        }

        let mut tx = self.store.begin().await?;
        let retained = self.retained_earnings(&mut tx).await?;
        let (existing, blocked) = self.blocking_period(&mut tx, start, end).await?;
        let balances = aggregate(&mut tx, Cutoff::AsOf { date: end }).await?;
        tx.rollback().await?;

        let plan = ClosingPlan::build(&balances, &retained, end, "");
        Ok(ClosingPreview {
            start_date: start,
            end_date: end,
            total_revenue: plan.totals.total_revenue,
            total_expense: plan.totals.total_expense,
            net_income: plan.totals.net_income(),
            retained_earnings_change: plan.retained_earnings_effect(),
            revenue_accounts: plan.revenue_accounts,
            expense_accounts: plan.expense_accounts,
            can_close: blocked.is_none(),
            requires_closing_entry: !plan.is_empty(),
            reason: blocked.map(|e| e.to_string()),
            period_status: existing.map(|p| p.status()),
            retained_earnings: RetainedEarnings::from(&retained),
            lines: plan.lines,
        })
    }

    /// Close the range: post the closing entry, refresh balances, validate.
    #[instrument(skip(self, description))]
    pub async fn execute(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        description: &str,
    ) -> Result<ClosingResult> {
        self.metrics.closing_started();

        match self.close_period(start, end, description).await {
            Ok(result) => {
                self.metrics.closing_succeeded(result.closing_journal_id.is_none());
                info!(
                    period_id = %result.period.id,
                    %start,
                    %end,
                    net_income = %result.net_income,
                    lines = result.lines_posted,
                    "Period closed"
                );
                Ok(result)
            }
            Err(e) => {
                let validation = matches!(e, LedgerError::ValidationFailed { .. });
                self.metrics.closing_failed(validation);
                if validation || e.category() == ErrorCategory::Internal {
                    error!(%start, %end, error = %e, "Period closing rolled back");
                } else {
                    warn!(%start, %end, error = %e, "Period closing rejected");
                }
                Err(e)
            }
        }
    }

    async fn close_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        description: &str,
    ) -> Result<ClosingResult> {
        if start > end {
            return Err(LedgerError::InvalidDateRange { start, end });
        }

        let mut tx = self.store.begin().await?;
        tx.lock_ledger().await?;

        let retained = self.retained_earnings(&mut tx).await?;
        let (existing, blocked) = self.blocking_period(&mut tx, start, end).await?;
        if let Some(e) = blocked {
            return Err(e);
        }

        let description = if description.trim().is_empty() {
            format!("Period closing {start} to {end}")
        } else {
            description.trim().to_string()
        };
        let mut period = match existing {
            Some(period) => period,
            None => AccountingPeriod::new(start, end, description.clone())?,
        };

        // Balances left at the period end, earlier closings included.
        let balances = aggregate(&mut tx, Cutoff::AsOf { date: end }).await?;
        let plan = ClosingPlan::build(&balances, &retained, end, description);
        if !plan.is_balanced() {
            let totals = plan.totals();
            return Err(LedgerError::UnbalancedEntry {
                total_debit: totals.debit,
                total_credit: totals.credit,
            });
        }

        let closing_entry = match plan.to_entry(period.code()) {
            Some(request) => Some(record_entry(&mut tx, request, true).await?),
            None => None,
        };
        let closing_journal_id = closing_entry.as_ref().map(|e| e.id);

        let summary = recompute_balances(&mut tx).await?;

        period.close(plan.totals, closing_journal_id)?;
        tx.save_period(&period).await?;

        if let Err(e) = self.validator.verify(&mut tx, end).await {
            tx.rollback().await?;
            return Err(e);
        }

        tx.commit().await?;

        Ok(ClosingResult {
            closing_journal_id,
            total_revenue: plan.totals.total_revenue,
            total_expense: plan.totals.total_expense,
            net_income: plan.totals.net_income(),
            retained_earnings_change: plan.retained_earnings_effect(),
            revenue_accounts: plan.revenue_accounts,
            expense_accounts: plan.expense_accounts,
            lines_posted: closing_entry.map(|e| e.lines.len()).unwrap_or(0),
            balances_updated: summary.accounts_updated,
            period,
        })
    }

    /// Lock a closed period for good.
    #[instrument(skip(self))]
    pub async fn lock(&self, id: PeriodId) -> Result<AccountingPeriod> {
        let mut tx = self.store.begin().await?;
        tx.lock_ledger().await?;

        let mut period = tx
            .get_period(id)
            .await?
            .ok_or_else(|| LedgerError::PeriodNotFound(id.to_string()))?;
        period.lock()?;
        tx.save_period(&period).await?;
        tx.commit().await?;

        self.metrics.period_locked();
        info!(period_id = %id, end = %period.end_date, "Period locked");
        Ok(period)
    }

    /// Reopen a closed period, voiding its closing entry.
    #[instrument(skip(self))]
    pub async fn reopen(&self, id: PeriodId, reason: &str) -> Result<ReopenResult> {
        let mut tx = self.store.begin().await?;
        tx.lock_ledger().await?;

        let mut period = tx
            .get_period(id)
            .await?
            .ok_or_else(|| LedgerError::PeriodNotFound(id.to_string()))?;

        if period.status() == PeriodStatus::Closed {
            if let Some(later) = tx
                .list_periods()
                .await?
                .into_iter()
                .find(|p| p.id != id && p.is_closed && p.start_date > period.end_date)
            {
                return Err(LedgerError::LaterPeriodClosed {
                    start: period.start_date,
                    end: period.end_date,
                    later_end: later.end_date,
                });
            }
        }

        let closing_id = period.reopen()?;
        tx.save_period(&period).await?;

        let mut voided_journal_id = None;
        if let Some(journal_id) = closing_id {
            match tx.get_entry(journal_id).await? {
                Some(entry) if entry.status == JournalStatus::Posted => {
                    void_entry(&mut tx, journal_id, true).await?;
                    voided_journal_id = Some(journal_id);
                }
                _ => warn!(%journal_id, "Closing entry already void or missing"),
            }
        }

        let summary = recompute_balances(&mut tx).await?;
        tx.commit().await?;

        self.metrics.period_reopened();
        warn!(
            period_id = %id,
            end = %period.end_date,
            reason = %reason,
            "Period reopened"
        );
        Ok(ReopenResult {
            period,
            voided_journal_id,
            balances_updated: summary.accounts_updated,
        })
    }

    pub async fn last_closing_info(&self) -> Result<LastClosingInfo> {
        let mut tx = self.store.begin().await?;
        let last = tx.list_periods().await?.into_iter().find(|p| p.is_closed);
        tx.rollback().await?;

        Ok(match last {
            Some(p) => LastClosingInfo {
                has_previous_closing: true,
                period_id: Some(p.id),
                last_closing_date: Some(p.end_date),
                next_start_date: Some(next_day(p.end_date)),
                last_net_income: Some(p.net_income),
            },
            None => LastClosingInfo {
                has_previous_closing: false,
                period_id: None,
                last_closing_date: None,
                next_start_date: None,
                last_net_income: None,
            },
        })
    }

    /// Closed or locked period containing the date.
    pub async fn period_for_date(&self, date: NaiveDate) -> Result<Option<AccountingPeriod>> {
        let mut tx = self.store.begin().await?;
        let period = tx.closed_period_for_date(date).await?;
        tx.rollback().await?;
        Ok(period)
    }

    pub async fn is_date_in_closed_period(&self, date: NaiveDate) -> Result<bool> {
        Ok(self.period_for_date(date).await?.is_some())
    }

    /// Closed periods and closing entries, newest first.
    ///
    /// Closing entries referenced by a listed period are folded into that period's row.
    pub async fn history(&self, limit: Option<usize>) -> Result<ClosingHistory> {
        let limit = limit.unwrap_or(self.history_limit).clamp(1, MAX_PAGE);

        let mut tx = self.store.begin().await?;
        let periods = tx.list_periods().await?;
        let entries = closing_entries(&mut tx, None).await?;
        tx.rollback().await?;

        let closed: Vec<&AccountingPeriod> = periods.iter().filter(|p| p.is_closed).collect();
        let mut items: Vec<ClosingHistoryItem> = closed
            .iter()
            .map(|p| ClosingHistoryItem::from_period(p, &entries))
            .collect();
        items.extend(
            entries
                .iter()
                .filter(|e| e.status == JournalStatus::Posted)
                .filter(|e| !closed.iter().any(|p| p.closing_journal_id == Some(e.id)))
                .map(ClosingHistoryItem::from_entry),
        );

        items.sort_by(|a, b| b.end_date.cmp(&a.end_date).then(b.closed_at.cmp(&a.closed_at)));
        items.truncate(limit);

        Ok(ClosingHistory {
            count: items.len(),
            items,
        })
    }

    pub async fn list_periods(&self, filter: &PeriodFilter) -> Result<PeriodPage> {
        let limit = filter.limit.unwrap_or(DEFAULT_PERIOD_PAGE).clamp(1, MAX_PAGE);
        let offset = filter.offset.unwrap_or(0);

        let mut tx = self.store.begin().await?;
        let periods = tx.list_periods().await?;
        tx.rollback().await?;

        let matching: Vec<AccountingPeriod> = periods
            .into_iter()
            .filter(|p| filter.status.map_or(true, |s| p.status() == s))
            .collect();
        let total = matching.len();

        Ok(PeriodPage {
            periods: matching.into_iter().skip(offset).take(limit).collect(),
            total,
            limit,
            offset,
        })
    }

    /// Void posted closing entries no closed period references, then rebuild balances.
    #[instrument(skip(self))]
    pub async fn cleanup_orphan_closings(&self) -> Result<CleanupSummary> {
        let mut tx = self.store.begin().await?;
        tx.lock_ledger().await?;

        let entries = closing_entries(&mut tx, Some(JournalStatus::Posted)).await?;
        let periods = tx.list_periods().await?;
        let orphans = orphan_closings(&entries, &periods);

        let mut voided = Vec::with_capacity(orphans.len());
        for orphan in &orphans {
            void_entry(&mut tx, orphan.journal_id, true).await?;
            warn!(
                journal_id = %orphan.journal_id,
                entry_date = %orphan.entry_date,
                amount = %orphan.total_debit,
                "Orphaned closing entry voided"
            );
            voided.push(orphan.journal_id);
        }

        let summary = recompute_balances(&mut tx).await?;
        tx.commit().await?;

        self.metrics.balances_rebuilt(summary.changes.len() as u64);
        info!(voided = voided.len(), "Orphaned closing cleanup finished");
        Ok(CleanupSummary {
            voided,
            balances_updated: summary.accounts_updated,
        })
    }

    /// Post a draft entry.
    pub async fn post_entry(&self, id: JournalId) -> Result<JournalEntry> {
        let entry = self.ledger.post_entry(id).await?;
        self.metrics.entry_posted();
        Ok(entry)
    }

    /// Void a posted entry. Closing entries go through [`Self::reopen`].
    pub async fn void_entry(&self, id: JournalId) -> Result<JournalEntry> {
        let entry = self.ledger.void_entry(id).await?;
        self.metrics.entry_voided();
        Ok(entry)
    }

    pub async fn rebuild_balances(&self) -> Result<RecomputeSummary> {
        let summary = self.ledger.rebuild_balances().await?;
        self.metrics.balances_rebuilt(summary.changes.len() as u64);
        Ok(summary)
    }
}
