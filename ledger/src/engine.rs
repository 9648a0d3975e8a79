//! Core ledger engine implementation.
//!
//! The free functions operate on an open [`LedgerTx`] so callers that already
//! hold a transaction (period closing, reopen) reuse the same code paths.
//! [`LedgerEngine`] wraps each of them in its own transaction.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use closebook_common::{AccountId, DateRange, JournalId, LedgerError, Result, BALANCE_EPSILON};

use crate::account::{Account, NewAccount, DEFAULT_CHART};
use crate::balance::{combine, normal_balance, with_header_rollup, AccountBalance, Cutoff};
use crate::journal::{JournalEntry, JournalFilter, JournalStatus, NewJournalEntry, SourceType};
use crate::report::{
    check_balances, orphan_closings, AccountingEquation, IncomeStatement, ReconciliationReport,
    TrialBalance,
};
use crate::store::{LedgerStore, LedgerTx};

/// Per-account balances under a cutoff.
pub async fn aggregate<T: LedgerTx>(tx: &mut T, cutoff: Cutoff) -> Result<Vec<AccountBalance>> {
    let accounts = tx.list_accounts(true).await?;
    let totals = tx.line_totals(cutoff).await?;
    Ok(combine(&accounts, &totals))
}

/// Every account with the balance its cache should hold.
pub async fn expected_balances<T: LedgerTx>(
    tx: &mut T,
) -> Result<(Vec<Account>, HashMap<AccountId, Decimal>)> {
    let accounts = tx.list_accounts(true).await?;
    let totals = tx.line_totals(Cutoff::AllTime).await?;

    let leaf: HashMap<AccountId, Decimal> = accounts
        .iter()
        .filter(|a| !a.is_header)
        .map(|a| {
            let t = totals.get(&a.id).copied().unwrap_or_default();
            (a.id, normal_balance(a.account_type, t))
        })
        .collect();

    let expected = with_header_rollup(&accounts, &leaf);
    Ok((accounts, expected))
}

/// One account whose cached balance moved during a recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceChange {
    pub account_id: AccountId,
    pub code: String,
    pub before: Decimal,
    pub after: Decimal,
}

/// Outcome of a balance recompute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecomputeSummary {
    /// Accounts written.
    pub accounts_updated: usize,
    /// Accounts whose value differed from the cache.
    pub changes: Vec<BalanceChange>,
}

/// Overwrite every cached balance with its value recomputed from posted lines.
///
/// Absolute, never incremental: running it twice leaves the same values.
pub async fn recompute_balances<T: LedgerTx>(tx: &mut T) -> Result<RecomputeSummary> {
    let (accounts, expected) = expected_balances(tx).await?;

    let mut updates = Vec::with_capacity(accounts.len());
    let mut changes = Vec::new();
    for account in &accounts {
        let after = expected.get(&account.id).copied().unwrap_or_default();
        if account.balance != after {
            changes.push(BalanceChange {
                account_id: account.id,
                code: account.code.clone(),
                before: account.balance,
                after,
            });
        }
        updates.push((account.id, after));
    }

    tx.set_balances(&updates).await?;

    Ok(RecomputeSummary {
        accounts_updated: updates.len(),
        changes,
    })
}

/// Reject dates that fall in a closed period.
pub async fn ensure_date_open<T: LedgerTx>(tx: &mut T, date: NaiveDate) -> Result<()> {
    match tx.closed_period_for_date(date).await? {
        Some(period) => Err(LedgerError::DateInClosedPeriod {
            date,
            period_id: period.id,
        }),
        None => Ok(()),
    }
}

/// Validate and store an entry, optionally posting it straight away.
pub async fn record_entry<T: LedgerTx>(
    tx: &mut T,
    request: NewJournalEntry,
    post: bool,
) -> Result<JournalEntry> {
    for line in &request.lines {
        let account = tx
            .get_account(line.account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(line.account_id.to_string()))?;
        account.ensure_postable()?;
    }
    ensure_date_open(tx, request.entry_date).await?;

    let mut entry = JournalEntry::from_request(request)?;
    if post {
        entry.transition_to(JournalStatus::Posted)?;
    }
    tx.insert_entry(&entry).await?;
    Ok(entry)
}

/// Post a draft entry.
pub async fn post_entry<T: LedgerTx>(tx: &mut T, id: JournalId) -> Result<JournalEntry> {
    let mut entry = tx.get_entry(id).await?.ok_or(LedgerError::JournalNotFound(id))?;
    ensure_date_open(tx, entry.entry_date).await?;
    entry.transition_to(JournalStatus::Posted)?;
    tx.update_entry_status(&entry).await?;
    Ok(entry)
}

/// Void a posted entry.
///
/// Closing entries follow their period's lifecycle instead of the closed-period
/// guard and are only voided with `allow_closing`.
pub async fn void_entry<T: LedgerTx>(
    tx: &mut T,
    id: JournalId,
    allow_closing: bool,
) -> Result<JournalEntry> {
    let mut entry = tx.get_entry(id).await?.ok_or(LedgerError::JournalNotFound(id))?;
    if entry.source_type == SourceType::Closing {
        if !allow_closing {
            return Err(LedgerError::ClosingEntryImmutable(id));
        }
    } else {
        ensure_date_open(tx, entry.entry_date).await?;
    }
    entry.transition_to(JournalStatus::Void)?;
    tx.update_entry_status(&entry).await?;
    Ok(entry)
}

/// Every closing entry, optionally restricted to one status, read page by page.
pub async fn closing_entries<T: LedgerTx>(
    tx: &mut T,
    status: Option<JournalStatus>,
) -> Result<Vec<JournalEntry>> {
    let mut filter = JournalFilter {
        status,
        source_type: Some(SourceType::Closing),
        limit: Some(JournalFilter::MAX_LIMIT),
        offset: Some(0),
        ..Default::default()
    };
    let mut entries = Vec::new();
    loop {
        let page = tx.list_entries(&filter).await?;
        let done = (page.len() as u32) < filter.limit();
        entries.extend(page);
        if done {
            return Ok(entries);
        }
        filter.offset = Some(filter.offset() + filter.limit());
    }
}

/// Reconcile cached balances, the accounting equation and closing references.
pub async fn reconcile<T: LedgerTx>(tx: &mut T, epsilon: Decimal) -> Result<ReconciliationReport> {
    let (accounts, expected) = expected_balances(tx).await?;
    let checks = check_balances(&accounts, &expected, epsilon);

    let balances = aggregate(tx, Cutoff::AllTime).await?;
    let equation = AccountingEquation::evaluate(&balances, epsilon);

    let closings = closing_entries(tx, Some(JournalStatus::Posted)).await?;
    let periods = tx.list_periods().await?;
    let orphans = orphan_closings(&closings, &periods);

    Ok(ReconciliationReport::new(checks, equation, orphans))
}

/// The ledger engine manages accounts and journal entries over a store.
pub struct LedgerEngine<S> {
    store: Arc<S>,
    epsilon: Decimal,
}

impl<S> Clone for LedgerEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            epsilon: self.epsilon,
        }
    }
}

impl<S: LedgerStore> LedgerEngine<S> {
    /// Create a new ledger engine.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            epsilon: BALANCE_EPSILON,
        }
    }

    /// Override the zero tolerance used by reports.
    pub fn with_epsilon(mut self, epsilon: Decimal) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Add an account to the chart.
    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create_account(&self, request: NewAccount) -> Result<Account> {
        request.validate()?;
        let code = request.code.trim().to_string();

        let mut tx = self.store.begin().await?;
        tx.lock_ledger().await?;

        if tx.find_account_by_code(&code).await?.is_some() {
            return Err(LedgerError::DuplicateAccountCode(code));
        }

        let parent_id = match request.parent_code.as_deref() {
            Some(parent_code) => {
                let parent = tx
                    .find_account_by_code(parent_code)
                    .await?
                    .ok_or_else(|| LedgerError::AccountNotFound(parent_code.to_string()))?;
                if !parent.is_header {
                    return Err(LedgerError::invalid_field(
                        format!("parent {parent_code} is not a header account"),
                        "parent_code",
                    ));
                }
                Some(parent.id)
            }
            None => None,
        };

        let account = Account::new(
            code,
            request.name.trim(),
            request.account_type,
            parent_id,
            request.is_header,
        );
        tx.insert_account(&account).await?;
        tx.commit().await?;

        info!(account_id = %account.id, "Account created");
        Ok(account)
    }

    /// Chart of accounts, ordered by code.
    pub async fn list_accounts(&self, include_deleted: bool) -> Result<Vec<Account>> {
        let mut tx = self.store.begin().await?;
        let accounts = tx.list_accounts(include_deleted).await?;
        tx.rollback().await?;
        Ok(accounts)
    }

    /// Soft-delete an account whose ledger balance is zero.
    #[instrument(skip(self))]
    pub async fn delete_account(&self, id: AccountId) -> Result<Account> {
        let mut tx = self.store.begin().await?;
        tx.lock_ledger().await?;

        let mut account = tx
            .get_account(id)
            .await?
            .filter(Account::is_live)
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))?;

        let (accounts, expected) = expected_balances(&mut tx).await?;
        if accounts
            .iter()
            .any(|a| a.is_live() && a.parent_id == Some(account.id))
        {
            return Err(LedgerError::invalid(format!(
                "account {} still has child accounts",
                account.code
            )));
        }
        let balance = expected.get(&account.id).copied().unwrap_or_default();
        if !balance.is_zero() {
            return Err(LedgerError::AccountHasBalance {
                code: account.code.clone(),
                balance,
            });
        }

        account.soft_delete();
        tx.update_account(&account).await?;
        tx.commit().await?;

        info!(account_id = %account.id, code = %account.code, "Account deleted");
        Ok(account)
    }

    /// Insert the default chart of accounts, skipping codes already present.
    /// Returns the number of accounts inserted.
    #[instrument(skip(self))]
    pub async fn seed_default_chart(&self) -> Result<usize> {
        let mut tx = self.store.begin().await?;
        tx.lock_ledger().await?;

        let mut ids: HashMap<&str, AccountId> = HashMap::new();
        let mut inserted = 0;
        for row in DEFAULT_CHART {
            if let Some(existing) = tx.find_account_by_code(row.code).await? {
                ids.insert(row.code, existing.id);
                continue;
            }
            let parent_id = row.parent_code.and_then(|code| ids.get(code).copied());
            let account = Account::new(row.code, row.name, row.account_type, parent_id, row.is_header);
            tx.insert_account(&account).await?;
            ids.insert(row.code, account.id);
            inserted += 1;
        }
        tx.commit().await?;

        info!(inserted, "Default chart of accounts seeded");
        Ok(inserted)
    }

    /// Record a journal entry. Closing entries are produced only by period closing.
    #[instrument(skip(self, request), fields(source = ?request.source_type, date = %request.entry_date))]
    pub async fn create_entry(&self, request: NewJournalEntry, auto_post: bool) -> Result<JournalEntry> {
        if request.source_type == SourceType::Closing {
            return Err(LedgerError::invalid_field(
                "closing entries are generated by period closing",
                "source_type",
            ));
        }

        let mut tx = self.store.begin().await?;
        tx.lock_ledger().await?;
        let entry = record_entry(&mut tx, request, auto_post).await?;
        if auto_post {
            recompute_balances(&mut tx).await?;
        }
        tx.commit().await?;

        info!(
            journal_id = %entry.id,
            status = entry.status.as_str(),
            total = %entry.total_debit,
            "Journal entry recorded"
        );
        Ok(entry)
    }

    /// Post a draft entry and refresh balances.
    #[instrument(skip(self))]
    pub async fn post_entry(&self, id: JournalId) -> Result<JournalEntry> {
        let mut tx = self.store.begin().await?;
        tx.lock_ledger().await?;
        let entry = post_entry(&mut tx, id).await?;
        recompute_balances(&mut tx).await?;
        tx.commit().await?;

        info!(journal_id = %id, "Journal entry posted");
        Ok(entry)
    }

    /// Void a posted entry and refresh balances.
    #[instrument(skip(self))]
    pub async fn void_entry(&self, id: JournalId) -> Result<JournalEntry> {
        let mut tx = self.store.begin().await?;
        tx.lock_ledger().await?;
        let entry = void_entry(&mut tx, id, false).await?;
        recompute_balances(&mut tx).await?;
        tx.commit().await?;

        info!(journal_id = %id, "Journal entry voided");
        Ok(entry)
    }

    pub async fn get_entry(&self, id: JournalId) -> Result<JournalEntry> {
        let mut tx = self.store.begin().await?;
        let entry = tx.get_entry(id).await?;
        tx.rollback().await?;
        entry.ok_or(LedgerError::JournalNotFound(id))
    }

    pub async fn list_entries(&self, filter: &JournalFilter) -> Result<Vec<JournalEntry>> {
        let mut tx = self.store.begin().await?;
        let entries = tx.list_entries(filter).await?;
        tx.rollback().await?;
        Ok(entries)
    }

    /// Ledger balances per account under a cutoff.
    pub async fn balances(&self, cutoff: Cutoff) -> Result<Vec<AccountBalance>> {
        let mut tx = self.store.begin().await?;
        let balances = aggregate(&mut tx, cutoff).await?;
        tx.rollback().await?;
        Ok(balances)
    }

    /// Recompute every cached balance from the journal.
    #[instrument(skip(self))]
    pub async fn rebuild_balances(&self) -> Result<RecomputeSummary> {
        let mut tx = self.store.begin().await?;
        tx.lock_ledger().await?;
        let summary = recompute_balances(&mut tx).await?;
        tx.commit().await?;

        for change in &summary.changes {
            warn!(
                code = %change.code,
                before = %change.before,
                after = %change.after,
                "Balance corrected"
            );
        }
        info!(
            accounts = summary.accounts_updated,
            corrected = summary.changes.len(),
            "Balances rebuilt"
        );
        Ok(summary)
    }

    /// Compare cached balances with the ledger.
    pub async fn verify(&self) -> Result<ReconciliationReport> {
        let mut tx = self.store.begin().await?;
        let report = reconcile(&mut tx, self.epsilon).await?;
        tx.rollback().await?;

        if !report.is_healthy {
            warn!(
                inconsistent = report.inconsistent_count,
                equation_balanced = report.equation.is_balanced,
                orphan_closings = report.orphan_closings.len(),
                "Ledger reconciliation found problems"
            );
        }
        Ok(report)
    }

    /// Revenue and expense activity inside a date range, closing entries excluded.
    pub async fn income_statement(&self, range: DateRange) -> Result<IncomeStatement> {
        let balances = self.balances(Cutoff::range(range)).await?;
        Ok(IncomeStatement::build(range, &balances))
    }

    /// Trial balance as of a date, closing entries included.
    pub async fn trial_balance(&self, as_of: NaiveDate) -> Result<TrialBalance> {
        let balances = self.balances(Cutoff::AsOf { date: as_of }).await?;
        Ok(TrialBalance::build(as_of, &balances))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::RETAINED_EARNINGS_CODE;
    use crate::journal::NewJournalLine;
    use crate::store::MemoryStore;
    use closebook_common::{AccountingPeriod, ClosingTotals};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    async fn seeded() -> (LedgerEngine<MemoryStore>, HashMap<String, Account>) {
        let engine = LedgerEngine::new(Arc::new(MemoryStore::new()));
        engine.seed_default_chart().await.unwrap();
        let accounts = engine
            .list_accounts(false)
            .await
            .unwrap()
            .into_iter()
            .map(|a| (a.code.clone(), a))
            .collect();
        (engine, accounts)
    }

    fn entry(on: NaiveDate, debit: &Account, credit: &Account, amount: Decimal) -> NewJournalEntry {
        NewJournalEntry {
            source_type: SourceType::Manual,
            reference: None,
            description: "test".to_string(),
            entry_date: on,
            lines: vec![
                NewJournalLine::debit(debit.id, amount, ""),
                NewJournalLine::credit(credit.id, amount, ""),
            ],
        }
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let (engine, accounts) = seeded().await;
        assert!(accounts.contains_key(RETAINED_EARNINGS_CODE));
        assert_eq!(tokio_test::assert_ok!(engine.seed_default_chart().await), 0);

        let cash = &accounts["1101"];
        assert_eq!(cash.parent_id, Some(accounts["1100"].id));
    }

    #[tokio::test]
    async fn test_posting_updates_balances_and_headers() {
        let (engine, accounts) = seeded().await;
        let cash = &accounts["1101"];
        let sales = &accounts["4101"];

        let posted = engine
            .create_entry(entry(date(1, 5), cash, sales, dec!(750)), true)
            .await
            .unwrap();
        assert_eq!(posted.status, JournalStatus::Posted);

        let refreshed: HashMap<String, Account> = engine
            .list_accounts(false)
            .await
            .unwrap()
            .into_iter()
            .map(|a| (a.code.clone(), a))
            .collect();
        assert_eq!(refreshed["1101"].balance, dec!(750));
        assert_eq!(refreshed["1100"].balance, dec!(750));
        assert_eq!(refreshed["1000"].balance, dec!(750));
        assert_eq!(refreshed["4101"].balance, dec!(750));
        assert_eq!(refreshed["4000"].balance, dec!(750));

        let report = engine.verify().await.unwrap();
        assert!(report.is_healthy);
    }

    #[tokio::test]
    async fn test_draft_does_not_move_balances_until_posted() {
        let (engine, accounts) = seeded().await;
        let draft = engine
            .create_entry(entry(date(1, 5), &accounts["1101"], &accounts["4101"], dec!(10)), false)
            .await
            .unwrap();

        let balances = engine.balances(Cutoff::AllTime).await.unwrap();
        assert!(balances.iter().all(|b| b.balance.is_zero()));

        engine.post_entry(draft.id).await.unwrap();
        let err = engine.post_entry(draft.id).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_JOURNAL_STATUS");

        engine.void_entry(draft.id).await.unwrap();
        let report = engine.verify().await.unwrap();
        assert!(report.accounts.iter().all(|c| c.ledger_balance.is_zero()));
        assert!(report.is_healthy);
    }

    #[tokio::test]
    async fn test_rejects_header_and_closing_entries() {
        let (engine, accounts) = seeded().await;

        let err = engine
            .create_entry(entry(date(1, 5), &accounts["1100"], &accounts["4101"], dec!(10)), true)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "ACCOUNT_NOT_POSTABLE");

        let mut closing = entry(date(1, 31), &accounts["4101"], &accounts["3201"], dec!(10));
        closing.source_type = SourceType::Closing;
        let err = engine.create_entry(closing, true).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_closed_period_rejects_postings() {
        let (engine, accounts) = seeded().await;

        let mut period = AccountingPeriod::new(date(1, 1), date(1, 31), "January").unwrap();
        period.close(ClosingTotals::default(), None).unwrap();
        let mut tx = engine.store().begin().await.unwrap();
        tx.save_period(&period).await.unwrap();
        tx.commit().await.unwrap();

        let err = engine
            .create_entry(entry(date(1, 20), &accounts["1101"], &accounts["4101"], dec!(10)), true)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "DATE_IN_CLOSED_PERIOD");

        assert!(engine
            .create_entry(entry(date(2, 1), &accounts["1101"], &accounts["4101"], dec!(10)), true)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_delete_account_requires_zero_balance() {
        let (engine, accounts) = seeded().await;
        let other = &accounts["4201"];

        engine
            .create_entry(entry(date(1, 5), &accounts["1101"], other, dec!(10)), true)
            .await
            .unwrap();
        let err = engine.delete_account(other.id).await.unwrap_err();
        assert_eq!(err.error_code(), "ACCOUNT_HAS_BALANCE");

        let deleted = engine.delete_account(accounts["5204"].id).await.unwrap();
        assert!(!deleted.is_live());
        assert!(engine.delete_account(accounts["5000"].id).await.is_err());
    }

    #[tokio::test]
    async fn test_rebuild_repairs_drift() {
        let (engine, accounts) = seeded().await;
        engine
            .create_entry(entry(date(1, 5), &accounts["1101"], &accounts["3101"], dec!(1000)), true)
            .await
            .unwrap();

        let mut tx = engine.store().begin().await.unwrap();
        tx.set_balances(&[(accounts["1101"].id, dec!(999))]).await.unwrap();
        tx.commit().await.unwrap();

        let report = engine.verify().await.unwrap();
        assert_eq!(report.inconsistent_count, 1);

        let summary = engine.rebuild_balances().await.unwrap();
        assert_eq!(summary.changes.len(), 1);
        assert_eq!(summary.changes[0].after, dec!(1000));

        let again = engine.rebuild_balances().await.unwrap();
        assert!(again.changes.is_empty());
        assert!(engine.verify().await.unwrap().is_healthy);
    }

    #[tokio::test]
    async fn test_trial_balance() {
        let (engine, accounts) = seeded().await;
        engine
            .create_entry(entry(date(1, 5), &accounts["1101"], &accounts["4101"], dec!(300)), true)
            .await
            .unwrap();
        engine
            .create_entry(entry(date(2, 5), &accounts["5101"], &accounts["1101"], dec!(100)), true)
            .await
            .unwrap();

        let tb = engine.trial_balance(date(1, 31)).await.unwrap();
        assert_eq!(tb.total_debit, dec!(300));
        assert!(tb.is_balanced);

        let tb = engine.trial_balance(date(2, 28)).await.unwrap();
        assert_eq!(tb.rows.len(), 3);
        assert!(tb.is_balanced);
    }

    #[tokio::test]
    async fn test_income_statement_ignores_closing_entries() {
        let (engine, accounts) = seeded().await;
        let sales = &accounts["4101"];
        engine
            .create_entry(entry(date(3, 2), &accounts["1101"], sales, dec!(500)), true)
            .await
            .unwrap();
        engine
            .create_entry(entry(date(3, 9), &accounts["5201"], &accounts["1101"], dec!(200)), true)
            .await
            .unwrap();

        let mut tx = engine.store().begin().await.unwrap();
        let mut closing = entry(date(3, 31), sales, &accounts[RETAINED_EARNINGS_CODE], dec!(500));
        closing.source_type = SourceType::Closing;
        record_entry(&mut tx, closing, true).await.unwrap();
        recompute_balances(&mut tx).await.unwrap();
        tx.commit().await.unwrap();

        let march = DateRange::month(2025, 3).unwrap();
        let statement = engine.income_statement(march).await.unwrap();
        assert_eq!(statement.total_revenue, dec!(500));
        assert_eq!(statement.total_expense, dec!(200));
        assert_eq!(statement.net_income, dec!(300));

        let balance_of = |rows: &[AccountBalance], code: &str| {
            rows.iter().find(|b| b.code == code).map(|b| b.balance).unwrap()
        };
        let all_time = engine.balances(Cutoff::AllTime).await.unwrap();
        let excluding = engine.balances(Cutoff::ExcludingClosing).await.unwrap();
        assert_eq!(balance_of(&all_time, "4101"), Decimal::ZERO);
        assert_eq!(balance_of(&excluding, "4101"), dec!(500));
        assert_eq!(balance_of(&excluding, RETAINED_EARNINGS_CODE), Decimal::ZERO);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_recompute_is_idempotent(amounts in prop::collection::vec(1u32..100_000, 1..12)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let (engine, accounts) = seeded().await;
                for (i, cents) in amounts.iter().enumerate() {
                    let amount = Decimal::new(i64::from(*cents), 2);
                    let (debit, credit) = if i % 2 == 0 { ("1101", "4101") } else { ("5201", "1102") };
                    engine
                        .create_entry(entry(date(1, 10), &accounts[debit], &accounts[credit], amount), true)
                        .await
                        .unwrap();
                }

                let first: Vec<(String, Decimal)> = engine.list_accounts(true).await.unwrap()
                    .into_iter().map(|a| (a.code, a.balance)).collect();
                let summary = engine.rebuild_balances().await.unwrap();
                let second: Vec<(String, Decimal)> = engine.list_accounts(true).await.unwrap()
                    .into_iter().map(|a| (a.code, a.balance)).collect();

                assert!(summary.changes.is_empty());
                assert_eq!(first, second);
            });
        }
    }
}
