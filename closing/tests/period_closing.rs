//! End-to-end period closing scenarios against the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio_test::{assert_err, assert_ok};

use closebook_closing::service::PeriodFilter;
use closebook_closing::{ClosingConfig, Metrics, PeriodClosingService};
use closebook_common::{
    AccountId, AccountingPeriod, DebitCredit, JournalId, PeriodId, PeriodStatus, Result,
};
use closebook_ledger::engine::record_entry;
use closebook_ledger::store::memory::MemoryTx;
use closebook_ledger::{
    Account, Cutoff, JournalEntry, JournalFilter, JournalStatus, LedgerEngine, LedgerStore,
    LedgerTx, MemoryStore, NewJournalEntry, NewJournalLine, SourceType,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

struct Fixture {
    store: Arc<MemoryStore>,
    service: PeriodClosingService<MemoryStore>,
    accounts: HashMap<String, Account>,
}

impl Fixture {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let service = PeriodClosingService::new(
            store.clone(),
            &ClosingConfig::default(),
            Arc::new(Metrics::new()),
        );
        service.ledger().seed_default_chart().await.unwrap();
        let accounts = service
            .ledger()
            .list_accounts(false)
            .await
            .unwrap()
            .into_iter()
            .map(|a| (a.code.clone(), a))
            .collect();
        Self {
            store,
            service,
            accounts,
        }
    }

    fn id(&self, code: &str) -> AccountId {
        self.accounts[code].id
    }

    async fn post(&self, on: NaiveDate, debit: &str, credit: &str, amount: Decimal) -> JournalEntry {
        let request = NewJournalEntry {
            source_type: SourceType::Manual,
            reference: None,
            description: format!("{debit}/{credit}"),
            entry_date: on,
            lines: vec![
                NewJournalLine::debit(self.id(debit), amount, ""),
                NewJournalLine::credit(self.id(credit), amount, ""),
            ],
        };
        self.service.ledger().create_entry(request, true).await.unwrap()
    }

    async fn balance(&self, code: &str) -> Decimal {
        self.service
            .ledger()
            .list_accounts(true)
            .await
            .unwrap()
            .into_iter()
            .find(|a| a.code == code)
            .map(|a| a.balance)
            .unwrap()
    }

    async fn balances(&self) -> Vec<(String, Decimal)> {
        self.service
            .ledger()
            .list_accounts(true)
            .await
            .unwrap()
            .into_iter()
            .map(|a| (a.code, a.balance))
            .collect()
    }

    /// Sales of 21,000,000 against a cost of 10,500,000 during 2025.
    async fn sales_year(&self) {
        self.post(d(2025, 3, 10), "1101", "4101", dec!(21000000)).await;
        self.post(d(2025, 3, 10), "5101", "1301", dec!(10500000)).await;
    }
}

#[tokio::test]
async fn test_year_end_closing_moves_net_income_to_retained_earnings() {
    let fx = Fixture::new().await;
    fx.sales_year().await;

    let result = fx
        .service
        .execute(d(2025, 1, 1), d(2025, 12, 31), "FY2025 closing")
        .await
        .unwrap();

    assert_eq!(result.total_revenue, dec!(21000000));
    assert_eq!(result.total_expense, dec!(10500000));
    assert_eq!(result.net_income, dec!(10500000));
    assert_eq!(result.lines_posted, 4);
    assert_eq!(result.period.status(), PeriodStatus::Closed);
    assert_eq!(result.period.code(), "PC-2025-12-31");

    assert_eq!(fx.balance("4101").await, Decimal::ZERO);
    assert_eq!(fx.balance("5101").await, Decimal::ZERO);
    assert_eq!(fx.balance("4000").await, Decimal::ZERO);
    assert_eq!(fx.balance("5000").await, Decimal::ZERO);
    assert_eq!(fx.balance("3201").await, dec!(10500000));
    assert_eq!(fx.balance("3000").await, dec!(10500000));
    assert_eq!(fx.balance("1101").await, dec!(21000000));

    let journal_id = result.closing_journal_id.unwrap();
    let entry = fx.service.ledger().get_entry(journal_id).await.unwrap();
    assert_eq!(entry.source_type, SourceType::Closing);
    assert_eq!(entry.status, JournalStatus::Posted);
    assert_eq!(entry.entry_date, d(2025, 12, 31));
    assert_eq!(entry.total_debit, entry.total_credit);
    assert_eq!(entry.total_debit, dec!(31500000));
    assert_eq!(entry.reference.as_deref(), Some("PC-2025-12-31"));

    let report = fx.service.ledger().verify().await.unwrap();
    assert!(report.is_healthy);

    let snapshot = fx.service.metrics().snapshot();
    assert_eq!(snapshot.closings_success, 1);
    assert_eq!(snapshot.closings_noop, 0);
}

#[tokio::test]
async fn test_closing_twice_is_rejected_and_rebuild_changes_nothing() {
    let fx = Fixture::new().await;
    fx.sales_year().await;
    fx.service.execute(d(2025, 1, 1), d(2025, 12, 31), "").await.unwrap();

    let before = fx.balances().await;
    let err = fx
        .service
        .execute(d(2025, 1, 1), d(2025, 12, 31), "")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "PERIOD_ALREADY_CLOSED");

    let summary = fx.service.rebuild_balances().await.unwrap();
    assert!(summary.changes.is_empty());
    assert_eq!(fx.balances().await, before);
    assert_eq!(fx.service.metrics().snapshot().closings_failed, 1);
}

#[tokio::test]
async fn test_empty_period_closes_without_entry() {
    let fx = Fixture::new().await;
    fx.post(d(2025, 1, 2), "1101", "3101", dec!(5000)).await;

    let result = fx.service.execute(d(2025, 1, 1), d(2025, 1, 31), "").await.unwrap();
    assert!(result.closing_journal_id.is_none());
    assert_eq!(result.lines_posted, 0);
    assert_eq!(result.net_income, Decimal::ZERO);
    assert!(result.period.is_closed);

    let closings = fx
        .service
        .ledger()
        .list_entries(&JournalFilter {
            source_type: Some(SourceType::Closing),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(closings.is_empty());
    assert_eq!(fx.service.metrics().snapshot().closings_noop, 1);
}

#[tokio::test]
async fn test_consecutive_periods_conserve_retained_earnings() {
    let fx = Fixture::new().await;
    fx.post(d(2025, 1, 5), "1101", "4101", dec!(1000)).await;
    fx.post(d(2025, 1, 6), "5201", "1101", dec!(400)).await;
    fx.service.execute(d(2025, 1, 1), d(2025, 1, 31), "January").await.unwrap();
    assert_eq!(fx.balance("3201").await, dec!(600));

    fx.post(d(2025, 2, 3), "1102", "4201", dec!(250.50)).await;
    fx.post(d(2025, 2, 4), "5203", "1102", dec!(1000)).await;
    let feb = fx.service.execute(d(2025, 2, 1), d(2025, 2, 28), "February").await.unwrap();

    assert_eq!(feb.total_revenue, dec!(250.50));
    assert_eq!(feb.total_expense, dec!(1000));
    assert_eq!(feb.net_income, dec!(-749.50));
    assert_eq!(fx.balance("3201").await, dec!(600) + dec!(-749.50));

    let as_of = fx
        .service
        .ledger()
        .balances(Cutoff::AsOf { date: d(2025, 2, 28) })
        .await
        .unwrap();
    assert!(as_of
        .iter()
        .filter(|b| matches!(b.code.chars().next(), Some('4') | Some('5')))
        .all(|b| b.balance.is_zero()));

    let history = fx.service.history(None).await.unwrap();
    assert_eq!(history.count, 2);
    assert_eq!(history.items[0].code, "PC-2025-02-28");
    assert_eq!(history.items[1].code, "PC-2025-01-31");

    let info = fx.service.last_closing_info().await.unwrap();
    assert!(info.has_previous_closing);
    assert_eq!(info.next_start_date, Some(d(2025, 3, 1)));
    assert_eq!(info.last_net_income, Some(dec!(-749.50)));
}

#[tokio::test]
async fn test_closing_before_a_closed_period_is_rejected() {
    let fx = Fixture::new().await;
    fx.post(d(2025, 1, 10), "1101", "4101", dec!(100)).await;
    fx.post(d(2025, 2, 10), "1101", "4101", dec!(40)).await;

    let feb = fx.service.execute(d(2025, 2, 1), d(2025, 2, 28), "").await.unwrap();
    assert_eq!(feb.total_revenue, dec!(140));
    assert_eq!(feb.retained_earnings_change, dec!(140));

    let preview = fx.service.preview(d(2025, 1, 1), d(2025, 1, 31)).await.unwrap();
    assert!(!preview.can_close);
    assert!(preview.reason.is_some());

    let err = assert_err!(fx.service.execute(d(2025, 1, 1), d(2025, 1, 31), "").await);
    assert_eq!(err.error_code(), "LATER_PERIOD_CLOSED");

    assert_eq!(fx.balance("4101").await, Decimal::ZERO);
    assert_eq!(fx.balance("3201").await, dec!(140));
    assert!(!fx.service.is_date_in_closed_period(d(2025, 1, 15)).await.unwrap());
    assert_eq!(fx.service.history(None).await.unwrap().count, 1);
    assert!(fx.service.ledger().verify().await.unwrap().is_healthy);
}

#[tokio::test]
async fn test_temporary_accounts_are_zero_once_every_period_is_closed() {
    let fx = Fixture::new().await;
    let months = [(1, 31), (2, 28), (3, 31)];
    let mut earned = Decimal::ZERO;
    for (i, (month, _)) in months.iter().enumerate() {
        let scale = Decimal::from(i as u32 + 1);
        fx.post(d(2025, *month, 3), "1101", "4101", dec!(1000) * scale).await;
        fx.post(d(2025, *month, 9), "1102", "4900", dec!(35.25)).await;
        fx.post(d(2025, *month, 15), "5101", "1301", dec!(420) * scale).await;
        fx.post(d(2025, *month, 20), "5202", "1101", dec!(88.10)).await;
        earned += dec!(1000) * scale + dec!(35.25) - dec!(420) * scale - dec!(88.10);
    }

    let mut closed_total = Decimal::ZERO;
    for (month, last) in months {
        let result = fx
            .service
            .execute(d(2025, month, 1), d(2025, month, last), "")
            .await
            .unwrap();
        assert_eq!(result.retained_earnings_change, result.net_income);
        closed_total += result.net_income;
    }

    let accounts = fx.service.ledger().list_accounts(false).await.unwrap();
    for account in accounts.iter().filter(|a| a.account_type.is_temporary()) {
        assert_eq!(account.balance, Decimal::ZERO, "{} left open", account.code);
    }
    assert_eq!(closed_total, earned);
    assert_eq!(fx.balance("3201").await, earned);
    assert!(fx.service.ledger().verify().await.unwrap().is_healthy);
}

#[tokio::test]
async fn test_overlapping_and_inverted_ranges_are_rejected() {
    let fx = Fixture::new().await;
    fx.service.execute(d(2025, 1, 1), d(2025, 1, 31), "").await.unwrap();

    let err = fx
        .service
        .execute(d(2025, 1, 15), d(2025, 3, 31), "")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "PERIOD_OVERLAP");

    let err = fx
        .service
        .execute(d(2025, 3, 31), d(2025, 3, 1), "")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_DATE_RANGE");
}

#[tokio::test]
async fn test_preview_is_read_only() {
    let fx = Fixture::new().await;
    fx.sales_year().await;

    let preview = fx.service.preview(d(2025, 1, 1), d(2025, 12, 31)).await.unwrap();
    assert!(preview.can_close);
    assert!(preview.requires_closing_entry);
    assert_eq!(preview.revenue_accounts, 1);
    assert_eq!(preview.expense_accounts, 1);
    assert_eq!(preview.net_income, dec!(10500000));
    assert_eq!(preview.lines.len(), 4);
    assert_eq!(preview.retained_earnings.code, "3201");
    assert!(preview.period_status.is_none());

    let page = fx.service.list_periods(&PeriodFilter::default()).await.unwrap();
    assert_eq!(page.total, 0);
    assert_eq!(fx.balance("4101").await, dec!(21000000));

    fx.service.execute(d(2025, 1, 1), d(2025, 12, 31), "").await.unwrap();
    let after = fx.service.preview(d(2025, 1, 1), d(2025, 12, 31)).await.unwrap();
    assert!(!after.can_close);
    assert!(after.reason.is_some());
    assert!(!after.requires_closing_entry);
    assert_eq!(after.period_status, Some(PeriodStatus::Closed));
}

#[tokio::test]
async fn test_missing_retained_earnings_account() {
    let store = Arc::new(MemoryStore::new());
    let config = ClosingConfig {
        retained_earnings_code: "9999".to_string(),
        ..ClosingConfig::default()
    };
    let service = PeriodClosingService::new(store, &config, Arc::new(Metrics::new()));
    service.ledger().seed_default_chart().await.unwrap();

    let err = service.execute(d(2025, 1, 1), d(2025, 1, 31), "").await.unwrap_err();
    assert_eq!(err.error_code(), "RETAINED_EARNINGS_NOT_FOUND");
    let err = service.preview(d(2025, 1, 1), d(2025, 1, 31)).await.unwrap_err();
    assert_eq!(err.error_code(), "RETAINED_EARNINGS_NOT_FOUND");
}

#[tokio::test]
async fn test_closed_period_rejects_postings_and_voids() {
    let fx = Fixture::new().await;
    let sale = fx.post(d(2025, 1, 10), "1101", "4101", dec!(300)).await;
    let closing = fx.service.execute(d(2025, 1, 1), d(2025, 1, 31), "").await.unwrap();

    let late = NewJournalEntry {
        source_type: SourceType::Adjustment,
        reference: None,
        description: "late".into(),
        entry_date: d(2025, 1, 20),
        lines: vec![
            NewJournalLine::debit(fx.id("5201"), dec!(10), ""),
            NewJournalLine::credit(fx.id("1101"), dec!(10), ""),
        ],
    };
    let err = fx.service.ledger().create_entry(late, true).await.unwrap_err();
    assert_eq!(err.error_code(), "DATE_IN_CLOSED_PERIOD");

    let err = fx.service.void_entry(sale.id).await.unwrap_err();
    assert_eq!(err.error_code(), "DATE_IN_CLOSED_PERIOD");

    let err = fx
        .service
        .void_entry(closing.closing_journal_id.unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CLOSING_ENTRY_IMMUTABLE");

    assert!(fx.service.is_date_in_closed_period(d(2025, 1, 31)).await.unwrap());
    assert!(!fx.service.is_date_in_closed_period(d(2025, 2, 1)).await.unwrap());
    fx.post(d(2025, 2, 1), "1101", "4101", dec!(5)).await;
}

#[tokio::test]
async fn test_reopen_restores_balances_and_allows_reclose() {
    let fx = Fixture::new().await;
    fx.sales_year().await;
    let before = fx.balances().await;

    let closed = fx.service.execute(d(2025, 1, 1), d(2025, 12, 31), "").await.unwrap();
    let first_journal = closed.closing_journal_id.unwrap();

    let reopened = fx
        .service
        .reopen(closed.period.id, "late supplier invoice")
        .await
        .unwrap();
    assert_eq!(reopened.voided_journal_id, Some(first_journal));
    assert_eq!(reopened.period.status(), PeriodStatus::Open);
    assert!(reopened.period.closing_journal_id.is_none());
    assert_eq!(fx.balances().await, before);

    let voided = fx.service.ledger().get_entry(first_journal).await.unwrap();
    assert_eq!(voided.status, JournalStatus::Void);

    fx.post(d(2025, 12, 30), "5201", "2101", dec!(500000)).await;
    let again = fx.service.execute(d(2025, 1, 1), d(2025, 12, 31), "").await.unwrap();
    assert_eq!(again.period.id, closed.period.id);
    assert_eq!(again.net_income, dec!(10000000));
    assert_ne!(again.closing_journal_id, Some(first_journal));
    assert_eq!(fx.balance("3201").await, dec!(10000000));
    assert!(fx.service.ledger().verify().await.unwrap().is_healthy);
}

#[tokio::test]
async fn test_lock_and_reopen_rules() {
    let fx = Fixture::new().await;
    let jan = fx.service.execute(d(2025, 1, 1), d(2025, 1, 31), "").await.unwrap();
    let feb = fx.service.execute(d(2025, 2, 1), d(2025, 2, 28), "").await.unwrap();

    let err = assert_err!(fx.service.reopen(jan.period.id, "fix").await);
    assert_eq!(err.error_code(), "LATER_PERIOD_CLOSED");

    let locked = assert_ok!(fx.service.lock(feb.period.id).await);
    assert_eq!(locked.status(), PeriodStatus::Locked);
    assert!(locked.locked_at.is_some());

    let err = assert_err!(fx.service.reopen(feb.period.id, "fix").await);
    assert_eq!(err.error_code(), "PERIOD_LOCKED");
    let err = assert_err!(fx.service.lock(feb.period.id).await);
    assert_eq!(err.error_code(), "INVALID_TRANSITION");
    let err = assert_err!(fx.service.lock(PeriodId::new()).await);
    assert_eq!(err.error_code(), "PERIOD_NOT_FOUND");

    let page = fx
        .service
        .list_periods(&PeriodFilter {
            status: Some(PeriodStatus::Locked),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.periods[0].id, feb.period.id);
    assert_eq!(page.limit, 12);
}

#[tokio::test]
async fn test_orphaned_closing_entries_are_cleaned_up() {
    let fx = Fixture::new().await;
    fx.post(d(2025, 1, 10), "1101", "4101", dec!(800)).await;

    // A closing entry no period points at.
    let mut tx = fx.store.begin().await.unwrap();
    let orphan = record_entry(
        &mut tx,
        NewJournalEntry {
            source_type: SourceType::Closing,
            reference: None,
            description: "stray closing".into(),
            entry_date: d(2025, 1, 31),
            lines: vec![
                NewJournalLine::debit(fx.id("4101"), dec!(800), ""),
                NewJournalLine::credit(fx.id("3201"), dec!(800), ""),
            ],
        },
        true,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let report = fx.service.ledger().verify().await.unwrap();
    assert_eq!(report.orphan_closings.len(), 1);
    assert!(!report.is_healthy);

    let history = fx.service.history(Some(10)).await.unwrap();
    assert_eq!(history.items[0].code, format!("CLO-{}", orphan.id));

    let summary = fx.service.cleanup_orphan_closings().await.unwrap();
    assert_eq!(summary.voided, vec![orphan.id]);
    assert_eq!(fx.balance("4101").await, dec!(800));
    assert_eq!(fx.balance("3201").await, Decimal::ZERO);
    assert!(fx.service.ledger().verify().await.unwrap().is_healthy);
}

#[tokio::test]
async fn test_cleanup_reaches_every_orphaned_closing_entry() {
    let fx = Fixture::new().await;
    let stray = JournalFilter::MAX_LIMIT as usize + 1;

    let mut tx = fx.store.begin().await.unwrap();
    for i in 0..stray {
        record_entry(
            &mut tx,
            NewJournalEntry {
                source_type: SourceType::Closing,
                reference: Some(format!("stray-{i}")),
                description: "stray closing".into(),
                entry_date: d(2025, 6, 30),
                lines: vec![
                    NewJournalLine::debit(fx.id("4101"), dec!(1), ""),
                    NewJournalLine::credit(fx.id("3201"), dec!(1), ""),
                ],
            },
            true,
        )
        .await
        .unwrap();
    }
    tx.commit().await.unwrap();

    let report = fx.service.ledger().verify().await.unwrap();
    assert_eq!(report.orphan_closings.len(), stray);

    let summary = fx.service.cleanup_orphan_closings().await.unwrap();
    assert_eq!(summary.voided.len(), stray);

    let report = fx.service.ledger().verify().await.unwrap();
    assert!(report.orphan_closings.is_empty());
    assert!(report.is_healthy);
    assert_eq!(fx.balance("3201").await, Decimal::ZERO);
}

/// Store whose transactions silently drop balance writes.
struct FrozenBalances {
    inner: MemoryStore,
}

struct FrozenTx(MemoryTx);

#[async_trait]
impl LedgerStore for FrozenBalances {
    type Tx = FrozenTx;

    async fn begin(&self) -> Result<FrozenTx> {
        Ok(FrozenTx(self.inner.begin().await?))
    }
}

#[async_trait]
impl LedgerTx for FrozenTx {
    async fn lock_ledger(&mut self) -> Result<()> {
        self.0.lock_ledger().await
    }
    async fn insert_account(&mut self, account: &Account) -> Result<()> {
        self.0.insert_account(account).await
    }
    async fn update_account(&mut self, account: &Account) -> Result<()> {
        self.0.update_account(account).await
    }
    async fn get_account(&mut self, id: AccountId) -> Result<Option<Account>> {
        self.0.get_account(id).await
    }
    async fn find_account_by_code(&mut self, code: &str) -> Result<Option<Account>> {
        self.0.find_account_by_code(code).await
    }
    async fn list_accounts(&mut self, include_deleted: bool) -> Result<Vec<Account>> {
        self.0.list_accounts(include_deleted).await
    }
    async fn set_balances(&mut self, _balances: &[(AccountId, Decimal)]) -> Result<()> {
        Ok(())
    }
    async fn line_totals(&mut self, cutoff: Cutoff) -> Result<HashMap<AccountId, DebitCredit>> {
        self.0.line_totals(cutoff).await
    }
    async fn insert_entry(&mut self, entry: &JournalEntry) -> Result<()> {
        self.0.insert_entry(entry).await
    }
    async fn update_entry_status(&mut self, entry: &JournalEntry) -> Result<()> {
        self.0.update_entry_status(entry).await
    }
    async fn get_entry(&mut self, id: JournalId) -> Result<Option<JournalEntry>> {
        self.0.get_entry(id).await
    }
    async fn list_entries(&mut self, filter: &JournalFilter) -> Result<Vec<JournalEntry>> {
        self.0.list_entries(filter).await
    }
    async fn save_period(&mut self, period: &AccountingPeriod) -> Result<()> {
        self.0.save_period(period).await
    }
    async fn get_period(&mut self, id: PeriodId) -> Result<Option<AccountingPeriod>> {
        self.0.get_period(id).await
    }
    async fn find_period_by_range(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<AccountingPeriod>> {
        self.0.find_period_by_range(start, end).await
    }
    async fn closed_period_for_date(&mut self, date: NaiveDate) -> Result<Option<AccountingPeriod>> {
        self.0.closed_period_for_date(date).await
    }
    async fn list_periods(&mut self) -> Result<Vec<AccountingPeriod>> {
        self.0.list_periods().await
    }
    async fn commit(self) -> Result<()> {
        self.0.commit().await
    }
    async fn rollback(self) -> Result<()> {
        self.0.rollback().await
    }
}

#[tokio::test]
async fn test_validation_failure_rolls_everything_back() {
    let inner = MemoryStore::new();
    let ledger = LedgerEngine::new(Arc::new(inner.clone()));
    ledger.seed_default_chart().await.unwrap();
    let accounts: HashMap<String, Account> = ledger
        .list_accounts(false)
        .await
        .unwrap()
        .into_iter()
        .map(|a| (a.code.clone(), a))
        .collect();
    ledger
        .create_entry(
            NewJournalEntry {
                source_type: SourceType::Sale,
                reference: Some("INV-1".into()),
                description: "sale".into(),
                entry_date: d(2025, 6, 1),
                lines: vec![
                    NewJournalLine::debit(accounts["1201"].id, dec!(1200), ""),
                    NewJournalLine::credit(accounts["4101"].id, dec!(1200), ""),
                ],
            },
            true,
        )
        .await
        .unwrap();
    let before: Vec<(String, Decimal)> = ledger
        .list_accounts(true)
        .await
        .unwrap()
        .into_iter()
        .map(|a| (a.code, a.balance))
        .collect();

    let metrics = Arc::new(Metrics::new());
    let frozen = Arc::new(FrozenBalances {
        inner: inner.clone(),
    });
    let service = PeriodClosingService::new(frozen, &ClosingConfig::default(), metrics.clone());

    let err = service
        .execute(d(2025, 1, 1), d(2025, 12, 31), "")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "PERIOD_CLOSE_VALIDATION_FAILED");
    let details = err.details().unwrap();
    assert!(details["unbalanced_accounts"]
        .as_array()
        .unwrap()
        .iter()
        .any(|a| a["code"] == "4101"));

    let page = service.list_periods(&PeriodFilter::default()).await.unwrap();
    assert_eq!(page.total, 0);
    let closings = ledger
        .list_entries(&JournalFilter {
            source_type: Some(SourceType::Closing),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(closings.is_empty());
    let after: Vec<(String, Decimal)> = ledger
        .list_accounts(true)
        .await
        .unwrap()
        .into_iter()
        .map(|a| (a.code, a.balance))
        .collect();
    assert_eq!(before, after);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.validation_failures, 1);
    assert_eq!(snapshot.closings_active, 0);
}
