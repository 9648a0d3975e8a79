//! Storage seam for the ledger.
//!
//! Every read and write happens inside a [`LedgerTx`]. Dropping a transaction
//! without calling [`LedgerTx::commit`] discards its writes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use closebook_common::{AccountId, AccountingPeriod, DebitCredit, JournalId, PeriodId, Result};

use crate::account::Account;
use crate::balance::Cutoff;
use crate::journal::{JournalEntry, JournalFilter};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Transaction factory.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    type Tx: LedgerTx;

    /// Open a transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// Operations available inside one transaction.
#[async_trait]
pub trait LedgerTx: Send {
    /// Serialise against every other ledger-mutating transaction until commit/rollback.
    async fn lock_ledger(&mut self) -> Result<()>;

    async fn insert_account(&mut self, account: &Account) -> Result<()>;
    async fn update_account(&mut self, account: &Account) -> Result<()>;
    async fn get_account(&mut self, id: AccountId) -> Result<Option<Account>>;
    /// Live account by code.
    async fn find_account_by_code(&mut self, code: &str) -> Result<Option<Account>>;
    /// Accounts ordered by code.
    async fn list_accounts(&mut self, include_deleted: bool) -> Result<Vec<Account>>;
    /// Overwrite cached balances.
    async fn set_balances(&mut self, balances: &[(AccountId, Decimal)]) -> Result<()>;

    /// Raw debit/credit sums per account over the lines a cutoff admits.
    async fn line_totals(&mut self, cutoff: Cutoff) -> Result<HashMap<AccountId, DebitCredit>>;
    /// Insert an entry with its lines.
    async fn insert_entry(&mut self, entry: &JournalEntry) -> Result<()>;
    /// Persist a status change. Lines are immutable.
    async fn update_entry_status(&mut self, entry: &JournalEntry) -> Result<()>;
    async fn get_entry(&mut self, id: JournalId) -> Result<Option<JournalEntry>>;
    /// Entries newest first.
    async fn list_entries(&mut self, filter: &JournalFilter) -> Result<Vec<JournalEntry>>;

    /// Insert or update a period.
    async fn save_period(&mut self, period: &AccountingPeriod) -> Result<()>;
    async fn get_period(&mut self, id: PeriodId) -> Result<Option<AccountingPeriod>>;
    async fn find_period_by_range(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<AccountingPeriod>>;
    /// Closed or locked period containing the date.
    async fn closed_period_for_date(&mut self, date: NaiveDate) -> Result<Option<AccountingPeriod>>;
    /// Periods ordered by end date, newest first.
    async fn list_periods(&mut self) -> Result<Vec<AccountingPeriod>>;

    async fn commit(self) -> Result<()>;
    async fn rollback(self) -> Result<()>;
}
