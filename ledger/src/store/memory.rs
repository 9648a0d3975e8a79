//! In-memory ledger store.
//!
//! Transactions take an exclusive lock over the whole state and work on it in
//! place; a snapshot taken at `begin` is restored unless the transaction commits.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use closebook_common::{
    AccountId, AccountingPeriod, DebitCredit, JournalId, LedgerError, PeriodId, Result,
};

use super::{LedgerStore, LedgerTx};
use crate::account::Account;
use crate::balance::{sum_lines, Cutoff};
use crate::journal::{JournalEntry, JournalFilter};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<JournalId, JournalEntry>,
    periods: BTreeMap<PeriodId, AccountingPeriod>,
}

/// Process-local store, used for development and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(MemoryTx {
            guard,
            snapshot: Some(snapshot),
        })
    }
}

/// Transaction over [`MemoryStore`].
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    snapshot: Option<MemoryState>,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_ledger(&mut self) -> Result<()> {
        // already exclusive
        Ok(())
    }

    async fn insert_account(&mut self, account: &Account) -> Result<()> {
        let duplicate = self
            .guard
            .accounts
            .values()
            .any(|a| a.is_live() && a.code == account.code && a.id != account.id);
        if duplicate && account.is_live() {
            return Err(LedgerError::DuplicateAccountCode(account.code.clone()));
        }
        self.guard.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> Result<()> {
        match self.guard.accounts.get_mut(&account.id) {
            Some(existing) => {
                *existing = account.clone();
                Ok(())
            }
            None => Err(LedgerError::AccountNotFound(account.id.to_string())),
        }
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.guard.accounts.get(&id).cloned())
    }

    async fn find_account_by_code(&mut self, code: &str) -> Result<Option<Account>> {
        Ok(self
            .guard
            .accounts
            .values()
            .find(|a| a.is_live() && a.code == code)
            .cloned())
    }

    async fn list_accounts(&mut self, include_deleted: bool) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .guard
            .accounts
            .values()
            .filter(|a| include_deleted || a.is_live())
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn set_balances(&mut self, balances: &[(AccountId, Decimal)]) -> Result<()> {
        let now = chrono::Utc::now();
        for (id, balance) in balances {
            if let Some(account) = self.guard.accounts.get_mut(id) {
                account.balance = *balance;
                account.updated_at = now;
            }
        }
        Ok(())
    }

    async fn line_totals(&mut self, cutoff: Cutoff) -> Result<HashMap<AccountId, DebitCredit>> {
        Ok(sum_lines(self.guard.entries.values(), cutoff))
    }

    async fn insert_entry(&mut self, entry: &JournalEntry) -> Result<()> {
        self.guard.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn update_entry_status(&mut self, entry: &JournalEntry) -> Result<()> {
        match self.guard.entries.get_mut(&entry.id) {
            Some(existing) => {
                existing.status = entry.status;
                existing.posted_at = entry.posted_at;
                existing.voided_at = entry.voided_at;
                Ok(())
            }
            None => Err(LedgerError::JournalNotFound(entry.id)),
        }
    }

    async fn get_entry(&mut self, id: JournalId) -> Result<Option<JournalEntry>> {
        Ok(self.guard.entries.get(&id).cloned())
    }

    async fn list_entries(&mut self, filter: &JournalFilter) -> Result<Vec<JournalEntry>> {
        let mut entries: Vec<&JournalEntry> = self
            .guard
            .entries
            .values()
            .filter(|e| filter.matches(e))
            .collect();
        entries.sort_by(|a, b| {
            b.entry_date
                .cmp(&a.entry_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(entries
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .cloned()
            .collect())
    }

    async fn save_period(&mut self, period: &AccountingPeriod) -> Result<()> {
        self.guard.periods.insert(period.id, period.clone());
        Ok(())
    }

    async fn get_period(&mut self, id: PeriodId) -> Result<Option<AccountingPeriod>> {
        Ok(self.guard.periods.get(&id).cloned())
    }

    async fn find_period_by_range(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<AccountingPeriod>> {
        Ok(self
            .guard
            .periods
            .values()
            .find(|p| p.start_date == start && p.end_date == end)
            .cloned())
    }

    async fn closed_period_for_date(&mut self, date: NaiveDate) -> Result<Option<AccountingPeriod>> {
        Ok(self
            .guard
            .periods
            .values()
            .filter(|p| p.is_closed && p.contains(date))
            .max_by_key(|p| p.end_date)
            .cloned())
    }

    async fn list_periods(&mut self) -> Result<Vec<AccountingPeriod>> {
        let mut periods: Vec<AccountingPeriod> = self.guard.periods.values().cloned().collect();
        periods.sort_by(|a, b| b.end_date.cmp(&a.end_date));
        Ok(periods)
    }

    async fn commit(mut self) -> Result<()> {
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
