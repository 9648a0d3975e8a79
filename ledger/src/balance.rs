//! Balance aggregation over posted journal lines.
//!
//! Stores only ever return raw debit/credit sums per account. Turning those
//! sums into a signed balance happens in [`normal_balance`] and nowhere else.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use closebook_common::{AccountId, DateRange, DebitCredit};

use crate::account::{Account, AccountType, NormalSide};
use crate::journal::{JournalEntry, JournalStatus, SourceType};

/// Net balance of an account on its normal side.
///
/// Debit-normal types (asset, expense) return `debit - credit`; credit-normal
/// types (liability, equity, revenue) return `credit - debit`.
pub fn normal_balance(account_type: AccountType, totals: DebitCredit) -> Decimal {
    match account_type.normal_side() {
        NormalSide::Debit => totals.debit - totals.credit,
        NormalSide::Credit => totals.credit - totals.debit,
    }
}

/// Which posted lines an aggregation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cutoff {
    /// Every posted line, closing entries included. Source of truth for `accounts.balance`.
    AllTime,
    /// Every posted line except closing entries.
    ExcludingClosing,
    /// Lines dated inside the range, closing entries excluded.
    Range { start: NaiveDate, end: NaiveDate },
    /// Lines dated on or before the date, closing entries included.
    AsOf { date: NaiveDate },
}

impl Cutoff {
    /// Period activity cutoff.
    pub fn range(range: DateRange) -> Self {
        Cutoff::Range {
            start: range.start,
            end: range.end,
        }
    }

    /// Whether closing entries are counted.
    pub fn includes_closing(&self) -> bool {
        matches!(self, Cutoff::AllTime | Cutoff::AsOf { .. })
    }

    /// Inclusive date bounds, `None` meaning unbounded.
    pub fn bounds(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match *self {
            Cutoff::AllTime | Cutoff::ExcludingClosing => (None, None),
            Cutoff::Range { start, end } => (Some(start), Some(end)),
            Cutoff::AsOf { date } => (None, Some(date)),
        }
    }

    /// Check whether an entry's lines are counted under this cutoff.
    pub fn admits(&self, entry: &JournalEntry) -> bool {
        if entry.status != JournalStatus::Posted {
            return false;
        }
        if entry.source_type == SourceType::Closing && !self.includes_closing() {
            return false;
        }
        let (start, end) = self.bounds();
        start.map_or(true, |d| entry.entry_date >= d) && end.map_or(true, |d| entry.entry_date <= d)
    }
}

/// Aggregated balance of one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub is_header: bool,
    /// Sum of debit amounts.
    pub debit: Decimal,
    /// Sum of credit amounts.
    pub credit: Decimal,
    /// Net on the account's normal side.
    pub balance: Decimal,
}

impl AccountBalance {
    /// Combine an account with its raw line totals.
    pub fn from_totals(account: &Account, totals: DebitCredit) -> Self {
        Self {
            account_id: account.id,
            code: account.code.clone(),
            name: account.name.clone(),
            account_type: account.account_type,
            is_header: account.is_header,
            debit: totals.debit,
            credit: totals.credit,
            balance: normal_balance(account.account_type, totals),
        }
    }
}

/// Join accounts with line totals. Accounts without lines get zero balances.
/// Output is ordered by account code.
pub fn combine(accounts: &[Account], totals: &HashMap<AccountId, DebitCredit>) -> Vec<AccountBalance> {
    let mut balances: Vec<AccountBalance> = accounts
        .iter()
        .map(|account| {
            let t = totals.get(&account.id).copied().unwrap_or_default();
            AccountBalance::from_totals(account, t)
        })
        .collect();
    balances.sort_by(|a, b| a.code.cmp(&b.code));
    balances
}

/// Raw debit/credit sums per account for the entries a cutoff admits.
pub fn sum_lines<'a>(
    entries: impl IntoIterator<Item = &'a JournalEntry>,
    cutoff: Cutoff,
) -> HashMap<AccountId, DebitCredit> {
    let mut totals: HashMap<AccountId, DebitCredit> = HashMap::new();
    for entry in entries.into_iter().filter(|e| cutoff.admits(e)) {
        for line in &entry.lines {
            *totals.entry(line.account_id).or_default() +=
                DebitCredit::new(line.debit_amount, line.credit_amount);
        }
    }
    totals
}

/// Balances for every account, header accounts rolled up from their children.
///
/// Non-header accounts keep their own ledger balance. A header's balance is the
/// sum of its children's balances, recursively.
pub fn with_header_rollup(accounts: &[Account], leaf: &HashMap<AccountId, Decimal>) -> HashMap<AccountId, Decimal> {
    let mut children: HashMap<AccountId, Vec<&Account>> = HashMap::new();
    for account in accounts {
        if let Some(parent) = account.parent_id {
            children.entry(parent).or_default().push(account);
        }
    }

    fn resolve(
        account: &Account,
        children: &HashMap<AccountId, Vec<&Account>>,
        leaf: &HashMap<AccountId, Decimal>,
        out: &mut HashMap<AccountId, Decimal>,
        depth: usize,
    ) -> Decimal {
        if let Some(v) = out.get(&account.id) {
            return *v;
        }
        let value = if !account.is_header {
            leaf.get(&account.id).copied().unwrap_or_default()
        } else if depth > 32 {
            // parent cycle
            Decimal::ZERO
        } else {
            children
                .get(&account.id)
                .map(|kids| {
                    kids.iter()
                        .map(|kid| resolve(kid, children, leaf, out, depth + 1))
                        .sum()
                })
                .unwrap_or_default()
        };
        out.insert(account.id, value);
        value
    }

    let mut out = HashMap::with_capacity(accounts.len());
    for account in accounts {
        resolve(account, &children, leaf, &mut out, 0);
    }
    out
}
