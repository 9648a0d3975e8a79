//! Reconciliation and trial balance reports.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use closebook_common::{is_negligible, AccountId, AccountingPeriod, DateRange, JournalId};

use crate::account::{Account, AccountType};
use crate::balance::AccountBalance;
use crate::journal::{JournalEntry, JournalStatus, SourceType};

/// Stored vs ledger balance for one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceCheck {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub is_header: bool,
    /// Value in `accounts.balance`.
    pub stored_balance: Decimal,
    /// Value recomputed from posted lines (rolled up for headers).
    pub ledger_balance: Decimal,
    /// `stored_balance - ledger_balance`.
    pub difference: Decimal,
    pub is_consistent: bool,
}

/// Compare cached balances with the expected ledger values.
pub fn check_balances(
    accounts: &[Account],
    expected: &HashMap<AccountId, Decimal>,
    epsilon: Decimal,
) -> Vec<BalanceCheck> {
    accounts
        .iter()
        .filter(|a| a.is_live())
        .map(|account| {
            let ledger_balance = expected.get(&account.id).copied().unwrap_or_default();
            let difference = account.balance - ledger_balance;
            BalanceCheck {
                account_id: account.id,
                code: account.code.clone(),
                name: account.name.clone(),
                account_type: account.account_type,
                is_header: account.is_header,
                stored_balance: account.balance,
                ledger_balance,
                difference,
                is_consistent: is_negligible(difference, epsilon),
            }
        })
        .collect()
}

/// Assets = Liabilities + Equity + (Revenue - Expense).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingEquation {
    pub assets: Decimal,
    pub liabilities: Decimal,
    pub equity: Decimal,
    pub revenue: Decimal,
    pub expense: Decimal,
    pub net_income: Decimal,
    pub difference: Decimal,
    pub is_balanced: bool,
}

impl AccountingEquation {
    /// Evaluate over non-header balances.
    pub fn evaluate(balances: &[AccountBalance], epsilon: Decimal) -> Self {
        let sum = |t: AccountType| -> Decimal {
            balances
                .iter()
                .filter(|b| !b.is_header && b.account_type == t)
                .map(|b| b.balance)
                .sum()
        };

        let assets = sum(AccountType::Asset);
        let liabilities = sum(AccountType::Liability);
        let equity = sum(AccountType::Equity);
        let revenue = sum(AccountType::Revenue);
        let expense = sum(AccountType::Expense);
        let net_income = revenue - expense;
        let difference = assets - (liabilities + equity + net_income);

        Self {
            assets,
            liabilities,
            equity,
            revenue,
            expense,
            net_income,
            difference,
            is_balanced: is_negligible(difference, epsilon),
        }
    }
}

/// A posted closing entry that no closed period points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanClosing {
    pub journal_id: JournalId,
    pub entry_date: NaiveDate,
    pub description: String,
    pub total_debit: Decimal,
}

/// Posted closing entries not referenced by any closed period.
pub fn orphan_closings(entries: &[JournalEntry], periods: &[AccountingPeriod]) -> Vec<OrphanClosing> {
    let referenced: HashSet<JournalId> = periods
        .iter()
        .filter(|p| p.is_closed)
        .filter_map(|p| p.closing_journal_id)
        .collect();

    entries
        .iter()
        .filter(|e| e.source_type == SourceType::Closing && e.status == JournalStatus::Posted)
        .filter(|e| !referenced.contains(&e.id))
        .map(|e| OrphanClosing {
            journal_id: e.id,
            entry_date: e.entry_date,
            description: e.description.clone(),
            total_debit: e.total_debit,
        })
        .collect()
}

/// Full reconciliation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub checked_at: DateTime<Utc>,
    pub accounts_checked: usize,
    pub inconsistent_count: usize,
    /// Every checked account.
    pub accounts: Vec<BalanceCheck>,
    pub equation: AccountingEquation,
    pub orphan_closings: Vec<OrphanClosing>,
    pub is_healthy: bool,
}

impl ReconciliationReport {
    pub fn new(
        accounts: Vec<BalanceCheck>,
        equation: AccountingEquation,
        orphan_closings: Vec<OrphanClosing>,
    ) -> Self {
        let inconsistent_count = accounts.iter().filter(|c| !c.is_consistent).count();
        let is_healthy = inconsistent_count == 0 && equation.is_balanced && orphan_closings.is_empty();
        Self {
            checked_at: Utc::now(),
            accounts_checked: accounts.len(),
            inconsistent_count,
            accounts,
            equation,
            orphan_closings,
            is_healthy,
        }
    }

    /// Accounts whose cache disagrees with the ledger.
    pub fn inconsistent(&self) -> impl Iterator<Item = &BalanceCheck> {
        self.accounts.iter().filter(|c| !c.is_consistent)
    }
}

/// One trial balance row; the net sits in the debit or credit column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub debit: Decimal,
    pub credit: Decimal,
    /// Balance on the account's normal side.
    pub balance: Decimal,
}

/// Trial balance as of a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of: NaiveDate,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub is_balanced: bool,
}

impl TrialBalance {
    /// Build from non-header balances, skipping accounts without activity.
    pub fn build(as_of: NaiveDate, balances: &[AccountBalance]) -> Self {
        let rows: Vec<TrialBalanceRow> = balances
            .iter()
            .filter(|b| !b.is_header && !(b.debit.is_zero() && b.credit.is_zero()))
            .map(|b| {
                let net = b.debit - b.credit;
                let (debit, credit) = if net >= Decimal::ZERO {
                    (net, Decimal::ZERO)
                } else {
                    (Decimal::ZERO, -net)
                };
                TrialBalanceRow {
                    account_id: b.account_id,
                    code: b.code.clone(),
                    name: b.name.clone(),
                    account_type: b.account_type,
                    debit,
                    credit,
                    balance: b.balance,
                }
            })
            .collect();

        let total_debit: Decimal = rows.iter().map(|r| r.debit).sum();
        let total_credit: Decimal = rows.iter().map(|r| r.credit).sum();

        Self {
            as_of,
            rows,
            total_debit,
            total_credit,
            is_balanced: total_debit == total_credit,
        }
    }
}

/// One revenue or expense account in an income statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatementLine {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub amount: Decimal,
}

/// Revenue and expense activity for a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub revenue: Vec<IncomeStatementLine>,
    pub expenses: Vec<IncomeStatementLine>,
    pub total_revenue: Decimal,
    pub total_expense: Decimal,
    pub net_income: Decimal,
}

impl IncomeStatement {
    /// Build from range balances; closing entries must already be excluded.
    pub fn build(range: DateRange, balances: &[AccountBalance]) -> Self {
        let lines = |t: AccountType| -> Vec<IncomeStatementLine> {
            balances
                .iter()
                .filter(|b| !b.is_header && b.account_type == t && !b.balance.is_zero())
                .map(|b| IncomeStatementLine {
                    account_id: b.account_id,
                    code: b.code.clone(),
                    name: b.name.clone(),
                    amount: b.balance,
                })
                .collect()
        };

        let revenue = lines(AccountType::Revenue);
        let expenses = lines(AccountType::Expense);
        let total_revenue: Decimal = revenue.iter().map(|l| l.amount).sum();
        let total_expense: Decimal = expenses.iter().map(|l| l.amount).sum();

        Self {
            start_date: range.start,
            end_date: range.end,
            revenue,
            expenses,
            total_revenue,
            total_expense,
            net_income: total_revenue - total_expense,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use closebook_common::{DebitCredit, BALANCE_EPSILON};
    use rust_decimal_macros::dec;

    fn balance(account: &Account, debit: Decimal, credit: Decimal) -> AccountBalance {
        AccountBalance::from_totals(account, DebitCredit::new(debit, credit))
    }

    #[test]
    fn test_equation_and_trial_balance() {
        let cash = Account::new("1101", "Cash", AccountType::Asset, None, false);
        let capital = Account::new("3101", "Capital", AccountType::Equity, None, false);
        let sales = Account::new("4101", "Sales", AccountType::Revenue, None, false);
        let cogs = Account::new("5101", "COGS", AccountType::Expense, None, false);
        let idle = Account::new("5900", "General", AccountType::Expense, None, false);

        let balances = vec![
            balance(&cash, dec!(1500), dec!(300)),
            balance(&capital, dec!(0), dec!(1000)),
            balance(&sales, dec!(0), dec!(500)),
            balance(&cogs, dec!(300), dec!(0)),
            balance(&idle, dec!(0), dec!(0)),
        ];

        let eq = AccountingEquation::evaluate(&balances, BALANCE_EPSILON);
        assert_eq!(eq.assets, dec!(1200));
        assert_eq!(eq.net_income, dec!(200));
        assert!(eq.is_balanced);

        let as_of = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let tb = TrialBalance::build(as_of, &balances);
        assert_eq!(tb.rows.len(), 4);
        assert_eq!(tb.total_debit, dec!(1500));
        assert_eq!(tb.total_credit, dec!(1500));
        assert!(tb.is_balanced);
    }

    #[test]
    fn test_income_statement_skips_idle_and_headers() {
        let header = Account::new("4000", "Revenue", AccountType::Revenue, None, true);
        let sales = Account::new("4101", "Sales", AccountType::Revenue, Some(header.id), false);
        let other = Account::new("4201", "Other", AccountType::Revenue, Some(header.id), false);
        let salary = Account::new("5201", "Salary", AccountType::Expense, None, false);
        let cash = Account::new("1101", "Cash", AccountType::Asset, None, false);

        let balances = vec![
            balance(&cash, dec!(900), dec!(0)),
            balance(&header, dec!(0), dec!(0)),
            balance(&sales, dec!(0), dec!(1200)),
            balance(&other, dec!(0), dec!(0)),
            balance(&salary, dec!(300), dec!(0)),
        ];

        let range = DateRange::month(2025, 3).unwrap();
        let statement = IncomeStatement::build(range, &balances);
        assert_eq!(statement.revenue.len(), 1);
        assert_eq!(statement.revenue[0].code, "4101");
        assert_eq!(statement.total_revenue, dec!(1200));
        assert_eq!(statement.total_expense, dec!(300));
        assert_eq!(statement.net_income, dec!(900));
        assert_eq!(statement.end_date, NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
    }

    #[test]
    fn test_check_balances_flags_drift() {
        let mut cash = Account::new("1101", "Cash", AccountType::Asset, None, false);
        cash.balance = dec!(100);
        let mut bank = Account::new("1102", "Bank", AccountType::Asset, None, false);
        bank.balance = dec!(40);

        let expected = HashMap::from([(cash.id, dec!(100)), (bank.id, dec!(55))]);
        let checks = check_balances(&[cash, bank], &expected, BALANCE_EPSILON);

        assert!(checks[0].is_consistent);
        assert!(!checks[1].is_consistent);
        assert_eq!(checks[1].difference, dec!(-15));

        let report = ReconciliationReport::new(
            checks,
            AccountingEquation::evaluate(&[], BALANCE_EPSILON),
            Vec::new(),
        );
        assert_eq!(report.inconsistent_count, 1);
        assert!(!report.is_healthy);
        assert_eq!(report.inconsistent().next().unwrap().code, "1102");
    }
}
