//! Closing entry construction.
//!
//! Turns the revenue and expense balances left at a period end into the lines
//! of one balanced `CLOSING` entry that moves them into retained earnings.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use closebook_common::{AccountId, ClosingTotals, DebitCredit};
use closebook_ledger::{
    Account, AccountBalance, AccountType, NewJournalEntry, NewJournalLine, SourceType,
};

/// A proposed closing line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosingLine {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: String,
}

impl ClosingLine {
    fn new(
        account: (AccountId, &str, &str, AccountType),
        debit: Decimal,
        credit: Decimal,
        description: String,
    ) -> Self {
        let (account_id, code, name, account_type) = account;
        Self {
            account_id,
            code: code.to_string(),
            name: name.to_string(),
            account_type,
            debit,
            credit,
            description,
        }
    }

    /// Line that zeroes a balance held on the credit side (revenue).
    fn close_credit_normal(balance: &AccountBalance, description: String) -> Self {
        let (debit, credit) = if balance.balance > Decimal::ZERO {
            (balance.balance, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -balance.balance)
        };
        Self::new(
            (balance.account_id, &balance.code, &balance.name, balance.account_type),
            debit,
            credit,
            description,
        )
    }

    /// Line that zeroes a balance held on the debit side (expense).
    fn close_debit_normal(balance: &AccountBalance, description: String) -> Self {
        let (debit, credit) = if balance.balance > Decimal::ZERO {
            (Decimal::ZERO, balance.balance)
        } else {
            (-balance.balance, Decimal::ZERO)
        };
        Self::new(
            (balance.account_id, &balance.code, &balance.name, balance.account_type),
            debit,
            credit,
            description,
        )
    }
}

/// Everything needed to post a period's closing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosingPlan {
    pub entry_date: NaiveDate,
    pub description: String,
    pub lines: Vec<ClosingLine>,
    pub totals: ClosingTotals,
    /// Revenue accounts with a balance to close.
    pub revenue_accounts: usize,
    /// Expense accounts with a balance to close.
    pub expense_accounts: usize,
}

impl ClosingPlan {
    /// Build the plan from balances as of the period end.
    ///
    /// Header accounts and accounts other than revenue and expense are ignored.
    /// Every non-zero balance is closed exactly, so the plan leaves nothing behind.
    pub fn build(
        balances: &[AccountBalance],
        retained_earnings: &Account,
        entry_date: NaiveDate,
        description: impl Into<String>,
    ) -> Self {
        let open = |t: AccountType| -> Vec<&AccountBalance> {
            balances
                .iter()
                .filter(|b| !b.is_header && b.account_type == t && !b.balance.is_zero())
                .collect()
        };
        let revenues = open(AccountType::Revenue);
        let expenses = open(AccountType::Expense);

        let total_revenue: Decimal = revenues.iter().map(|b| b.balance).sum();
        let total_expense: Decimal = expenses.iter().map(|b| b.balance).sum();

        let retained = (
            retained_earnings.id,
            retained_earnings.code.as_str(),
            retained_earnings.name.as_str(),
            retained_earnings.account_type,
        );

        let mut lines = Vec::with_capacity(revenues.len() + expenses.len() + 2);

        for balance in &revenues {
            lines.push(ClosingLine::close_credit_normal(
                balance,
                format!("Close revenue account: {}", balance.name),
            ));
        }
        if total_revenue > Decimal::ZERO {
            lines.push(ClosingLine::new(
                retained,
                Decimal::ZERO,
                total_revenue,
                "Transfer revenue to retained earnings".to_string(),
            ));
        } else if total_revenue < Decimal::ZERO {
            lines.push(ClosingLine::new(
                retained,
                -total_revenue,
                Decimal::ZERO,
                "Transfer revenue to retained earnings".to_string(),
            ));
        }

        if total_expense > Decimal::ZERO {
            lines.push(ClosingLine::new(
                retained,
                total_expense,
                Decimal::ZERO,
                "Transfer expenses to retained earnings".to_string(),
            ));
        } else if total_expense < Decimal::ZERO {
            lines.push(ClosingLine::new(
                retained,
                Decimal::ZERO,
                -total_expense,
                "Transfer expenses to retained earnings".to_string(),
            ));
        }
        for balance in &expenses {
            lines.push(ClosingLine::close_debit_normal(
                balance,
                format!("Close expense account: {}", balance.name),
            ));
        }

        Self {
            entry_date,
            description: description.into(),
            lines,
            totals: ClosingTotals {
                total_revenue,
                total_expense,
            },
            revenue_accounts: revenues.len(),
            expense_accounts: expenses.len(),
        }
    }

    /// No revenue or expense account carries a balance.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn totals(&self) -> DebitCredit {
        self.lines
            .iter()
            .fold(DebitCredit::default(), |acc, l| acc + DebitCredit::new(l.debit, l.credit))
    }

    pub fn is_balanced(&self) -> bool {
        self.totals().is_balanced()
    }

    /// Change in retained earnings once posted (credit-normal), summed from the
    /// retained earnings lines themselves.
    pub fn retained_earnings_effect(&self) -> Decimal {
        self.lines
            .iter()
            .filter(|l| l.account_type == AccountType::Equity)
            .map(|l| l.credit - l.debit)
            .sum()
    }

    /// Journal request for the closing entry, `None` when there is nothing to close.
    pub fn to_entry(&self, reference: impl Into<String>) -> Option<NewJournalEntry> {
        if self.is_empty() {
            return None;
        }
        Some(NewJournalEntry {
            source_type: SourceType::Closing,
            reference: Some(reference.into()),
            description: self.description.clone(),
            entry_date: self.entry_date,
            lines: self
                .lines
                .iter()
                .map(|l| {
                    if l.debit > Decimal::ZERO {
                        NewJournalLine::debit(l.account_id, l.debit, l.description.clone())
                    } else {
                        NewJournalLine::credit(l.account_id, l.credit, l.description.clone())
                    }
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
    }

    fn retained() -> Account {
        Account::new("3201", "Retained Earnings", AccountType::Equity, None, false)
    }

    fn balance(code: &str, account_type: AccountType, value: Decimal) -> AccountBalance {
        let account = Account::new(code, format!("Account {code}"), account_type, None, false);
        let totals = match account_type {
            AccountType::Revenue if value >= Decimal::ZERO => DebitCredit::new(Decimal::ZERO, value),
            AccountType::Revenue => DebitCredit::new(-value, Decimal::ZERO),
            _ if value >= Decimal::ZERO => DebitCredit::new(value, Decimal::ZERO),
            _ => DebitCredit::new(Decimal::ZERO, -value),
        };
        AccountBalance::from_totals(&account, totals)
    }

    #[test]
    fn test_sales_and_cogs_scenario() {
        let balances = vec![
            balance("4101", AccountType::Revenue, dec!(21000000)),
            balance("5101", AccountType::Expense, dec!(10500000)),
            balance("1101", AccountType::Asset, dec!(10500000)),
        ];
        let plan = ClosingPlan::build(&balances, &retained(), date(), "FY2025");

        assert_eq!(plan.lines.len(), 4);
        assert_eq!(plan.revenue_accounts, 1);
        assert_eq!(plan.expense_accounts, 1);
        assert!(plan.is_balanced());
        assert_eq!(plan.totals().debit, dec!(31500000));
        assert_eq!(plan.retained_earnings_effect(), dec!(10500000));

        assert_eq!(plan.lines[0].code, "4101");
        assert_eq!(plan.lines[0].debit, dec!(21000000));
        assert_eq!(plan.lines[1].credit, dec!(21000000));
        assert_eq!(plan.lines[2].debit, dec!(10500000));
        assert_eq!(plan.lines[3].code, "5101");
        assert_eq!(plan.lines[3].credit, dec!(10500000));
        assert_eq!(plan.lines[3].description, "Close expense account: Account 5101");

        let entry = plan.to_entry("PC-2025-12-31").unwrap();
        assert_eq!(entry.source_type, SourceType::Closing);
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_negative_balances_close_on_the_other_side() {
        let balances = vec![
            balance("4201", AccountType::Revenue, dec!(-50)),
            balance("5201", AccountType::Expense, dec!(-20)),
        ];
        let plan = ClosingPlan::build(&balances, &retained(), date(), "");

        assert!(plan.is_balanced());
        assert_eq!(plan.lines[0].credit, dec!(50));
        assert_eq!(plan.lines[1].debit, dec!(50));
        assert_eq!(plan.lines[2].credit, dec!(20));
        assert_eq!(plan.lines[3].debit, dec!(20));
        assert_eq!(plan.retained_earnings_effect(), dec!(-30));
    }

    #[test]
    fn test_nothing_to_close() {
        let balances = vec![
            balance("4101", AccountType::Revenue, Decimal::ZERO),
            balance("1101", AccountType::Asset, dec!(100)),
        ];
        let plan = ClosingPlan::build(&balances, &retained(), date(), "");
        assert!(plan.is_empty());
        assert!(plan.to_entry("PC-2025-12-31").is_none());
        assert_eq!(plan.totals, ClosingTotals::default());
    }

    #[test]
    fn test_offsetting_revenues_skip_the_transfer_line() {
        let balances = vec![
            balance("4101", AccountType::Revenue, dec!(75)),
            balance("4900", AccountType::Revenue, dec!(-75)),
        ];
        let plan = ClosingPlan::build(&balances, &retained(), date(), "");
        assert_eq!(plan.lines.len(), 2);
        assert!(plan.is_balanced());
        assert!(plan.to_entry("x").unwrap().validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_plan_is_balanced_and_conserves(
            revenues in prop::collection::vec(-1_000_000i64..1_000_000, 0..6),
            expenses in prop::collection::vec(-1_000_000i64..1_000_000, 0..6),
        ) {
            let mut balances = Vec::new();
            for (i, cents) in revenues.iter().enumerate() {
                balances.push(balance(&format!("41{i:02}"), AccountType::Revenue, Decimal::new(*cents, 2)));
            }
            for (i, cents) in expenses.iter().enumerate() {
                balances.push(balance(&format!("51{i:02}"), AccountType::Expense, Decimal::new(*cents, 2)));
            }

            let plan = ClosingPlan::build(&balances, &retained(), date(), "");
            prop_assert!(plan.is_balanced());

            let revenue: Decimal = revenues.iter().map(|c| Decimal::new(*c, 2)).sum();
            let expense: Decimal = expenses.iter().map(|c| Decimal::new(*c, 2)).sum();
            prop_assert_eq!(plan.retained_earnings_effect(), revenue - expense);

            let re_net: Decimal = plan
                .lines
                .iter()
                .filter(|l| l.code == "3201")
                .map(|l| l.credit - l.debit)
                .sum();
            prop_assert_eq!(re_net, revenue - expense);

            if let Some(entry) = plan.to_entry("x") {
                prop_assert!(entry.validate().is_ok());
            }
        }
    }
}
