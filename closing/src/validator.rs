//! Post-close validation.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, error};

use closebook_common::{
    is_negligible, AccountId, LedgerError, Result, UnbalancedAccount, ValidationCheck,
};
use closebook_ledger::balance::Cutoff;
use closebook_ledger::engine::{aggregate, expected_balances};
use closebook_ledger::{Account, AccountBalance, AccountType, LedgerTx};

/// Checks a freshly closed period inside the closing transaction.
#[derive(Debug, Clone, Copy)]
pub struct ClosingValidator {
    epsilon: Decimal,
}

impl ClosingValidator {
    pub fn new(epsilon: Decimal) -> Self {
        Self { epsilon }
    }

    /// Revenue and expense accounts still carrying a balance at the period end.
    pub fn residual_balances(&self, as_of_end: &[AccountBalance]) -> Vec<UnbalancedAccount> {
        as_of_end
            .iter()
            .filter(|b| !b.is_header)
            .filter(|b| matches!(b.account_type, AccountType::Revenue | AccountType::Expense))
            .filter(|b| !is_negligible(b.balance, self.epsilon))
            .map(|b| UnbalancedAccount {
                account_id: b.account_id,
                code: b.code.clone(),
                name: b.name.clone(),
                check: ValidationCheck::ZeroBalance,
                expected: Decimal::ZERO,
                actual: b.balance,
            })
            .collect()
    }

    /// Live accounts whose cached balance differs from the ledger.
    pub fn stale_cache(
        &self,
        accounts: &[Account],
        expected: &HashMap<AccountId, Decimal>,
    ) -> Vec<UnbalancedAccount> {
        accounts
            .iter()
            .filter(|a| a.is_live())
            .filter_map(|a| {
                let ledger = expected.get(&a.id).copied().unwrap_or_default();
                if is_negligible(a.balance - ledger, self.epsilon) {
                    return None;
                }
                Some(UnbalancedAccount {
                    account_id: a.id,
                    code: a.code.clone(),
                    name: a.name.clone(),
                    check: ValidationCheck::CacheConsistency,
                    expected: ledger,
                    actual: a.balance,
                })
            })
            .collect()
    }

    /// Re-read balances through the transaction and fail with every offending account.
    pub async fn verify<T: LedgerTx>(&self, tx: &mut T, period_end: NaiveDate) -> Result<()> {
        let as_of_end = aggregate(tx, Cutoff::AsOf { date: period_end }).await?;

        let mut failures = self.residual_balances(&as_of_end);

        let (accounts, expected) = expected_balances(tx).await?;
        failures.extend(self.stale_cache(&accounts, &expected));

        if failures.is_empty() {
            debug!(%period_end, "Closing validation passed");
            return Ok(());
        }

        for f in &failures {
            error!(
                code = %f.code,
                check = ?f.check,
                expected = %f.expected,
                actual = %f.actual,
                "Closing validation failed"
            );
        }
        Err(LedgerError::ValidationFailed { accounts: failures })
    }
}
