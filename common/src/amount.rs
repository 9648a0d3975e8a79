//! Amount helpers for ledger arithmetic.
//!
//! All money is carried as [`Decimal`]; floats never touch a balance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Tolerance under which a balance is treated as zero (0.01).
pub const BALANCE_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Decimal places stored for monetary columns.
pub const MONEY_SCALE: u32 = 2;

/// Check whether `value` is zero within `epsilon` (strictly below).
pub fn is_negligible(value: Decimal, epsilon: Decimal) -> bool {
    value.abs() < epsilon
}

/// Raw debit and credit sums for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitCredit {
    /// Sum of debit amounts.
    pub debit: Decimal,
    /// Sum of credit amounts.
    pub credit: Decimal,
}

impl DebitCredit {
    /// Create from raw sums.
    pub fn new(debit: Decimal, credit: Decimal) -> Self {
        Self { debit, credit }
    }

    /// Debit-normal net (debit minus credit).
    pub fn net_debit(&self) -> Decimal {
        self.debit - self.credit
    }

    /// Check that debits equal credits exactly.
    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit
    }
}

impl Add for DebitCredit {
    type Output = DebitCredit;

    fn add(self, other: DebitCredit) -> Self::Output {
        DebitCredit {
            debit: self.debit + other.debit,
            credit: self.credit + other.credit,
        }
    }
}

impl AddAssign for DebitCredit {
    fn add_assign(&mut self, other: DebitCredit) {
        self.debit += other.debit;
        self.credit += other.credit;
    }
}
