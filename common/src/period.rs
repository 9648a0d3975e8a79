//! Accounting period types and lifecycle state machine.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{JournalId, LedgerError, PeriodId, Result};

/// Accounting period status, derived from the closed and locked flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodStatus {
    /// Transactions may be posted.
    Open,
    /// Closing entry posted; may still be reopened.
    Closed,
    /// Permanently closed.
    Locked,
}

impl PeriodStatus {
    /// Get valid next states from current state.
    pub fn valid_transitions(&self) -> &[PeriodStatus] {
        match self {
            PeriodStatus::Open => &[PeriodStatus::Closed],
            PeriodStatus::Closed => &[PeriodStatus::Locked, PeriodStatus::Open],
            PeriodStatus::Locked => &[],
        }
    }

    /// Check if transition to given state is valid.
    pub fn can_transition_to(&self, next: PeriodStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        matches!(self, PeriodStatus::Locked)
    }

    /// Parse from the stored/wire representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => Some(PeriodStatus::Open),
            "CLOSED" => Some(PeriodStatus::Closed),
            "LOCKED" => Some(PeriodStatus::Locked),
            _ => None,
        }
    }

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodStatus::Open => "OPEN",
            PeriodStatus::Closed => "CLOSED",
            PeriodStatus::Locked => "LOCKED",
        }
    }
}

/// Figures recorded on a period when it is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClosingTotals {
    /// Revenue moved into retained earnings.
    pub total_revenue: Decimal,
    /// Expense moved into retained earnings.
    pub total_expense: Decimal,
}

impl ClosingTotals {
    /// Net income (revenue minus expense).
    pub fn net_income(&self) -> Decimal {
        self.total_revenue - self.total_expense
    }
}

/// A fiscal/accounting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingPeriod {
    /// Unique period identifier.
    pub id: PeriodId,
    /// First day of the period (inclusive).
    pub start_date: NaiveDate,
    /// Last day of the period (inclusive).
    pub end_date: NaiveDate,
    /// Free-form description.
    pub description: String,
    pub is_closed: bool,
    pub is_locked: bool,
    pub closed_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    pub total_revenue: Decimal,
    pub total_expense: Decimal,
    pub net_income: Decimal,
    /// Closing entry posted for this period. Weak reference: the entry may be voided.
    pub closing_journal_id: Option<JournalId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountingPeriod {
    /// Create a new open period.
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        description: impl Into<String>,
    ) -> Result<Self> {
        if start_date > end_date {
            return Err(LedgerError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }

        let now = Utc::now();
        Ok(Self {
            id: PeriodId::new(),
            start_date,
            end_date,
            description: description.into(),
            is_closed: false,
            is_locked: false,
            closed_at: None,
            locked_at: None,
            total_revenue: Decimal::ZERO,
            total_expense: Decimal::ZERO,
            net_income: Decimal::ZERO,
            closing_journal_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Current lifecycle status.
    pub fn status(&self) -> PeriodStatus {
        if self.is_locked {
            PeriodStatus::Locked
        } else if self.is_closed {
            PeriodStatus::Closed
        } else {
            PeriodStatus::Open
        }
    }

    /// History code, `PC-<end_date>`.
    pub fn code(&self) -> String {
        format!("PC-{}", self.end_date.format("%Y-%m-%d"))
    }

    /// Check if a date falls inside the period.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Check if the period shares at least one day with the range.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }

    /// Mark the period closed with the figures moved to retained earnings.
    pub fn close(&mut self, totals: ClosingTotals, closing_journal_id: Option<JournalId>) -> Result<()> {
        match self.status() {
            PeriodStatus::Locked => return Err(LedgerError::PeriodLocked(self.id)),
            PeriodStatus::Closed => {
                return Err(LedgerError::PeriodAlreadyClosed {
                    start: self.start_date,
                    end: self.end_date,
                })
            }
            PeriodStatus::Open => {}
        }

        let now = Utc::now();
        self.is_closed = true;
        self.closed_at = Some(now);
        self.total_revenue = totals.total_revenue;
        self.total_expense = totals.total_expense;
        self.net_income = totals.net_income();
        self.closing_journal_id = closing_journal_id;
        self.updated_at = now;
        Ok(())
    }

    /// Lock a closed period permanently.
    pub fn lock(&mut self) -> Result<()> {
        let from = self.status();
        if !from.can_transition_to(PeriodStatus::Locked) {
            return Err(LedgerError::InvalidPeriodTransition {
                from,
                to: PeriodStatus::Locked,
            });
        }

        let now = Utc::now();
        self.is_locked = true;
        self.locked_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Reopen a closed (not locked) period. Returns the closing entry to reverse.
    pub fn reopen(&mut self) -> Result<Option<JournalId>> {
        match self.status() {
            PeriodStatus::Locked => return Err(LedgerError::PeriodLocked(self.id)),
            PeriodStatus::Open => {
                return Err(LedgerError::InvalidPeriodTransition {
                    from: PeriodStatus::Open,
                    to: PeriodStatus::Open,
                })
            }
            PeriodStatus::Closed => {}
        }

        self.is_closed = false;
        self.closed_at = None;
        self.total_revenue = Decimal::ZERO;
        self.total_expense = Decimal::ZERO;
        self.net_income = Decimal::ZERO;
        self.updated_at = Utc::now();
        Ok(self.closing_journal_id.take())
    }
}
