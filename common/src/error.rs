//! Error types for closebook ledger operations.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AccountId, JournalId, PeriodId, PeriodStatus};

/// Main error type for ledger and closing operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed or semantically invalid request.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        field: Option<String>,
    },

    /// Start date after end date.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Account not found (by id or code).
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Another live account already uses the code.
    #[error("Account code already in use: {0}")]
    DuplicateAccountCode(String),

    /// Account cannot receive journal lines.
    #[error("Account {code} cannot be posted to: {reason}")]
    AccountNotPostable { code: String, reason: String },

    /// Account still carries a ledger balance.
    #[error("Account {code} has non-zero balance {balance}")]
    AccountHasBalance { code: String, balance: Decimal },

    /// Journal entry not found.
    #[error("Journal entry not found: {0}")]
    JournalNotFound(JournalId),

    /// Debits and credits differ.
    #[error("Unbalanced entry: debit {total_debit}, credit {total_credit}")]
    UnbalancedEntry {
        total_debit: Decimal,
        total_credit: Decimal,
    },

    /// Journal status change not allowed.
    #[error("Cannot {action} journal entry {journal_id} in status {status}")]
    InvalidJournalStatus {
        journal_id: JournalId,
        status: String,
        action: &'static str,
    },

    /// Closing entries are only reversed by reopening their period.
    #[error("Journal entry {0} is a closing entry; reopen its period instead")]
    ClosingEntryImmutable(JournalId),

    /// Accounting period not found.
    #[error("Accounting period not found: {0}")]
    PeriodNotFound(String),

    /// Period already closed.
    #[error("Period {start} to {end} is already closed")]
    PeriodAlreadyClosed { start: NaiveDate, end: NaiveDate },

    /// Period is locked and cannot change.
    #[error("Period {0} is locked")]
    PeriodLocked(PeriodId),

    /// Range overlaps a closed period.
    #[error("Range {start} to {end} overlaps closed period {existing}")]
    PeriodOverlap {
        start: NaiveDate,
        end: NaiveDate,
        existing: PeriodId,
    },

    /// Invalid period state transition.
    #[error("Invalid period transition from {from:?} to {to:?}")]
    InvalidPeriodTransition {
        from: PeriodStatus,
        to: PeriodStatus,
    },

    /// A later period is closed, so this range can be neither closed nor reopened.
    #[error("Period {start} to {end} cannot change: a later period ending {later_end} is closed")]
    LaterPeriodClosed {
        start: NaiveDate,
        end: NaiveDate,
        later_end: NaiveDate,
    },

    /// Date falls inside a closed period.
    #[error("Date {date} falls in closed period {period_id}")]
    DateInClosedPeriod { date: NaiveDate, period_id: PeriodId },

    /// Retained earnings account missing or unusable.
    #[error("Retained earnings account {0} not found")]
    RetainedEarningsNotFound(String),

    /// Post-close validation found non-zero temporary accounts or a stale cache.
    #[error("Period close validation failed for {} account(s)", .accounts.len())]
    ValidationFailed { accounts: Vec<UnbalancedAccount> },

    /// Database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Coarse error class, used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller sent bad input.
    Invalid,
    /// Referenced record does not exist.
    NotFound,
    /// Request conflicts with current state.
    Conflict,
    /// Ledger integrity check failed; work was rolled back.
    Integrity,
    /// Store or server failure.
    Internal,
}

impl LedgerError {
    /// Shorthand for [`LedgerError::InvalidRequest`] without a field.
    pub fn invalid(message: impl Into<String>) -> Self {
        LedgerError::InvalidRequest {
            message: message.into(),
            field: None,
        }
    }

    /// Shorthand for [`LedgerError::InvalidRequest`] naming a field.
    pub fn invalid_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        LedgerError::InvalidRequest {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            LedgerError::InvalidRequest { .. }
            | LedgerError::InvalidDateRange { .. }
            | LedgerError::AccountNotPostable { .. }
            | LedgerError::UnbalancedEntry { .. } => ErrorCategory::Invalid,
            LedgerError::AccountNotFound(_)
            | LedgerError::JournalNotFound(_)
            | LedgerError::PeriodNotFound(_)
            | LedgerError::RetainedEarningsNotFound(_) => ErrorCategory::NotFound,
            LedgerError::DuplicateAccountCode(_)
            | LedgerError::AccountHasBalance { .. }
            | LedgerError::InvalidJournalStatus { .. }
            | LedgerError::ClosingEntryImmutable(_)
            | LedgerError::PeriodAlreadyClosed { .. }
            | LedgerError::PeriodLocked(_)
            | LedgerError::PeriodOverlap { .. }
            | LedgerError::InvalidPeriodTransition { .. }
            | LedgerError::LaterPeriodClosed { .. }
            | LedgerError::DateInClosedPeriod { .. } => ErrorCategory::Conflict,
            LedgerError::ValidationFailed { .. } => ErrorCategory::Integrity,
            LedgerError::DatabaseError(_)
            | LedgerError::ConfigurationError(_)
            | LedgerError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::InvalidRequest { .. } => "INVALID_REQUEST",
            LedgerError::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            LedgerError::DuplicateAccountCode(_) => "DUPLICATE_ACCOUNT_CODE",
            LedgerError::AccountNotPostable { .. } => "ACCOUNT_NOT_POSTABLE",
            LedgerError::AccountHasBalance { .. } => "ACCOUNT_HAS_BALANCE",
            LedgerError::JournalNotFound(_) => "JOURNAL_NOT_FOUND",
            LedgerError::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            LedgerError::InvalidJournalStatus { .. } => "INVALID_JOURNAL_STATUS",
            LedgerError::ClosingEntryImmutable(_) => "CLOSING_ENTRY_IMMUTABLE",
            LedgerError::PeriodNotFound(_) => "PERIOD_NOT_FOUND",
            LedgerError::PeriodAlreadyClosed { .. } => "PERIOD_ALREADY_CLOSED",
            LedgerError::PeriodLocked(_) => "PERIOD_LOCKED",
            LedgerError::PeriodOverlap { .. } => "PERIOD_OVERLAP",
            LedgerError::InvalidPeriodTransition { .. } => "INVALID_TRANSITION",
            LedgerError::LaterPeriodClosed { .. } => "LATER_PERIOD_CLOSED",
            LedgerError::DateInClosedPeriod { .. } => "DATE_IN_CLOSED_PERIOD",
            LedgerError::RetainedEarningsNotFound(_) => "RETAINED_EARNINGS_NOT_FOUND",
            LedgerError::ValidationFailed { .. } => "PERIOD_CLOSE_VALIDATION_FAILED",
            LedgerError::DatabaseError(_) => "DATABASE_ERROR",
            LedgerError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            LedgerError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Structured details attached to the error response, if any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            LedgerError::InvalidRequest {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            LedgerError::UnbalancedEntry {
                total_debit,
                total_credit,
            } => Some(serde_json::json!({
                "total_debit": total_debit,
                "total_credit": total_credit,
            })),
            LedgerError::ValidationFailed { accounts } => {
                Some(serde_json::json!({ "unbalanced_accounts": accounts }))
            }
            _ => None,
        }
    }
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Which post-close check an account failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCheck {
    /// Temporary account did not reach zero at period end.
    ZeroBalance,
    /// Stored balance differs from the ledger balance.
    CacheConsistency,
}

/// One account that failed post-close validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbalancedAccount {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub check: ValidationCheck,
    /// Value the check required.
    pub expected: Decimal,
    /// Value actually found.
    pub actual: Decimal,
}
