//! Journal entry types for double-entry bookkeeping.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use closebook_common::{
    AccountId, DebitCredit, JournalId, JournalLineId, LedgerError, Result, MONEY_SCALE,
};

/// Business origin of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Manual,
    Sale,
    Purchase,
    Payment,
    Adjustment,
    Opening,
    /// Period-end transfer of revenue and expense into retained earnings.
    Closing,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Manual => "MANUAL",
            SourceType::Sale => "SALE",
            SourceType::Purchase => "PURCHASE",
            SourceType::Payment => "PAYMENT",
            SourceType::Adjustment => "ADJUSTMENT",
            SourceType::Opening => "OPENING",
            SourceType::Closing => "CLOSING",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MANUAL" => Ok(SourceType::Manual),
            "SALE" => Ok(SourceType::Sale),
            "PURCHASE" => Ok(SourceType::Purchase),
            "PAYMENT" => Ok(SourceType::Payment),
            "ADJUSTMENT" => Ok(SourceType::Adjustment),
            "OPENING" => Ok(SourceType::Opening),
            "CLOSING" => Ok(SourceType::Closing),
            other => Err(LedgerError::invalid_field(
                format!("unknown source type {other:?}"),
                "source_type",
            )),
        }
    }
}

/// Journal entry status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalStatus {
    Draft,
    Posted,
    Void,
}

impl JournalStatus {
    /// Get valid next states from current state.
    pub fn valid_transitions(&self) -> &[JournalStatus] {
        match self {
            JournalStatus::Draft => &[JournalStatus::Posted],
            JournalStatus::Posted => &[JournalStatus::Void],
            JournalStatus::Void => &[],
        }
    }

    /// Check if transition to given state is valid.
    pub fn can_transition_to(&self, next: JournalStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JournalStatus::Draft => "DRAFT",
            JournalStatus::Posted => "POSTED",
            JournalStatus::Void => "VOID",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(JournalStatus::Draft),
            "POSTED" => Ok(JournalStatus::Posted),
            "VOID" => Ok(JournalStatus::Void),
            other => Err(LedgerError::invalid_field(
                format!("unknown journal status {other:?}"),
                "status",
            )),
        }
    }
}

/// A single journal line. Exactly one side is positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub id: JournalLineId,
    pub journal_id: JournalId,
    /// 1-based position within the entry.
    pub line_number: i32,
    pub account_id: AccountId,
    pub description: String,
    pub debit_amount: Decimal,
    pub credit_amount: Decimal,
}

/// A journal entry header with its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique entry ID.
    pub id: JournalId,
    pub source_type: SourceType,
    /// External reference (invoice number, period code, ...).
    pub reference: Option<String>,
    pub description: String,
    /// Accounting date.
    pub entry_date: NaiveDate,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub status: JournalStatus,
    pub lines: Vec<JournalLine>,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
}

impl JournalEntry {
    /// Build a draft entry from a validated request.
    pub fn from_request(request: NewJournalEntry) -> Result<Self> {
        request.validate()?;

        let id = JournalId::new();
        let totals = request.totals();
        let lines = request
            .lines
            .into_iter()
            .enumerate()
            .map(|(i, line)| JournalLine {
                id: JournalLineId::new(),
                journal_id: id,
                line_number: i as i32 + 1,
                account_id: line.account_id,
                description: line.description,
                debit_amount: line.debit_amount,
                credit_amount: line.credit_amount,
            })
            .collect();

        Ok(Self {
            id,
            source_type: request.source_type,
            reference: request.reference,
            description: request.description,
            entry_date: request.entry_date,
            total_debit: totals.debit,
            total_credit: totals.credit,
            status: JournalStatus::Draft,
            lines,
            created_at: Utc::now(),
            posted_at: None,
            voided_at: None,
        })
    }

    /// Check debits equal credits.
    pub fn is_balanced(&self) -> bool {
        self.total_debit == self.total_credit
    }

    /// Move to a new status, stamping the transition time.
    pub fn transition_to(&mut self, next: JournalStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(LedgerError::InvalidJournalStatus {
                journal_id: self.id,
                status: self.status.as_str().to_string(),
                action: match next {
                    JournalStatus::Posted => "post",
                    JournalStatus::Void => "void",
                    JournalStatus::Draft => "redraft",
                },
            });
        }
        if next == JournalStatus::Posted && !self.is_balanced() {
            return Err(LedgerError::UnbalancedEntry {
                total_debit: self.total_debit,
                total_credit: self.total_credit,
            });
        }

        let now = Utc::now();
        match next {
            JournalStatus::Posted => self.posted_at = Some(now),
            JournalStatus::Void => self.voided_at = Some(now),
            JournalStatus::Draft => {}
        }
        self.status = next;
        Ok(())
    }
}

/// Requested journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJournalLine {
    pub account_id: AccountId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub debit_amount: Decimal,
    #[serde(default)]
    pub credit_amount: Decimal,
}

impl NewJournalLine {
    /// Debit line.
    pub fn debit(account_id: AccountId, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            account_id,
            description: description.into(),
            debit_amount: amount,
            credit_amount: Decimal::ZERO,
        }
    }

    /// Credit line.
    pub fn credit(account_id: AccountId, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            account_id,
            description: description.into(),
            debit_amount: Decimal::ZERO,
            credit_amount: amount,
        }
    }
}

/// Request to record a journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJournalEntry {
    pub source_type: SourceType,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub description: String,
    pub entry_date: NaiveDate,
    pub lines: Vec<NewJournalLine>,
}

impl NewJournalEntry {
    /// Sum of both sides.
    pub fn totals(&self) -> DebitCredit {
        self.lines
            .iter()
            .map(|l| DebitCredit::new(l.debit_amount, l.credit_amount))
            .fold(DebitCredit::default(), |acc, t| acc + t)
    }

    /// Check line shape and balance.
    pub fn validate(&self) -> Result<()> {
        if self.lines.len() < 2 {
            return Err(LedgerError::invalid_field(
                "journal entry needs at least two lines",
                "lines",
            ));
        }

        for (i, line) in self.lines.iter().enumerate() {
            let debit = line.debit_amount;
            let credit = line.credit_amount;
            let one_sided = (debit > Decimal::ZERO && credit.is_zero())
                || (credit > Decimal::ZERO && debit.is_zero());
            if !one_sided {
                return Err(LedgerError::invalid_field(
                    format!("line {} must have exactly one positive side", i + 1),
                    format!("lines[{i}]"),
                ));
            }
            if debit.normalize().scale() > MONEY_SCALE || credit.normalize().scale() > MONEY_SCALE {
                return Err(LedgerError::invalid_field(
                    format!("line {} has more than {MONEY_SCALE} decimal places", i + 1),
                    format!("lines[{i}]"),
                ));
            }
        }

        let totals = self.totals();
        if !totals.is_balanced() {
            return Err(LedgerError::UnbalancedEntry {
                total_debit: totals.debit,
                total_credit: totals.credit,
            });
        }
        Ok(())
    }
}

/// Filter for listing journal entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalFilter {
    pub status: Option<JournalStatus>,
    pub source_type: Option<SourceType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl JournalFilter {
    /// Default page size.
    pub const DEFAULT_LIMIT: u32 = 50;
    /// Largest page a single query returns.
    pub const MAX_LIMIT: u32 = 500;

    /// Check whether an entry passes the filter (pagination excluded).
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        self.status.map_or(true, |s| entry.status == s)
            && self.source_type.map_or(true, |s| entry.source_type == s)
            && self.start_date.map_or(true, |d| entry.entry_date >= d)
            && self.end_date.map_or(true, |d| entry.entry_date <= d)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}
