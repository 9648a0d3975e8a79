use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use closebook_common::{parse_date, AccountId, DateRange, LedgerError, PeriodStatus, Result};
use closebook_ledger::{
    Cutoff, JournalFilter, JournalStatus, NewJournalEntry, NewJournalLine, SourceType,
};

use crate::service::PeriodFilter;

/// `{"success": true, "data": ...}`
pub fn success<T: Serialize>(status: StatusCode, data: T) -> axum::response::Response {
    (status, axum::Json(json!({ "success": true, "data": data }))).into_response()
}

fn parse_opt_date(value: Option<&str>, field: &str) -> Result<Option<NaiveDate>> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_date(v, field).map(Some),
        _ => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteClosingRequest {
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: String,
    pub end_date: String,
}

/// Parse a start/end pair of `YYYY-MM-DD` strings.
pub fn date_range(start: &str, end: &str) -> Result<(NaiveDate, NaiveDate)> {
    let start = parse_date(start, "start_date")?;
    let end = parse_date(end, "end_date")?;
    let range = DateRange::new(start, end)?;
    Ok((range.start, range.end))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PeriodListQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl PeriodListQuery {
    pub fn to_filter(&self) -> Result<PeriodFilter> {
        let status = match self.status.as_deref() {
            Some(s) if !s.trim().is_empty() => Some(PeriodStatus::parse(s.trim()).ok_or_else(|| {
                LedgerError::invalid_field("status must be OPEN, CLOSED or LOCKED", "status")
            })?),
            _ => None,
        };
        Ok(PeriodFilter {
            status,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckDateQuery {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct ReopenRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountListQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct JournalLineRequest {
    pub account_id: AccountId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub debit_amount: Decimal,
    #[serde(default)]
    pub credit_amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateJournalRequest {
    pub source_type: Option<String>,
    pub reference: Option<String>,
    #[serde(default)]
    pub description: String,
    pub entry_date: String,
    pub lines: Vec<JournalLineRequest>,
    /// Post immediately instead of leaving a draft.
    #[serde(default)]
    pub auto_post: bool,
}

impl CreateJournalRequest {
    pub fn to_entry(self) -> Result<NewJournalEntry> {
        let source_type = match self.source_type.as_deref() {
            Some(s) => SourceType::parse(s)?,
            None => SourceType::Manual,
        };
        Ok(NewJournalEntry {
            source_type,
            reference: self.reference.filter(|r| !r.trim().is_empty()),
            description: self.description,
            entry_date: parse_date(&self.entry_date, "entry_date")?,
            lines: self
                .lines
                .into_iter()
                .map(|l| NewJournalLine {
                    account_id: l.account_id,
                    description: l.description,
                    debit_amount: l.debit_amount,
                    credit_amount: l.credit_amount,
                })
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct JournalListQuery {
    pub status: Option<String>,
    pub source_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl JournalListQuery {
    pub fn to_filter(&self) -> Result<JournalFilter> {
        Ok(JournalFilter {
            status: self.status.as_deref().map(JournalStatus::parse).transpose()?,
            source_type: self.source_type.as_deref().map(SourceType::parse).transpose()?,
            start_date: parse_opt_date(self.start_date.as_deref(), "start_date")?,
            end_date: parse_opt_date(self.end_date.as_deref(), "end_date")?,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TrialBalanceQuery {
    pub as_of: Option<String>,
}

impl TrialBalanceQuery {
    /// Requested date, today when absent.
    pub fn as_of(&self, today: NaiveDate) -> Result<NaiveDate> {
        Ok(parse_opt_date(self.as_of.as_deref(), "as_of")?.unwrap_or(today))
    }
}

#[derive(Debug, Deserialize)]
pub struct BalancesQuery {
    pub as_of: Option<String>,
    #[serde(default)]
    pub exclude_closing: bool,
}

impl BalancesQuery {
    pub fn to_cutoff(&self) -> Result<Cutoff> {
        match (parse_opt_date(self.as_of.as_deref(), "as_of")?, self.exclude_closing) {
            (None, false) => Ok(Cutoff::AllTime),
            (None, true) => Ok(Cutoff::ExcludingClosing),
            (Some(date), false) => Ok(Cutoff::AsOf { date }),
            (Some(_), true) => Err(LedgerError::invalid_field(
                "exclude_closing cannot be combined with as_of",
                "exclude_closing",
            )),
        }
    }
}

/// Response body of `GET /periods/check-date`.
#[derive(Debug, Serialize)]
pub struct CheckDateResponse {
    pub date: NaiveDate,
    pub is_closed: bool,
    pub period: Option<closebook_common::AccountingPeriod>,
}
