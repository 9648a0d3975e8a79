//! Chart-of-accounts definitions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use closebook_common::{AccountId, LedgerError, Result};

/// Side of the ledger an account grows on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NormalSide {
    Debit,
    Credit,
}

/// Account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    /// Side on which the account's balance is positive.
    pub fn normal_side(&self) -> NormalSide {
        match self {
            AccountType::Asset | AccountType::Expense => NormalSide::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                NormalSide::Credit
            }
        }
    }

    /// Temporary accounts are zeroed into retained earnings at period end.
    pub fn is_temporary(&self) -> bool {
        matches!(self, AccountType::Revenue | AccountType::Expense)
    }

    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "ASSET",
            AccountType::Liability => "LIABILITY",
            AccountType::Equity => "EQUITY",
            AccountType::Revenue => "REVENUE",
            AccountType::Expense => "EXPENSE",
        }
    }

    /// Parse from the stored representation (case-insensitive).
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASSET" => Ok(AccountType::Asset),
            "LIABILITY" => Ok(AccountType::Liability),
            "EQUITY" => Ok(AccountType::Equity),
            "REVENUE" => Ok(AccountType::Revenue),
            "EXPENSE" => Ok(AccountType::Expense),
            other => Err(LedgerError::invalid_field(
                format!(
                    "unknown account type {other:?}; expected one of ASSET, LIABILITY, EQUITY, REVENUE, EXPENSE"
                ),
                "account_type",
            )),
        }
    }
}

/// A chart-of-accounts entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier.
    pub id: AccountId,
    /// Account code, unique among live accounts.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Classification.
    pub account_type: AccountType,
    /// Rollup parent.
    pub parent_id: Option<AccountId>,
    /// Header accounts only aggregate children and never take journal lines.
    pub is_header: bool,
    pub is_active: bool,
    /// Cached balance, maintained by the balance writer.
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Create a new active account with a zero balance.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
        parent_id: Option<AccountId>,
        is_header: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            code: code.into(),
            name: name.into(),
            account_type,
            parent_id,
            is_header,
            is_active: true,
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Check if the account is not soft-deleted.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Check that the account can receive journal lines.
    pub fn ensure_postable(&self) -> Result<()> {
        let reason = if !self.is_live() {
            "account is deleted"
        } else if self.is_header {
            "header accounts only aggregate children"
        } else if !self.is_active {
            "account is inactive"
        } else {
            return Ok(());
        };

        Err(LedgerError::AccountNotPostable {
            code: self.code.clone(),
            reason: reason.to_string(),
        })
    }

    /// Soft-delete the account.
    pub fn soft_delete(&mut self) {
        let now = Utc::now();
        self.deleted_at = Some(now);
        self.is_active = false;
        self.updated_at = now;
    }
}

/// Request to add an account to the chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    /// Code of the parent account, if any.
    #[serde(default)]
    pub parent_code: Option<String>,
    #[serde(default)]
    pub is_header: bool,
}

impl NewAccount {
    /// Validate field contents.
    pub fn validate(&self) -> Result<()> {
        let code = self.code.trim();
        if code.is_empty() || code.len() > 32 {
            return Err(LedgerError::invalid_field(
                "code must be 1-32 characters",
                "code",
            ));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.') {
            return Err(LedgerError::invalid_field(
                "code may only contain letters, digits, '-' and '.'",
                "code",
            ));
        }
        if self.name.trim().is_empty() {
            return Err(LedgerError::invalid_field("name is required", "name"));
        }
        Ok(())
    }
}

/// One row of the default chart of accounts.
#[derive(Debug, Clone, Copy)]
pub struct ChartEntry {
    pub code: &'static str,
    pub name: &'static str,
    pub account_type: AccountType,
    pub parent_code: Option<&'static str>,
    pub is_header: bool,
}

const fn entry(
    code: &'static str,
    name: &'static str,
    account_type: AccountType,
    parent_code: Option<&'static str>,
    is_header: bool,
) -> ChartEntry {
    ChartEntry {
        code,
        name,
        account_type,
        parent_code,
        is_header,
    }
}

/// Default retained earnings account code.
pub const RETAINED_EARNINGS_CODE: &str = "3201";

/// Default chart of accounts, parents listed before children.
pub const DEFAULT_CHART: &[ChartEntry] = &[
    entry("1000", "Assets", AccountType::Asset, None, true),
    entry("1100", "Current Assets", AccountType::Asset, Some("1000"), true),
    entry("1101", "Cash", AccountType::Asset, Some("1100"), false),
    entry("1102", "Bank", AccountType::Asset, Some("1100"), false),
    entry("1200", "Accounts Receivable", AccountType::Asset, Some("1100"), true),
    entry("1201", "Trade Receivables", AccountType::Asset, Some("1200"), false),
    entry("1240", "VAT Input", AccountType::Asset, Some("1100"), false),
    entry("1301", "Merchandise Inventory", AccountType::Asset, Some("1100"), false),
    entry("1500", "Fixed Assets", AccountType::Asset, Some("1000"), true),
    entry("1501", "Office Equipment", AccountType::Asset, Some("1500"), false),
    entry("1502", "Vehicles", AccountType::Asset, Some("1500"), false),
    entry("1503", "Buildings", AccountType::Asset, Some("1500"), false),
    entry("2000", "Liabilities", AccountType::Liability, None, true),
    entry("2100", "Current Liabilities", AccountType::Liability, Some("2000"), true),
    entry("2101", "Trade Payables", AccountType::Liability, Some("2100"), false),
    entry("2103", "VAT Output", AccountType::Liability, Some("2100"), false),
    entry("3000", "Equity", AccountType::Equity, None, true),
    entry("3101", "Owner Capital", AccountType::Equity, Some("3000"), false),
    entry(RETAINED_EARNINGS_CODE, "Retained Earnings", AccountType::Equity, Some("3000"), false),
    entry("4000", "Revenue", AccountType::Revenue, None, true),
    entry("4101", "Sales Revenue", AccountType::Revenue, Some("4000"), false),
    entry("4201", "Other Operating Revenue", AccountType::Revenue, Some("4000"), false),
    entry("4900", "Other Income", AccountType::Revenue, Some("4000"), false),
    entry("5000", "Expenses", AccountType::Expense, None, true),
    entry("5101", "Cost of Goods Sold", AccountType::Expense, Some("5000"), false),
    entry("5201", "Salary Expense", AccountType::Expense, Some("5000"), false),
    entry("5202", "Electricity Expense", AccountType::Expense, Some("5000"), false),
    entry("5203", "Telephone Expense", AccountType::Expense, Some("5000"), false),
    entry("5204", "Transportation Expense", AccountType::Expense, Some("5000"), false),
    entry("5900", "General Expense", AccountType::Expense, Some("5000"), false),
];
