//! Closebook Ledger
//!
//! Chart of accounts, double-entry journal and cached account balances.
//! Every read and write goes through a [`store::LedgerTx`] so the period
//! closing routine can compose ledger operations inside one transaction.

pub mod account;
pub mod journal;
pub mod balance;
pub mod report;
pub mod store;
pub mod engine;

pub use account::{Account, AccountType, NewAccount, NormalSide, DEFAULT_CHART, RETAINED_EARNINGS_CODE};
pub use balance::{normal_balance, AccountBalance, Cutoff};
pub use engine::{BalanceChange, LedgerEngine, RecomputeSummary};
pub use journal::{
    JournalEntry, JournalFilter, JournalLine, JournalStatus, NewJournalEntry, NewJournalLine, SourceType,
};
pub use report::{AccountingEquation, IncomeStatement, ReconciliationReport, TrialBalance};
pub use store::{LedgerStore, LedgerTx, MemoryStore, PgStore};
