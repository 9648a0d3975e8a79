//! PostgreSQL ledger store.
//!
//! Tables: `accounts`, `unified_journal_ledger`, `unified_journal_lines`,
//! `accounting_periods`. Schema lives in `ledger/migrations`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use closebook_common::{
    AccountId, AccountingPeriod, DebitCredit, JournalId, JournalLineId, LedgerError, PeriodId,
    Result,
};

use super::{LedgerStore, LedgerTx};
use crate::account::{Account, AccountType};
use crate::balance::Cutoff;
use crate::journal::{JournalEntry, JournalFilter, JournalLine, JournalStatus, SourceType};

/// Advisory lock key shared by every ledger-mutating transaction.
const LEDGER_LOCK_KEY: i64 = 0x636c_6f73_6562_6f6f;

fn db(err: sqlx::Error) -> LedgerError {
    LedgerError::DatabaseError(err.to_string())
}

/// Store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool of at most `max_connections`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(db)?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        info!("Migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> Result<PgLedgerTx> {
        let tx = self.pool.begin().await.map_err(db)?;
        Ok(PgLedgerTx { tx })
    }
}

/// Transaction over [`PgStore`]. Rolled back on drop unless committed.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    code: String,
    name: String,
    account_type: String,
    parent_id: Option<Uuid>,
    is_header: bool,
    is_active: bool,
    balance: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<AccountRow> for Account {
    type Error = LedgerError;

    fn try_from(row: AccountRow) -> Result<Self> {
        Ok(Account {
            id: AccountId::from_uuid(row.id),
            code: row.code,
            name: row.name,
            account_type: AccountType::parse(&row.account_type)
                .map_err(|e| LedgerError::DatabaseError(e.to_string()))?,
            parent_id: row.parent_id.map(AccountId::from_uuid),
            is_header: row.is_header,
            is_active: row.is_active,
            balance: row.balance,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct EntryRow {
    id: Uuid,
    source_type: String,
    reference: Option<String>,
    description: String,
    entry_date: NaiveDate,
    total_debit: Decimal,
    total_credit: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    posted_at: Option<DateTime<Utc>>,
    voided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct LineRow {
    id: Uuid,
    journal_id: Uuid,
    line_number: i32,
    account_id: Uuid,
    description: String,
    debit_amount: Decimal,
    credit_amount: Decimal,
}

impl From<LineRow> for JournalLine {
    fn from(row: LineRow) -> Self {
        JournalLine {
            id: JournalLineId::from_uuid(row.id),
            journal_id: JournalId::from_uuid(row.journal_id),
            line_number: row.line_number,
            account_id: AccountId::from_uuid(row.account_id),
            description: row.description,
            debit_amount: row.debit_amount,
            credit_amount: row.credit_amount,
        }
    }
}

fn entry_from_row(row: EntryRow, lines: Vec<JournalLine>) -> Result<JournalEntry> {
    let corrupt = |e: LedgerError| LedgerError::DatabaseError(e.to_string());
    Ok(JournalEntry {
        id: JournalId::from_uuid(row.id),
        source_type: SourceType::parse(&row.source_type).map_err(corrupt)?,
        reference: row.reference,
        description: row.description,
        entry_date: row.entry_date,
        total_debit: row.total_debit,
        total_credit: row.total_credit,
        status: JournalStatus::parse(&row.status).map_err(corrupt)?,
        lines,
        created_at: row.created_at,
        posted_at: row.posted_at,
        voided_at: row.voided_at,
    })
}

#[derive(Debug, FromRow)]
struct PeriodRow {
    id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    description: String,
    is_closed: bool,
    is_locked: bool,
    closed_at: Option<DateTime<Utc>>,
    locked_at: Option<DateTime<Utc>>,
    total_revenue: Decimal,
    total_expense: Decimal,
    net_income: Decimal,
    closing_journal_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PeriodRow> for AccountingPeriod {
    fn from(row: PeriodRow) -> Self {
        AccountingPeriod {
            id: PeriodId::from_uuid(row.id),
            start_date: row.start_date,
            end_date: row.end_date,
            description: row.description,
            is_closed: row.is_closed,
            is_locked: row.is_locked,
            closed_at: row.closed_at,
            locked_at: row.locked_at,
            total_revenue: row.total_revenue,
            total_expense: row.total_expense,
            net_income: row.net_income,
            closing_journal_id: row.closing_journal_id.map(JournalId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ACCOUNT_COLUMNS: &str = "id, code, name, account_type, parent_id, is_header, is_active, \
     balance, created_at, updated_at, deleted_at";

const ENTRY_COLUMNS: &str = "id, source_type, reference, description, entry_date, total_debit, \
     total_credit, status, created_at, posted_at, voided_at";

const PERIOD_COLUMNS: &str = "id, start_date, end_date, description, is_closed, is_locked, \
     closed_at, locked_at, total_revenue, total_expense, net_income, closing_journal_id, \
     created_at, updated_at";

impl PgLedgerTx {
    async fn hydrate(&mut self, rows: Vec<EntryRow>) -> Result<Vec<JournalEntry>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let line_rows = sqlx::query_as::<_, LineRow>(
            r#"
            SELECT id, journal_id, line_number, account_id, description, debit_amount, credit_amount
            FROM unified_journal_lines
            WHERE journal_id = ANY($1)
            ORDER BY journal_id, line_number
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;

        let mut lines: HashMap<Uuid, Vec<JournalLine>> = HashMap::new();
        for row in line_rows {
            lines.entry(row.journal_id).or_default().push(row.into());
        }

        rows.into_iter()
            .map(|row| {
                let entry_lines = lines.remove(&row.id).unwrap_or_default();
                entry_from_row(row, entry_lines)
            })
            .collect()
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_ledger(&mut self) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(LEDGER_LOCK_KEY)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        debug!("Ledger advisory lock acquired");
        Ok(())
    }

    async fn insert_account(&mut self, account: &Account) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts
                (id, code, name, account_type, parent_id, is_header, is_active,
                 balance, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(account.parent_id.map(|p| *p.as_uuid()))
        .bind(account.is_header)
        .bind(account.is_active)
        .bind(account.balance)
        .bind(account.created_at)
        .bind(account.updated_at)
        .bind(account.deleted_at)
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(LedgerError::DuplicateAccountCode(account.code.clone()))
            }
            Err(e) => Err(db(e)),
        }
    }

    async fn update_account(&mut self, account: &Account) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET name = $2, parent_id = $3, is_active = $4, updated_at = $5, deleted_at = $6
            WHERE id = $1
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.name)
        .bind(account.parent_id.map(|p| *p.as_uuid()))
        .bind(account.is_active)
        .bind(account.updated_at)
        .bind(account.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::AccountNotFound(account.id.to_string()));
        }
        Ok(())
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.map(Account::try_from).transpose()
    }

    async fn find_account_by_code(&mut self, code: &str) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE code = $1 AND deleted_at IS NULL"
        ))
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.map(Account::try_from).transpose()
    }

    async fn list_accounts(&mut self, include_deleted: bool) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE $1 OR deleted_at IS NULL \
             ORDER BY code, created_at"
        ))
        .bind(include_deleted)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        rows.into_iter().map(Account::try_from).collect()
    }

    async fn set_balances(&mut self, balances: &[(AccountId, Decimal)]) -> Result<()> {
        for (id, balance) in balances {
            sqlx::query("UPDATE accounts SET balance = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_uuid())
                .bind(*balance)
                .execute(&mut *self.tx)
                .await
                .map_err(db)?;
        }
        Ok(())
    }

    async fn line_totals(&mut self, cutoff: Cutoff) -> Result<HashMap<AccountId, DebitCredit>> {
        let (start, end) = cutoff.bounds();
        let rows: Vec<(Uuid, Decimal, Decimal)> = sqlx::query_as(
            r#"
            SELECT l.account_id,
                   COALESCE(SUM(l.debit_amount), 0)  AS debit,
                   COALESCE(SUM(l.credit_amount), 0) AS credit
            FROM unified_journal_lines l
            JOIN unified_journal_ledger j ON j.id = l.journal_id
            WHERE j.status = 'POSTED'
              AND ($1 OR j.source_type <> 'CLOSING')
              AND ($2::date IS NULL OR j.entry_date >= $2)
              AND ($3::date IS NULL OR j.entry_date <= $3)
            GROUP BY l.account_id
            "#,
        )
        .bind(cutoff.includes_closing())
        .bind(start)
        .bind(end)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(rows
            .into_iter()
            .map(|(id, debit, credit)| (AccountId::from_uuid(id), DebitCredit::new(debit, credit)))
            .collect())
    }

    async fn insert_entry(&mut self, entry: &JournalEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO unified_journal_ledger
                (id, source_type, reference, description, entry_date, total_debit,
                 total_credit, status, created_at, posted_at, voided_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.source_type.as_str())
        .bind(&entry.reference)
        .bind(&entry.description)
        .bind(entry.entry_date)
        .bind(entry.total_debit)
        .bind(entry.total_credit)
        .bind(entry.status.as_str())
        .bind(entry.created_at)
        .bind(entry.posted_at)
        .bind(entry.voided_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        for line in &entry.lines {
            sqlx::query(
                r#"
                INSERT INTO unified_journal_lines
                    (id, journal_id, line_number, account_id, description, debit_amount, credit_amount)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(line.id.as_uuid())
            .bind(entry.id.as_uuid())
            .bind(line.line_number)
            .bind(line.account_id.as_uuid())
            .bind(&line.description)
            .bind(line.debit_amount)
            .bind(line.credit_amount)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        }
        Ok(())
    }

    async fn update_entry_status(&mut self, entry: &JournalEntry) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE unified_journal_ledger
            SET status = $2, posted_at = $3, voided_at = $4
            WHERE id = $1
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.status.as_str())
        .bind(entry.posted_at)
        .bind(entry.voided_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::JournalNotFound(entry.id));
        }
        Ok(())
    }

    async fn get_entry(&mut self, id: JournalId) -> Result<Option<JournalEntry>> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM unified_journal_ledger WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_entries(&mut self, filter: &JournalFilter) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM unified_journal_ledger \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR source_type = $2) \
               AND ($3::date IS NULL OR entry_date >= $3) \
               AND ($4::date IS NULL OR entry_date <= $4) \
             ORDER BY entry_date DESC, created_at DESC, id DESC \
             LIMIT $5 OFFSET $6"
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.source_type.map(|s| s.as_str()))
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(i64::from(filter.limit()))
        .bind(i64::from(filter.offset()))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;

        self.hydrate(rows).await
    }

    async fn save_period(&mut self, period: &AccountingPeriod) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounting_periods
                (id, start_date, end_date, description, is_closed, is_locked, closed_at,
                 locked_at, total_revenue, total_expense, net_income, closing_journal_id,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                description = EXCLUDED.description,
                is_closed = EXCLUDED.is_closed,
                is_locked = EXCLUDED.is_locked,
                closed_at = EXCLUDED.closed_at,
                locked_at = EXCLUDED.locked_at,
                total_revenue = EXCLUDED.total_revenue,
                total_expense = EXCLUDED.total_expense,
                net_income = EXCLUDED.net_income,
                closing_journal_id = EXCLUDED.closing_journal_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(period.id.as_uuid())
        .bind(period.start_date)
        .bind(period.end_date)
        .bind(&period.description)
        .bind(period.is_closed)
        .bind(period.is_locked)
        .bind(period.closed_at)
        .bind(period.locked_at)
        .bind(period.total_revenue)
        .bind(period.total_expense)
        .bind(period.net_income)
        .bind(period.closing_journal_id.map(|j| *j.as_uuid()))
        .bind(period.created_at)
        .bind(period.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn get_period(&mut self, id: PeriodId) -> Result<Option<AccountingPeriod>> {
        let row = sqlx::query_as::<_, PeriodRow>(&format!(
            "SELECT {PERIOD_COLUMNS} FROM accounting_periods WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(row.map(Into::into))
    }

    async fn find_period_by_range(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<AccountingPeriod>> {
        let row = sqlx::query_as::<_, PeriodRow>(&format!(
            "SELECT {PERIOD_COLUMNS} FROM accounting_periods WHERE start_date = $1 AND end_date = $2"
        ))
        .bind(start)
        .bind(end)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(row.map(Into::into))
    }

    async fn closed_period_for_date(&mut self, date: NaiveDate) -> Result<Option<AccountingPeriod>> {
        let row = sqlx::query_as::<_, PeriodRow>(&format!(
            "SELECT {PERIOD_COLUMNS} FROM accounting_periods \
             WHERE is_closed AND $1 BETWEEN start_date AND end_date \
             ORDER BY end_date DESC LIMIT 1"
        ))
        .bind(date)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(row.map(Into::into))
    }

    async fn list_periods(&mut self) -> Result<Vec<AccountingPeriod>> {
        let rows = sqlx::query_as::<_, PeriodRow>(&format!(
            "SELECT {PERIOD_COLUMNS} FROM accounting_periods ORDER BY end_date DESC"
        ))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(db)
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(db)
    }
}
