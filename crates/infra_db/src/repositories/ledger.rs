//! Ledger repository
//!
//! Entries are append-only. Each student has one `ledger_heads` row holding
//! the last sequence and balance; reading it takes a row lock that is held
//! until the surrounding transaction ends, so appends for one student are
//! serialized while different students proceed in parallel.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::{LedgerEntryId, StudentId};
use domain_billing::{LedgerHead, LedgerQuery, StatementEntry};

use super::{decode, money, period, student};
use crate::error::DatabaseError;

#[derive(Debug, FromRow)]
struct LedgerHeadRow {
    student_id: String,
    last_sequence: i64,
    balance: Decimal,
}

#[derive(Debug, FromRow)]
struct LedgerEntryRow {
    id: Uuid,
    student_id: String,
    sequence: i64,
    transaction_type: String,
    reference_type: String,
    reference_id: Uuid,
    description: String,
    debit_amount: Decimal,
    credit_amount: Decimal,
    running_balance: Decimal,
    transaction_date: NaiveDate,
    term: String,
    academic_year: String,
    recorded_by: String,
    recorded_at: DateTime<Utc>,
}

impl LedgerEntryRow {
    fn into_domain(self) -> Result<StatementEntry, DatabaseError> {
        Ok(StatementEntry {
            id: LedgerEntryId::from_uuid(self.id),
            student_id: student(self.student_id)?,
            sequence: self.sequence,
            transaction_type: decode("ledger_entries.transaction_type", &self.transaction_type)?,
            reference_type: decode("ledger_entries.reference_type", &self.reference_type)?,
            reference_id: self.reference_id,
            description: self.description,
            debit_amount: money(self.debit_amount),
            credit_amount: money(self.credit_amount),
            running_balance: money(self.running_balance),
            transaction_date: self.transaction_date,
            period: period(self.term, self.academic_year)?,
            recorded_by: self.recorded_by,
            recorded_at: self.recorded_at,
        })
    }
}

/// Repository for ledger entries and per-student ledger heads
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerRepository;

impl LedgerRepository {
    /// Reads the student's head, creating an empty one on first use, and
    /// locks it `FOR UPDATE`
    pub async fn lock_head(conn: &mut PgConnection, student_id: &StudentId) -> Result<LedgerHead, DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_heads (student_id, last_sequence, balance)
            VALUES ($1, 0, 0)
            ON CONFLICT (student_id) DO NOTHING
            "#,
        )
        .bind(student_id.as_str())
        .execute(&mut *conn)
        .await?;

        let row = sqlx::query_as::<_, LedgerHeadRow>(
            r#"
            SELECT student_id, last_sequence, balance
            FROM ledger_heads
            WHERE student_id = $1
            FOR UPDATE
            "#,
        )
        .bind(student_id.as_str())
        .fetch_one(&mut *conn)
        .await?;

        Ok(LedgerHead {
            student_id: student(row.student_id)?,
            last_sequence: row.last_sequence,
            balance: money(row.balance),
        })
    }

    /// Appends an entry and advances the head past it
    ///
    /// The head only moves if it still points at the entry's predecessor; a
    /// head that moved underneath this transaction is reported as a
    /// `DuplicateEntry` so the store surfaces it as a conflict.
    pub async fn insert_entry(conn: &mut PgConnection, entry: &StatementEntry) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                id, student_id, sequence, transaction_type, reference_type, reference_id,
                description, debit_amount, credit_amount, running_balance, transaction_date,
                term, academic_year, recorded_by, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(*entry.id.as_uuid())
        .bind(entry.student_id.as_str())
        .bind(entry.sequence)
        .bind(entry.transaction_type.as_str())
        .bind(entry.reference_type.as_str())
        .bind(entry.reference_id)
        .bind(&entry.description)
        .bind(entry.debit_amount.amount())
        .bind(entry.credit_amount.amount())
        .bind(entry.running_balance.amount())
        .bind(entry.transaction_date)
        .bind(&entry.period.term)
        .bind(&entry.period.academic_year)
        .bind(&entry.recorded_by)
        .bind(entry.recorded_at)
        .execute(&mut *conn)
        .await?;

        let moved = sqlx::query(
            r#"
            UPDATE ledger_heads
            SET last_sequence = $2, balance = $3
            WHERE student_id = $1 AND last_sequence = $2 - 1
            "#,
        )
        .bind(entry.student_id.as_str())
        .bind(entry.sequence)
        .bind(entry.running_balance.amount())
        .execute(&mut *conn)
        .await?;

        if moved.rows_affected() == 0 {
            return Err(DatabaseError::DuplicateEntry(format!(
                "ledger head for {} is not at sequence {}",
                entry.student_id,
                entry.sequence - 1
            )));
        }
        Ok(())
    }

    /// Lists a student's entries in sequence order
    pub async fn list(
        conn: &mut PgConnection,
        student_id: &StudentId,
        query: &LedgerQuery,
    ) -> Result<Vec<StatementEntry>, DatabaseError> {
        let mut sql = QueryBuilder::<Postgres>::new(
            r#"
            SELECT id, student_id, sequence, transaction_type, reference_type, reference_id,
                   description, debit_amount, credit_amount, running_balance, transaction_date,
                   term, academic_year, recorded_by, recorded_at
            FROM ledger_entries
            WHERE student_id = "#,
        );
        sql.push_bind(student_id.as_str().to_owned());

        match query {
            LedgerQuery::All => {}
            LedgerQuery::Period(period) => {
                sql.push(" AND term = ").push_bind(period.term.clone());
                sql.push(" AND academic_year = ").push_bind(period.academic_year.clone());
            }
            LedgerQuery::Between(range) => {
                sql.push(" AND transaction_date BETWEEN ").push_bind(range.from);
                sql.push(" AND ").push_bind(range.to);
            }
            LedgerQuery::TaxYear(year) => {
                sql.push(" AND EXTRACT(YEAR FROM transaction_date)::INTEGER = ").push_bind(*year);
                sql.push(" AND academic_year LIKE ").push_bind(format!("{year}%"));
            }
        }
        sql.push(" ORDER BY sequence");

        sql.build_query_as::<LedgerEntryRow>()
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(LedgerEntryRow::into_domain)
            .collect()
    }
}
