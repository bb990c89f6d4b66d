//! Payment repository

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::{InvoiceId, PaymentId};
use domain_billing::{Payment, PaymentFilter};

use super::{decode, money, student};
use crate::error::DatabaseError;

const SELECT_PAYMENT: &str = r#"
    SELECT id, student_id, invoice_id, amount, reference_number, method,
           payment_date, status, notes, created_at, updated_at
    FROM payments
"#;

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    student_id: String,
    invoice_id: Option<Uuid>,
    amount: Decimal,
    reference_number: String,
    method: String,
    payment_date: NaiveDate,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            student_id: student(row.student_id)?,
            invoice_id: row.invoice_id.map(InvoiceId::from_uuid),
            amount: money(row.amount),
            reference_number: row.reference_number,
            method: decode("payments.method", &row.method)?,
            payment_date: row.payment_date,
            status: decode("payments.status", &row.status)?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for payments
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentRepository;

impl PaymentRepository {
    /// Inserts a payment; a reused reference number is a `DuplicateEntry`
    pub async fn insert(conn: &mut PgConnection, payment: &Payment) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, student_id, invoice_id, amount, reference_number, method,
                payment_date, status, notes, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(*payment.id.as_uuid())
        .bind(payment.student_id.as_str())
        .bind(payment.invoice_id.map(Uuid::from))
        .bind(payment.amount.amount())
        .bind(&payment.reference_number)
        .bind(payment.method.as_str())
        .bind(payment.payment_date)
        .bind(payment.status.as_str())
        .bind(&payment.notes)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn update(conn: &mut PgConnection, payment: &Payment) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, notes = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(*payment.id.as_uuid())
        .bind(payment.status.as_str())
        .bind(&payment.notes)
        .bind(payment.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Payment", payment.id));
        }
        Ok(())
    }

    pub async fn get(conn: &mut PgConnection, id: PaymentId) -> Result<Option<Payment>, DatabaseError> {
        let sql = format!("{SELECT_PAYMENT} WHERE id = $1");
        sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?
            .map(Payment::try_from)
            .transpose()
    }

    pub async fn get_by_reference(
        conn: &mut PgConnection,
        reference_number: &str,
    ) -> Result<Option<Payment>, DatabaseError> {
        let sql = format!("{SELECT_PAYMENT} WHERE reference_number = $1");
        sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(reference_number)
            .fetch_optional(&mut *conn)
            .await?
            .map(Payment::try_from)
            .transpose()
    }

    /// Lists payments matching the filter by payment date
    pub async fn list(conn: &mut PgConnection, filter: &PaymentFilter) -> Result<Vec<Payment>, DatabaseError> {
        let mut query = QueryBuilder::<Postgres>::new(SELECT_PAYMENT);
        query.push(" WHERE TRUE");

        if let Some(student_id) = &filter.student_id {
            query.push(" AND student_id = ").push_bind(student_id.as_str().to_owned());
        }
        if let Some(range) = filter.between {
            query.push(" AND payment_date BETWEEN ").push_bind(range.from);
            query.push(" AND ").push_bind(range.to);
        }
        query.push(" ORDER BY payment_date, created_at, id");

        query
            .build_query_as::<PaymentRow>()
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(Payment::try_from)
            .collect()
    }
}
