//! Refund repository

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use core_kernel::{RefundId, StudentId};
use domain_billing::Refund;

use super::{decode, money, student};
use crate::error::DatabaseError;

const SELECT_REFUND: &str = r#"
    SELECT id, student_id, amount, reason, refund_type, status, holding_semester,
           approved_by, approved_at, processed_by, processed_at, bank_reference,
           closed_reason, created_at, updated_at
    FROM refunds
"#;

#[derive(Debug, FromRow)]
struct RefundRow {
    id: Uuid,
    student_id: String,
    amount: Decimal,
    reason: String,
    refund_type: String,
    status: String,
    holding_semester: Option<String>,
    approved_by: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    processed_by: Option<String>,
    processed_at: Option<DateTime<Utc>>,
    bank_reference: Option<String>,
    closed_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RefundRow> for Refund {
    type Error = DatabaseError;

    fn try_from(row: RefundRow) -> Result<Self, Self::Error> {
        Ok(Refund {
            id: RefundId::from_uuid(row.id),
            student_id: student(row.student_id)?,
            amount: money(row.amount),
            reason: row.reason,
            refund_type: decode("refunds.refund_type", &row.refund_type)?,
            status: decode("refunds.status", &row.status)?,
            holding_semester: row.holding_semester,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            processed_by: row.processed_by,
            processed_at: row.processed_at,
            bank_reference: row.bank_reference,
            closed_reason: row.closed_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for refunds
#[derive(Debug, Clone, Copy, Default)]
pub struct RefundRepository;

impl RefundRepository {
    pub async fn insert(conn: &mut PgConnection, refund: &Refund) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO refunds (
                id, student_id, amount, reason, refund_type, status, holding_semester,
                approved_by, approved_at, processed_by, processed_at, bank_reference,
                closed_reason, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(*refund.id.as_uuid())
        .bind(refund.student_id.as_str())
        .bind(refund.amount.amount())
        .bind(&refund.reason)
        .bind(refund.refund_type.as_str())
        .bind(refund.status.as_str())
        .bind(&refund.holding_semester)
        .bind(&refund.approved_by)
        .bind(refund.approved_at)
        .bind(&refund.processed_by)
        .bind(refund.processed_at)
        .bind(&refund.bank_reference)
        .bind(&refund.closed_reason)
        .bind(refund.created_at)
        .bind(refund.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Writes the workflow columns
    pub async fn update(conn: &mut PgConnection, refund: &Refund) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE refunds
            SET status = $2, holding_semester = $3, approved_by = $4, approved_at = $5,
                processed_by = $6, processed_at = $7, bank_reference = $8,
                closed_reason = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(*refund.id.as_uuid())
        .bind(refund.status.as_str())
        .bind(&refund.holding_semester)
        .bind(&refund.approved_by)
        .bind(refund.approved_at)
        .bind(&refund.processed_by)
        .bind(refund.processed_at)
        .bind(&refund.bank_reference)
        .bind(&refund.closed_reason)
        .bind(refund.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Refund", refund.id));
        }
        Ok(())
    }

    pub async fn get(conn: &mut PgConnection, id: RefundId) -> Result<Option<Refund>, DatabaseError> {
        let sql = format!("{SELECT_REFUND} WHERE id = $1");
        sqlx::query_as::<_, RefundRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?
            .map(Refund::try_from)
            .transpose()
    }

    /// Lists a student's refunds in request order
    pub async fn list_for_student(conn: &mut PgConnection, student_id: &StudentId) -> Result<Vec<Refund>, DatabaseError> {
        let sql = format!("{SELECT_REFUND} WHERE student_id = $1 ORDER BY created_at, id");
        sqlx::query_as::<_, RefundRow>(&sql)
            .bind(student_id.as_str())
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(Refund::try_from)
            .collect()
    }
}
