//! Financial aid repository

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::{FinancialAidId, InvoiceId};
use domain_billing::{AidFilter, FinancialAid};

use super::{decode, money, period, student};
use crate::error::DatabaseError;

const SELECT_AID: &str = r#"
    SELECT id, student_id, aid_type, amount, term, academic_year, min_gpa_required,
           max_aid_cap, is_refundable, status, applied_to_invoice_id, applied_at,
           revoked_reason, created_at, updated_at
    FROM financial_aid
"#;

#[derive(Debug, FromRow)]
struct FinancialAidRow {
    id: Uuid,
    student_id: String,
    aid_type: String,
    amount: Decimal,
    term: String,
    academic_year: String,
    min_gpa_required: Option<Decimal>,
    max_aid_cap: Option<Decimal>,
    is_refundable: bool,
    status: String,
    applied_to_invoice_id: Option<Uuid>,
    applied_at: Option<DateTime<Utc>>,
    revoked_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FinancialAidRow> for FinancialAid {
    type Error = DatabaseError;

    fn try_from(row: FinancialAidRow) -> Result<Self, Self::Error> {
        Ok(FinancialAid {
            id: FinancialAidId::from_uuid(row.id),
            student_id: student(row.student_id)?,
            aid_type: decode("financial_aid.aid_type", &row.aid_type)?,
            amount: money(row.amount),
            period: period(row.term, row.academic_year)?,
            min_gpa_required: row.min_gpa_required,
            max_aid_cap: row.max_aid_cap.map(money),
            is_refundable: row.is_refundable,
            status: decode("financial_aid.status", &row.status)?,
            applied_to_invoice_id: row.applied_to_invoice_id.map(InvoiceId::from_uuid),
            applied_at: row.applied_at,
            revoked_reason: row.revoked_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for financial aid awards
#[derive(Debug, Clone, Copy, Default)]
pub struct FinancialAidRepository;

impl FinancialAidRepository {
    pub async fn insert(conn: &mut PgConnection, aid: &FinancialAid) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO financial_aid (
                id, student_id, aid_type, amount, term, academic_year, min_gpa_required,
                max_aid_cap, is_refundable, status, applied_to_invoice_id, applied_at,
                revoked_reason, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(*aid.id.as_uuid())
        .bind(aid.student_id.as_str())
        .bind(aid.aid_type.as_str())
        .bind(aid.amount.amount())
        .bind(&aid.period.term)
        .bind(&aid.period.academic_year)
        .bind(aid.min_gpa_required)
        .bind(aid.max_aid_cap.map(|cap| cap.amount()))
        .bind(aid.is_refundable)
        .bind(aid.status.as_str())
        .bind(aid.applied_to_invoice_id.map(Uuid::from))
        .bind(aid.applied_at)
        .bind(&aid.revoked_reason)
        .bind(aid.created_at)
        .bind(aid.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Writes the lifecycle columns; identity and period are immutable
    pub async fn update(conn: &mut PgConnection, aid: &FinancialAid) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE financial_aid
            SET amount = $2, status = $3, applied_to_invoice_id = $4, applied_at = $5,
                revoked_reason = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(*aid.id.as_uuid())
        .bind(aid.amount.amount())
        .bind(aid.status.as_str())
        .bind(aid.applied_to_invoice_id.map(Uuid::from))
        .bind(aid.applied_at)
        .bind(&aid.revoked_reason)
        .bind(aid.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("FinancialAid", aid.id));
        }
        Ok(())
    }

    pub async fn get(conn: &mut PgConnection, id: FinancialAidId) -> Result<Option<FinancialAid>, DatabaseError> {
        let sql = format!("{SELECT_AID} WHERE id = $1");
        sqlx::query_as::<_, FinancialAidRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?
            .map(FinancialAid::try_from)
            .transpose()
    }

    /// Lists awards matching the filter in creation order
    pub async fn list(conn: &mut PgConnection, filter: &AidFilter) -> Result<Vec<FinancialAid>, DatabaseError> {
        let mut query = QueryBuilder::<Postgres>::new(SELECT_AID);
        query.push(" WHERE TRUE");

        if let Some(student_id) = &filter.student_id {
            query.push(" AND student_id = ").push_bind(student_id.as_str().to_owned());
        }
        if let Some(period) = &filter.period {
            query.push(" AND term = ").push_bind(period.term.clone());
            query.push(" AND academic_year = ").push_bind(period.academic_year.clone());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY created_at, id");

        query
            .build_query_as::<FinancialAidRow>()
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(FinancialAid::try_from)
            .collect()
    }
}
