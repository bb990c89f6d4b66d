//! Invoice repository
//!
//! Invoices are stored with their line items in `invoice_line_items`, keyed by
//! position. Line items never change after issue except through a full update,
//! which rewrites them.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use core_kernel::InvoiceId;
use domain_billing::{Invoice, InvoiceFilter, InvoiceLineItem};

use super::{decode, money, period, student};
use crate::error::DatabaseError;

const SELECT_INVOICE: &str = r#"
    SELECT id, invoice_number, student_id, term, academic_year, credits,
           tuition_amount, fixed_fees_amount, other_charges, late_fee_amount,
           financial_aid_amount, total_amount, amount_paid, outstanding_balance,
           status, issue_date, due_date, notes, created_at, updated_at
    FROM invoices
"#;

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: Uuid,
    invoice_number: String,
    student_id: String,
    term: String,
    academic_year: String,
    credits: i32,
    tuition_amount: Decimal,
    fixed_fees_amount: Decimal,
    other_charges: Decimal,
    late_fee_amount: Decimal,
    financial_aid_amount: Decimal,
    total_amount: Decimal,
    amount_paid: Decimal,
    outstanding_balance: Decimal,
    status: String,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct LineItemRow {
    invoice_id: Uuid,
    description: String,
    amount: Decimal,
    kind: String,
    quantity: Decimal,
    unit_price: Decimal,
}

impl LineItemRow {
    fn into_domain(self) -> Result<InvoiceLineItem, DatabaseError> {
        Ok(InvoiceLineItem {
            description: self.description,
            amount: money(self.amount),
            kind: decode("invoice_line_items.kind", &self.kind)?,
            quantity: self.quantity,
            unit_price: money(self.unit_price),
        })
    }
}

impl InvoiceRow {
    fn into_domain(self, line_items: Vec<InvoiceLineItem>) -> Result<Invoice, DatabaseError> {
        Ok(Invoice {
            id: InvoiceId::from_uuid(self.id),
            invoice_number: self.invoice_number,
            student_id: student(self.student_id)?,
            period: period(self.term, self.academic_year)?,
            credits: u32::try_from(self.credits).map_err(|e| DatabaseError::column("invoices.credits", e))?,
            tuition_amount: money(self.tuition_amount),
            fixed_fees_amount: money(self.fixed_fees_amount),
            other_charges: money(self.other_charges),
            late_fee_amount: money(self.late_fee_amount),
            financial_aid_amount: money(self.financial_aid_amount),
            total_amount: money(self.total_amount),
            amount_paid: money(self.amount_paid),
            outstanding_balance: money(self.outstanding_balance),
            status: decode("invoices.status", &self.status)?,
            issue_date: self.issue_date,
            due_date: self.due_date,
            line_items,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for invoices and their line items
#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceRepository;

impl InvoiceRepository {
    pub async fn insert(conn: &mut PgConnection, invoice: &Invoice) -> Result<(), DatabaseError> {
        let credits = i32::try_from(invoice.credits).map_err(|e| DatabaseError::column("invoices.credits", e))?;
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, student_id, term, academic_year, credits,
                tuition_amount, fixed_fees_amount, other_charges, late_fee_amount,
                financial_aid_amount, total_amount, amount_paid, outstanding_balance,
                status, issue_date, due_date, notes, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
            )
            "#,
        )
        .bind(*invoice.id.as_uuid())
        .bind(&invoice.invoice_number)
        .bind(invoice.student_id.as_str())
        .bind(&invoice.period.term)
        .bind(&invoice.period.academic_year)
        .bind(credits)
        .bind(invoice.tuition_amount.amount())
        .bind(invoice.fixed_fees_amount.amount())
        .bind(invoice.other_charges.amount())
        .bind(invoice.late_fee_amount.amount())
        .bind(invoice.financial_aid_amount.amount())
        .bind(invoice.total_amount.amount())
        .bind(invoice.amount_paid.amount())
        .bind(invoice.outstanding_balance.amount())
        .bind(invoice.status.as_str())
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(&invoice.notes)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *conn)
        .await?;

        Self::insert_line_items(conn, invoice).await
    }

    /// Writes every mutable column and rewrites the line items
    pub async fn update(conn: &mut PgConnection, invoice: &Invoice) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET tuition_amount = $2, fixed_fees_amount = $3, other_charges = $4,
                late_fee_amount = $5, financial_aid_amount = $6, total_amount = $7,
                amount_paid = $8, outstanding_balance = $9, status = $10,
                due_date = $11, notes = $12, updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(*invoice.id.as_uuid())
        .bind(invoice.tuition_amount.amount())
        .bind(invoice.fixed_fees_amount.amount())
        .bind(invoice.other_charges.amount())
        .bind(invoice.late_fee_amount.amount())
        .bind(invoice.financial_aid_amount.amount())
        .bind(invoice.total_amount.amount())
        .bind(invoice.amount_paid.amount())
        .bind(invoice.outstanding_balance.amount())
        .bind(invoice.status.as_str())
        .bind(invoice.due_date)
        .bind(&invoice.notes)
        .bind(invoice.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Invoice", invoice.id));
        }

        sqlx::query("DELETE FROM invoice_line_items WHERE invoice_id = $1")
            .bind(*invoice.id.as_uuid())
            .execute(&mut *conn)
            .await?;
        Self::insert_line_items(conn, invoice).await
    }

    pub async fn get(conn: &mut PgConnection, id: InvoiceId) -> Result<Option<Invoice>, DatabaseError> {
        let sql = format!("{SELECT_INVOICE} WHERE id = $1");
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        Self::hydrate(conn, row.into_iter().collect()).await.map(|mut v| v.pop())
    }

    pub async fn get_by_number(conn: &mut PgConnection, invoice_number: &str) -> Result<Option<Invoice>, DatabaseError> {
        let sql = format!("{SELECT_INVOICE} WHERE invoice_number = $1");
        let row = sqlx::query_as::<_, InvoiceRow>(&sql)
            .bind(invoice_number)
            .fetch_optional(&mut *conn)
            .await?;
        Self::hydrate(conn, row.into_iter().collect()).await.map(|mut v| v.pop())
    }

    /// Lists invoices matching the filter in creation order
    pub async fn list(conn: &mut PgConnection, filter: &InvoiceFilter) -> Result<Vec<Invoice>, DatabaseError> {
        let mut query = QueryBuilder::<Postgres>::new(SELECT_INVOICE);
        query.push(" WHERE TRUE");

        if let Some(student_id) = &filter.student_id {
            query.push(" AND student_id = ").push_bind(student_id.as_str().to_owned());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(period) = &filter.period {
            query.push(" AND term = ").push_bind(period.term.clone());
            query.push(" AND academic_year = ").push_bind(period.academic_year.clone());
        }
        if let Some(due_before) = filter.due_before {
            query.push(" AND due_date < ").push_bind(due_before);
        }
        query.push(" ORDER BY created_at, id");

        let rows = query.build_query_as::<InvoiceRow>().fetch_all(&mut *conn).await?;
        Self::hydrate(conn, rows).await
    }

    async fn insert_line_items(conn: &mut PgConnection, invoice: &Invoice) -> Result<(), DatabaseError> {
        for (position, line) in invoice.line_items.iter().enumerate() {
            let position =
                i32::try_from(position).map_err(|e| DatabaseError::column("invoice_line_items.position", e))?;
            sqlx::query(
                r#"
                INSERT INTO invoice_line_items (
                    invoice_id, position, description, amount, kind, quantity, unit_price
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(*invoice.id.as_uuid())
            .bind(position)
            .bind(&line.description)
            .bind(line.amount.amount())
            .bind(line.kind.as_str())
            .bind(line.quantity)
            .bind(line.unit_price.amount())
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn hydrate(conn: &mut PgConnection, rows: Vec<InvoiceRow>) -> Result<Vec<Invoice>, DatabaseError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let line_rows = sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT invoice_id, description, amount, kind, quantity, unit_price
            FROM invoice_line_items
            WHERE invoice_id = ANY($1)
            ORDER BY invoice_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut lines: HashMap<Uuid, Vec<InvoiceLineItem>> = HashMap::new();
        for line in line_rows {
            let owner = line.invoice_id;
            lines.entry(owner).or_default().push(line.into_domain()?);
        }

        rows.into_iter()
            .map(|row| {
                let own = lines.remove(&row.id).unwrap_or_default();
                row.into_domain(own)
            })
            .collect()
    }
}
