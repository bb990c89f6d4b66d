//! PostgreSQL Billing Store
//!
//! Implements the `BillingStore` port on PostgreSQL. Each unit of work is one
//! database transaction; the repositories run their statements on it and
//! dropping an uncommitted [`PostgresTransaction`] rolls it back.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresBillingStore};
//! use domain_billing::BillingStore;
//!
//! let pool = create_pool(DatabaseConfig::new(url)).await?;
//! run_migrations(&pool).await?;
//! let store: Arc<dyn BillingStore> = Arc::new(PostgresBillingStore::new(pool));
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{
    AdapterHealth, DomainPort, FeeStructureId, FinancialAidId, HealthCheckResult, HealthCheckable, InvoiceId,
    PaymentId, PortError, RefundId, StudentId,
};
use domain_billing::{
    AidFilter, BillingStore, BillingTransaction, FeeStructure, FeeStructureKey, FinancialAid, Invoice,
    InvoiceFilter, LedgerHead, LedgerQuery, Payment, PaymentFilter, Refund, StatementEntry,
};

use crate::error::DatabaseError;
use crate::repositories::aid::FinancialAidRepository;
use crate::repositories::fee_structures::FeeStructureRepository;
use crate::repositories::invoices::InvoiceRepository;
use crate::repositories::ledger::LedgerRepository;
use crate::repositories::payments::PaymentRepository;
use crate::repositories::refunds::RefundRepository;

const ADAPTER_ID: &str = "postgres-billing-store";

/// PostgreSQL implementation of the billing store port
#[derive(Debug, Clone)]
pub struct PostgresBillingStore {
    pool: PgPool,
}

impl PostgresBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl DomainPort for PostgresBillingStore {}

#[async_trait]
impl HealthCheckable for PostgresBillingStore {
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await;

        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl BillingStore for PostgresBillingStore {
    #[instrument(skip(self))]
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, PortError> {
        let tx = self.pool.begin().await.map_err(DatabaseError::from)?;
        debug!("Opened billing transaction");
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

/// One open unit of work against PostgreSQL
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BillingTransaction for PostgresTransaction {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn find_fee_structure(&mut self, key: &FeeStructureKey) -> Result<Option<FeeStructure>, PortError> {
        Ok(FeeStructureRepository::find_by_key(&mut *self.tx, key).await?)
    }

    async fn get_fee_structure(&mut self, id: FeeStructureId) -> Result<Option<FeeStructure>, PortError> {
        Ok(FeeStructureRepository::get(&mut *self.tx, id).await?)
    }

    async fn list_fee_structures(&mut self) -> Result<Vec<FeeStructure>, PortError> {
        Ok(FeeStructureRepository::list(&mut *self.tx).await?)
    }

    #[instrument(skip(self, structure), fields(fee_structure_id = %structure.id))]
    async fn insert_fee_structure(&mut self, structure: &FeeStructure) -> Result<(), PortError> {
        debug!("Inserting fee structure");
        Ok(FeeStructureRepository::insert(&mut *self.tx, structure).await?)
    }

    #[instrument(skip(self, structure), fields(fee_structure_id = %structure.id))]
    async fn replace_fee_structure(&mut self, structure: &FeeStructure) -> Result<(), PortError> {
        debug!("Replacing fee structure");
        Ok(FeeStructureRepository::replace(&mut *self.tx, structure).await?)
    }

    #[instrument(skip(self), fields(fee_structure_id = %id))]
    async fn delete_fee_structure(&mut self, id: FeeStructureId) -> Result<bool, PortError> {
        debug!("Deleting fee structure");
        Ok(FeeStructureRepository::delete(&mut *self.tx, id).await?)
    }

    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number))]
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
        debug!("Inserting invoice");
        Ok(InvoiceRepository::insert(&mut *self.tx, invoice).await?)
    }

    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number, status = %invoice.status))]
    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
        debug!("Updating invoice");
        Ok(InvoiceRepository::update(&mut *self.tx, invoice).await?)
    }

    async fn get_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
        Ok(InvoiceRepository::get(&mut *self.tx, id).await?)
    }

    async fn get_invoice_by_number(&mut self, invoice_number: &str) -> Result<Option<Invoice>, PortError> {
        Ok(InvoiceRepository::get_by_number(&mut *self.tx, invoice_number).await?)
    }

    async fn list_invoices(&mut self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, PortError> {
        Ok(InvoiceRepository::list(&mut *self.tx, filter).await?)
    }

    #[instrument(skip(self, student_id), fields(student_id = %student_id))]
    async fn ledger_head(&mut self, student_id: &StudentId) -> Result<LedgerHead, PortError> {
        let head = LedgerRepository::lock_head(&mut *self.tx, student_id).await?;
        debug!(last_sequence = head.last_sequence, "Locked ledger head");
        Ok(head)
    }

    #[instrument(skip(self, entry), fields(student_id = %entry.student_id, sequence = entry.sequence))]
    async fn insert_entry(&mut self, entry: &StatementEntry) -> Result<(), PortError> {
        debug!(transaction_type = %entry.transaction_type, "Appending ledger entry");
        Ok(LedgerRepository::insert_entry(&mut *self.tx, entry).await?)
    }

    async fn list_entries(&mut self, student_id: &StudentId, query: &LedgerQuery) -> Result<Vec<StatementEntry>, PortError> {
        Ok(LedgerRepository::list(&mut *self.tx, student_id, query).await?)
    }

    #[instrument(skip(self, aid), fields(aid_id = %aid.id))]
    async fn insert_aid(&mut self, aid: &FinancialAid) -> Result<(), PortError> {
        debug!("Inserting financial aid");
        Ok(FinancialAidRepository::insert(&mut *self.tx, aid).await?)
    }

    #[instrument(skip(self, aid), fields(aid_id = %aid.id, status = %aid.status))]
    async fn update_aid(&mut self, aid: &FinancialAid) -> Result<(), PortError> {
        debug!("Updating financial aid");
        Ok(FinancialAidRepository::update(&mut *self.tx, aid).await?)
    }

    async fn get_aid(&mut self, id: FinancialAidId) -> Result<Option<FinancialAid>, PortError> {
        Ok(FinancialAidRepository::get(&mut *self.tx, id).await?)
    }

    async fn list_aid(&mut self, filter: &AidFilter) -> Result<Vec<FinancialAid>, PortError> {
        Ok(FinancialAidRepository::list(&mut *self.tx, filter).await?)
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.id))]
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        debug!("Inserting payment");
        Ok(PaymentRepository::insert(&mut *self.tx, payment).await?)
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.id, status = %payment.status))]
    async fn update_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        debug!("Updating payment");
        Ok(PaymentRepository::update(&mut *self.tx, payment).await?)
    }

    async fn get_payment(&mut self, id: PaymentId) -> Result<Option<Payment>, PortError> {
        Ok(PaymentRepository::get(&mut *self.tx, id).await?)
    }

    async fn get_payment_by_reference(&mut self, reference_number: &str) -> Result<Option<Payment>, PortError> {
        Ok(PaymentRepository::get_by_reference(&mut *self.tx, reference_number).await?)
    }

    async fn list_payments(&mut self, filter: &PaymentFilter) -> Result<Vec<Payment>, PortError> {
        Ok(PaymentRepository::list(&mut *self.tx, filter).await?)
    }

    #[instrument(skip(self, refund), fields(refund_id = %refund.id))]
    async fn insert_refund(&mut self, refund: &Refund) -> Result<(), PortError> {
        debug!("Inserting refund");
        Ok(RefundRepository::insert(&mut *self.tx, refund).await?)
    }

    #[instrument(skip(self, refund), fields(refund_id = %refund.id, status = %refund.status))]
    async fn update_refund(&mut self, refund: &Refund) -> Result<(), PortError> {
        debug!("Updating refund");
        Ok(RefundRepository::update(&mut *self.tx, refund).await?)
    }

    async fn get_refund(&mut self, id: RefundId) -> Result<Option<Refund>, PortError> {
        Ok(RefundRepository::get(&mut *self.tx, id).await?)
    }

    async fn list_refunds(&mut self, student_id: &StudentId) -> Result<Vec<Refund>, PortError> {
        Ok(RefundRepository::list_for_student(&mut *self.tx, student_id).await?)
    }

    #[instrument(skip(self))]
    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        self.tx.commit().await.map_err(DatabaseError::from)?;
        debug!("Committed billing transaction");
        Ok(())
    }
}
