//! Billing store port
//!
//! Every public billing operation runs inside one store transaction:
//!
//! ```rust,ignore
//! let mut tx = store.begin().await?;
//! let mut invoice = tx.get_invoice(id).await?.ok_or(...)?;
//! invoice.record_payment(amount, today);
//! tx.update_invoice(&invoice).await?;
//! tx.commit().await?;
//! ```
//!
//! Dropping a transaction without calling [`BillingTransaction::commit`] rolls
//! it back. [`BillingTransaction::ledger_head`] locks the student's ledger tail
//! until the transaction ends, which is what keeps running balances in order.
//! Services take that lock before reading any of the student's invoices, aid,
//! payments or refunds, so it also serializes their read-modify-write cycles.
//!
//! Adapters:
//!
//! - **In-memory**: [`crate::memory::InMemoryBillingStore`], for tests and demos
//! - **PostgreSQL**: `infra_db::PostgresBillingStore`

use async_trait::async_trait;
use chrono::NaiveDate;

use core_kernel::{
    AcademicPeriod, DateRange, DomainPort, FeeStructureId, FinancialAidId, HealthCheckable, InvoiceId,
    PaymentId, PortError, RefundId, StudentId,
};

use crate::aid::{AidStatus, FinancialAid};
use crate::fee::{FeeStructure, FeeStructureKey};
use crate::invoice::{Invoice, InvoiceStatus};
use crate::ledger::{LedgerHead, LedgerQuery, StatementEntry};
use crate::payment::Payment;
use crate::refund::Refund;

/// Filter for invoice listings; results are in issue order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceFilter {
    pub student_id: Option<StudentId>,
    pub status: Option<InvoiceStatus>,
    pub period: Option<AcademicPeriod>,
    /// Only invoices whose due date is before this date
    pub due_before: Option<NaiveDate>,
}

impl InvoiceFilter {
    pub fn for_student(student_id: StudentId) -> Self {
        Self {
            student_id: Some(student_id),
            ..Default::default()
        }
    }

    pub fn with_status(status: InvoiceStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn in_period(mut self, period: AcademicPeriod) -> Self {
        self.period = Some(period);
        self
    }

    pub fn due_before(mut self, date: NaiveDate) -> Self {
        self.due_before = Some(date);
        self
    }

    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.student_id.as_ref().map_or(true, |s| invoice.student_id == *s)
            && self.status.map_or(true, |s| invoice.status == s)
            && self.period.as_ref().map_or(true, |p| invoice.period == *p)
            && self.due_before.map_or(true, |d| invoice.due_date < d)
    }
}

/// Filter for aid listings; results are in creation order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AidFilter {
    pub student_id: Option<StudentId>,
    pub period: Option<AcademicPeriod>,
    pub status: Option<AidStatus>,
}

impl AidFilter {
    pub fn pending() -> Self {
        Self {
            status: Some(AidStatus::Pending),
            ..Default::default()
        }
    }

    pub fn for_student(student_id: StudentId) -> Self {
        Self {
            student_id: Some(student_id),
            ..Default::default()
        }
    }

    pub fn for_period(period: AcademicPeriod) -> Self {
        Self {
            period: Some(period),
            ..Default::default()
        }
    }

    pub fn matches(&self, aid: &FinancialAid) -> bool {
        self.student_id.as_ref().map_or(true, |s| aid.student_id == *s)
            && self.period.as_ref().map_or(true, |p| aid.period == *p)
            && self.status.map_or(true, |s| aid.status == s)
    }
}

/// Filter for payment listings; results are ordered by payment date
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentFilter {
    pub student_id: Option<StudentId>,
    pub between: Option<DateRange>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        self.student_id.as_ref().map_or(true, |s| payment.student_id == *s)
            && self.between.map_or(true, |r| r.contains(payment.payment_date))
    }
}

/// Port for billing persistence
#[async_trait]
pub trait BillingStore: DomainPort + HealthCheckable {
    /// Opens a unit of work
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, PortError>;
}

/// A unit of work against the billing store
///
/// Lookups return `Ok(None)` for missing records; updates of missing records
/// return `PortError::NotFound`; unique-key violations return
/// `PortError::Conflict`.
#[async_trait]
pub trait BillingTransaction: Send {
    // Fee structures

    async fn find_fee_structure(&mut self, key: &FeeStructureKey) -> Result<Option<FeeStructure>, PortError>;

    async fn get_fee_structure(&mut self, id: FeeStructureId) -> Result<Option<FeeStructure>, PortError>;

    async fn list_fee_structures(&mut self) -> Result<Vec<FeeStructure>, PortError>;

    /// Inserts a structure and its items
    async fn insert_fee_structure(&mut self, structure: &FeeStructure) -> Result<(), PortError>;

    /// Updates rate and status, deleting and recreating the item list
    async fn replace_fee_structure(&mut self, structure: &FeeStructure) -> Result<(), PortError>;

    /// Deletes a structure with its items; false if it did not exist
    async fn delete_fee_structure(&mut self, id: FeeStructureId) -> Result<bool, PortError>;

    // Invoices

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError>;

    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError>;

    async fn get_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, PortError>;

    async fn get_invoice_by_number(&mut self, invoice_number: &str) -> Result<Option<Invoice>, PortError>;

    async fn list_invoices(&mut self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, PortError>;

    // Ledger

    /// Reads the student's ledger tail, locking it until the transaction ends
    async fn ledger_head(&mut self, student_id: &StudentId) -> Result<LedgerHead, PortError>;

    /// Appends an entry and moves the student's ledger head to it
    async fn insert_entry(&mut self, entry: &StatementEntry) -> Result<(), PortError>;

    async fn list_entries(&mut self, student_id: &StudentId, query: &LedgerQuery) -> Result<Vec<StatementEntry>, PortError>;

    // Financial aid

    async fn insert_aid(&mut self, aid: &FinancialAid) -> Result<(), PortError>;

    async fn update_aid(&mut self, aid: &FinancialAid) -> Result<(), PortError>;

    async fn get_aid(&mut self, id: FinancialAidId) -> Result<Option<FinancialAid>, PortError>;

    async fn list_aid(&mut self, filter: &AidFilter) -> Result<Vec<FinancialAid>, PortError>;

    // Payments

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError>;

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), PortError>;

    async fn get_payment(&mut self, id: PaymentId) -> Result<Option<Payment>, PortError>;

    async fn get_payment_by_reference(&mut self, reference_number: &str) -> Result<Option<Payment>, PortError>;

    async fn list_payments(&mut self, filter: &PaymentFilter) -> Result<Vec<Payment>, PortError>;

    // Refunds

    async fn insert_refund(&mut self, refund: &Refund) -> Result<(), PortError>;

    async fn update_refund(&mut self, refund: &Refund) -> Result<(), PortError>;

    async fn get_refund(&mut self, id: RefundId) -> Result<Option<Refund>, PortError>;

    async fn list_refunds(&mut self, student_id: &StudentId) -> Result<Vec<Refund>, PortError>;

    /// Makes every write of this unit of work visible
    async fn commit(self: Box<Self>) -> Result<(), PortError>;
}
