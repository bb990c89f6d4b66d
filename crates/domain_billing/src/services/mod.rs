//! Billing domain services
//!
//! Each service owns one workflow and runs every public operation in its own
//! store transaction. They share a [`BillingContext`]: the store, the clock
//! that decides what "today" is, and the engine settings.

mod aid_allocator;
mod fee_catalog;
mod invoice_engine;
mod ledger_service;
mod payment_recorder;
mod refund_processor;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use core_kernel::{AcademicPeriod, Clock, StudentId};

use crate::aid::EligibilityPolicy;
use crate::error::{BillingError, BillingResult};
use crate::ledger::{EntryDraft, LedgerQuery, StatementEntry};
use crate::ports::{BillingStore, BillingTransaction, InvoiceFilter};
use crate::settings::BillingSettings;

pub use aid_allocator::FinancialAidAllocator;
pub use fee_catalog::FeeCatalog;
pub use invoice_engine::{GenerateInvoice, InvoiceEngine, LateFeeAssessment};
pub use ledger_service::LedgerService;
pub use payment_recorder::{PaymentRecorder, RecordPayment};
pub use refund_processor::{RefundProcessor, RefundRequest};

/// Dependencies shared by the billing services
#[derive(Clone)]
pub struct BillingContext {
    pub store: Arc<dyn BillingStore>,
    pub clock: Arc<dyn Clock>,
    pub settings: BillingSettings,
}

impl BillingContext {
    pub fn new(store: Arc<dyn BillingStore>, clock: Arc<dyn Clock>, settings: BillingSettings) -> Self {
        Self { store, clock, settings }
    }

    pub(crate) fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) async fn begin(&self) -> BillingResult<Box<dyn BillingTransaction>> {
        Ok(self.store.begin().await?)
    }

    /// Opens a unit of work already holding the student's ledger lock
    pub(crate) async fn begin_for(&self, student_id: &StudentId) -> BillingResult<Box<dyn BillingTransaction>> {
        let mut tx = self.begin().await?;
        lock_student(tx.as_mut(), student_id).await?;
        Ok(tx)
    }
}

/// All billing services over one context
#[derive(Clone)]
pub struct BillingServices {
    pub fees: FeeCatalog,
    pub invoices: InvoiceEngine,
    pub ledger: LedgerService,
    pub aid: FinancialAidAllocator,
    pub refunds: RefundProcessor,
    pub payments: PaymentRecorder,
}

impl BillingServices {
    /// Wires every service with the default eligibility policy
    pub fn new(ctx: BillingContext) -> Self {
        Self {
            fees: FeeCatalog::new(ctx.clone()),
            invoices: InvoiceEngine::new(ctx.clone()),
            ledger: LedgerService::new(ctx.clone()),
            aid: FinancialAidAllocator::new(ctx.clone()),
            refunds: RefundProcessor::new(ctx.clone()),
            payments: PaymentRecorder::new(ctx),
        }
    }

    /// Wires every service with a custom aid eligibility policy
    pub fn with_eligibility(ctx: BillingContext, eligibility: Arc<dyn EligibilityPolicy>) -> Self {
        let mut services = Self::new(ctx.clone());
        services.aid = FinancialAidAllocator::with_eligibility(ctx, eligibility);
        services
    }
}

/// Holds the student's ledger lock until the transaction ends
///
/// Writes to a student's invoices, aid, payments and refunds take this lock
/// before reading any of them, so two writers for the same student run one
/// after the other and the second sees what the first committed. Records
/// looked up by id are read once to find their student, then read again
/// under the lock.
pub(crate) async fn lock_student(tx: &mut dyn BillingTransaction, student_id: &StudentId) -> BillingResult<()> {
    tx.ledger_head(student_id).await?;
    Ok(())
}

/// Appends a draft to its student's ledger inside an open transaction
pub(crate) async fn post_entry(
    tx: &mut dyn BillingTransaction,
    draft: EntryDraft,
    recorded_at: DateTime<Utc>,
) -> BillingResult<StatementEntry> {
    let mut head = tx.ledger_head(&draft.student_id).await?;
    let entry = head.append(draft, recorded_at)?;
    tx.insert_entry(&entry).await?;
    debug!(
        student_id = %entry.student_id,
        sequence = entry.sequence,
        transaction_type = %entry.transaction_type,
        running_balance = %entry.running_balance,
        "Ledger entry appended"
    );
    Ok(entry)
}

/// Billing period for an entry that has no invoice of its own
///
/// Uses the explicit period when given, else the period of the student's most
/// recent ledger entry, else that of their most recent invoice.
pub(crate) async fn resolve_period(
    tx: &mut dyn BillingTransaction,
    student_id: &StudentId,
    explicit: Option<AcademicPeriod>,
) -> BillingResult<AcademicPeriod> {
    if let Some(period) = explicit {
        return Ok(period);
    }
    if let Some(entry) = tx.list_entries(student_id, &LedgerQuery::All).await?.pop() {
        return Ok(entry.period);
    }
    if let Some(invoice) = tx
        .list_invoices(&InvoiceFilter::for_student(student_id.clone()))
        .await?
        .pop()
    {
        return Ok(invoice.period);
    }
    Err(BillingError::invalid(format!(
        "student {student_id} has no billing history; a term and academic year are required"
    )))
}

/// Turns a missing record into `NotFound`
pub(crate) fn found<T>(value: Option<T>, entity: &str, key: impl std::fmt::Display) -> BillingResult<T> {
    value.ok_or_else(|| BillingError::not_found(entity, key))
}
