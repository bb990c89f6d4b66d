use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use core_kernel::{AcademicPeriod, InvoiceId, Money, Rate, StudentId};

use crate::error::{BillingError, BillingResult};
use crate::fee::{FeeStructure, FeeStructureKey};
use crate::invoice::{Invoice, InvoiceStatus, TuitionQuote};
use crate::ledger::{EntryDraft, ReferenceType, TransactionType};
use crate::ports::{BillingTransaction, InvoiceFilter};

use super::{found, lock_student, post_entry, BillingContext};

/// Request to bill a student for a term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateInvoice {
    pub student_id: StudentId,
    #[serde(flatten)]
    pub period: AcademicPeriod,
    pub department: String,
    pub student_category: String,
    pub credits: u32,
}

impl GenerateInvoice {
    /// Fee catalog key this request is priced under
    pub fn fee_key(&self) -> BillingResult<FeeStructureKey> {
        FeeStructureKey::new(
            self.period.academic_year.clone(),
            self.department.clone(),
            self.student_category.clone(),
        )
    }
}

/// A late fee raised by the late-fee job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LateFeeAssessment {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub increase: Money,
}

/// Prices tuition, issues invoices and runs the invoice state machine
#[derive(Clone)]
pub struct InvoiceEngine {
    ctx: BillingContext,
}

impl InvoiceEngine {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    /// Prices a credit load without issuing anything
    ///
    /// # Errors
    ///
    /// `NotFound` if no active fee structure exists for the key;
    /// `InvalidArgument` if `credits` is zero.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn calculate_tuition(&self, key: &FeeStructureKey, credits: u32) -> BillingResult<TuitionQuote> {
        let mut tx = self.ctx.begin().await?;
        let structure = active_structure(tx.as_mut(), key).await?;
        TuitionQuote::price(&structure, credits)
    }

    /// Issues an invoice and charges it to the student's ledger
    ///
    /// The invoice is due `due_days` after today. Zero-total invoices are
    /// issued SETTLED and produce no ledger entry.
    ///
    /// # Returns
    ///
    /// The persisted invoice
    #[instrument(skip(self, request), fields(student_id = %request.student_id, period = %request.period))]
    pub async fn generate_invoice(&self, request: GenerateInvoice) -> BillingResult<Invoice> {
        let key = request.fee_key()?;
        let today = self.ctx.today();

        let now = self.ctx.now();

        let mut tx = self.ctx.begin_for(&request.student_id).await?;
        let structure = active_structure(tx.as_mut(), &key).await?;
        let quote = TuitionQuote::price(&structure, request.credits)?;

        let invoice = Invoice::issue(
            request.student_id,
            request.period,
            quote,
            today,
            self.ctx.settings.due_days,
            now,
        )?;
        tx.insert_invoice(&invoice).await?;

        if invoice.total_amount.is_positive() {
            let draft = EntryDraft::new(
                invoice.student_id.clone(),
                invoice.period.clone(),
                TransactionType::Charge,
                invoice.total_amount,
                (ReferenceType::Invoice, *invoice.id.as_uuid()),
                format!("Invoice {} issued", invoice.invoice_number),
                today,
            )?;
            post_entry(tx.as_mut(), draft, now).await?;
        }

        tx.commit().await?;
        info!(
            invoice_number = %invoice.invoice_number,
            total = %invoice.total_amount,
            status = %invoice.status,
            "Invoice generated"
        );
        Ok(invoice)
    }

    pub async fn get(&self, id: InvoiceId) -> BillingResult<Invoice> {
        let mut tx = self.ctx.begin().await?;
        found(tx.get_invoice(id).await?, "Invoice", id)
    }

    pub async fn get_by_number(&self, invoice_number: &str) -> BillingResult<Invoice> {
        let mut tx = self.ctx.begin().await?;
        found(tx.get_invoice_by_number(invoice_number).await?, "Invoice", invoice_number)
    }

    pub async fn list(&self, filter: &InvoiceFilter) -> BillingResult<Vec<Invoice>> {
        let mut tx = self.ctx.begin().await?;
        Ok(tx.list_invoices(filter).await?)
    }

    pub async fn list_for_student(&self, student_id: &StudentId) -> BillingResult<Vec<Invoice>> {
        self.list(&InvoiceFilter::for_student(student_id.clone())).await
    }

    pub async fn list_by_status(&self, status: InvoiceStatus) -> BillingResult<Vec<Invoice>> {
        self.list(&InvoiceFilter::with_status(status)).await
    }

    pub async fn list_for_period(&self, student_id: &StudentId, period: &AcademicPeriod) -> BillingResult<Vec<Invoice>> {
        self.list(&InvoiceFilter::for_student(student_id.clone()).in_period(period.clone()))
            .await
    }

    /// Assesses the late fee on one invoice as of today
    ///
    /// # Returns
    ///
    /// The increase in the invoice's late fee; zero when nothing changed. A
    /// positive increase is booked as a LATE_FEE ledger entry.
    #[instrument(skip(self, id, rate), fields(invoice_id = %id, rate = %rate))]
    pub async fn apply_late_fee(&self, id: InvoiceId, rate: Rate) -> BillingResult<Money> {
        if rate.is_negative() {
            return Err(BillingError::invalid("late fee rate must not be negative"));
        }
        let today = self.ctx.today();
        let now = self.ctx.now();

        let mut tx = self.ctx.begin().await?;
        let mut invoice = locked_invoice(tx.as_mut(), id).await?;
        let increase = invoice.apply_late_fee(rate, today);
        if !increase.is_positive() {
            return Ok(increase);
        }

        invoice.touch(now);
        tx.update_invoice(&invoice).await?;
        let draft = EntryDraft::new(
            invoice.student_id.clone(),
            invoice.period.clone(),
            TransactionType::LateFee,
            increase,
            (ReferenceType::Invoice, *invoice.id.as_uuid()),
            format!("Late fee on invoice {}", invoice.invoice_number),
            today,
        )?;
        post_entry(tx.as_mut(), draft, now).await?;
        tx.commit().await?;

        info!(
            invoice_number = %invoice.invoice_number,
            increase = %increase,
            late_fee = %invoice.late_fee_amount,
            "Late fee assessed"
        );
        Ok(increase)
    }

    /// Late-fee job: assesses every open invoice that is past due
    ///
    /// Each invoice is handled in its own transaction. Failures are logged and
    /// skipped so one bad invoice does not stop the run.
    #[instrument(skip(self, rate), fields(rate = %rate))]
    pub async fn apply_late_fees(&self, rate: Rate) -> BillingResult<Vec<LateFeeAssessment>> {
        let today = self.ctx.today();
        let candidates: Vec<Invoice> = {
            let mut tx = self.ctx.begin().await?;
            tx.list_invoices(&InvoiceFilter::default().due_before(today))
                .await?
                .into_iter()
                .filter(Invoice::is_open)
                .collect()
        };

        let mut assessed = Vec::new();
        for invoice in candidates {
            match self.apply_late_fee(invoice.id, rate).await {
                Ok(increase) if increase.is_positive() => assessed.push(LateFeeAssessment {
                    invoice_id: invoice.id,
                    invoice_number: invoice.invoice_number,
                    increase,
                }),
                Ok(_) => {}
                Err(error) => warn!(
                    invoice_number = %invoice.invoice_number,
                    %error,
                    "Skipping invoice in late-fee run"
                ),
            }
        }

        info!(assessed = assessed.len(), "Late-fee run finished");
        Ok(assessed)
    }

    /// Cancels an invoice nothing has been paid or granted against
    ///
    /// The outstanding amount is written back to the student's ledger with an
    /// ADJUSTMENT entry.
    ///
    /// # Errors
    ///
    /// `StateConflict` unless the invoice is UNPAID or OVERDUE with no payment
    /// and no aid.
    #[instrument(skip(self, reason), fields(invoice_id = %id))]
    pub async fn cancel_invoice(&self, id: InvoiceId, reason: &str) -> BillingResult<Invoice> {
        let today = self.ctx.today();
        let now = self.ctx.now();

        let mut tx = self.ctx.begin().await?;
        let mut invoice = locked_invoice(tx.as_mut(), id).await?;
        let written_back = invoice.cancel(reason, now)?;
        tx.update_invoice(&invoice).await?;

        if written_back.is_positive() {
            let draft = EntryDraft::new(
                invoice.student_id.clone(),
                invoice.period.clone(),
                TransactionType::Adjustment,
                written_back,
                (ReferenceType::Invoice, *invoice.id.as_uuid()),
                format!("Invoice {} cancelled: {reason}", invoice.invoice_number),
                today,
            )?;
            post_entry(tx.as_mut(), draft, now).await?;
        }

        tx.commit().await?;
        info!(invoice_number = %invoice.invoice_number, written_back = %written_back, "Invoice cancelled");
        Ok(invoice)
    }
}

/// Reads an invoice under its student's ledger lock
async fn locked_invoice(tx: &mut dyn BillingTransaction, id: InvoiceId) -> BillingResult<Invoice> {
    let student_id = found(tx.get_invoice(id).await?, "Invoice", id)?.student_id;
    lock_student(tx, &student_id).await?;
    found(tx.get_invoice(id).await?, "Invoice", id)
}

/// The ACTIVE structure for a key; anything else counts as missing
async fn active_structure(tx: &mut dyn BillingTransaction, key: &FeeStructureKey) -> BillingResult<FeeStructure> {
    match tx.find_fee_structure(key).await? {
        Some(structure) if structure.is_active() => Ok(structure),
        Some(structure) => {
            warn!(key = %key, status = %structure.status, "Fee structure is not active");
            Err(BillingError::not_found("Active fee structure", key))
        }
        None => Err(BillingError::not_found("Fee structure", key)),
    }
}
