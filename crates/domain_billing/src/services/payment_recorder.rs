use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use core_kernel::{AcademicPeriod, DateRange, InvoiceId, Money, PaymentId, StudentId};

use crate::error::{BillingError, BillingResult};
use crate::ledger::{EntryDraft, ReferenceType, TransactionType};
use crate::payment::{Payment, PaymentMethod};
use crate::ports::PaymentFilter;

use super::{found, lock_student, post_entry, resolve_period, BillingContext};

/// Request to record a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub student_id: StudentId,
    pub amount: Money,
    pub reference_number: String,
    pub method: PaymentMethod,
    /// Defaults to today
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub invoice_id: Option<InvoiceId>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Period a ledgered payment is booked under when it has no invoice
    #[serde(default)]
    pub period: Option<AcademicPeriod>,
}

/// Records payments and their reversals
#[derive(Clone)]
pub struct PaymentRecorder {
    ctx: BillingContext,
}

impl PaymentRecorder {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    /// Records a completed payment and applies it to its invoice
    ///
    /// With payment ledgering enabled a PAYMENT entry is appended as well.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a non-positive amount, a reference number that is
    /// already used, or an invoice belonging to another student; `NotFound`
    /// if the linked invoice does not exist.
    #[instrument(skip(self, request), fields(student_id = %request.student_id, reference = %request.reference_number))]
    pub async fn record(&self, request: RecordPayment) -> BillingResult<Payment> {
        let today = self.ctx.today();
        let now = self.ctx.now();
        let mut payment = Payment::new(
            request.student_id,
            request.amount,
            request.reference_number,
            request.method,
            request.payment_date.unwrap_or(today),
            now,
        )?;
        if let Some(invoice_id) = request.invoice_id {
            payment = payment.for_invoice(invoice_id);
        }
        if let Some(notes) = request.notes {
            payment = payment.with_notes(notes);
        }

        let mut tx = self.ctx.begin_for(&payment.student_id).await?;
        if tx.get_payment_by_reference(&payment.reference_number).await?.is_some() {
            return Err(BillingError::invalid(format!(
                "payment reference {} already exists",
                payment.reference_number
            )));
        }

        let mut period = request.period;
        if let Some(invoice_id) = payment.invoice_id {
            let mut invoice = found(tx.get_invoice(invoice_id).await?, "Invoice", invoice_id)?;
            if invoice.student_id != payment.student_id {
                return Err(BillingError::invalid(format!(
                    "invoice {} does not belong to student {}",
                    invoice.invoice_number, payment.student_id
                )));
            }
            invoice.record_payment(payment.amount, today);
            invoice.touch(now);
            tx.update_invoice(&invoice).await?;
            period.get_or_insert(invoice.period);
        }

        payment.complete(now);
        tx.insert_payment(&payment).await?;

        if self.ctx.settings.ledgers_payments() {
            let period = resolve_period(tx.as_mut(), &payment.student_id, period).await?;
            let draft = EntryDraft::new(
                payment.student_id.clone(),
                period,
                TransactionType::Payment,
                payment.amount,
                (ReferenceType::Payment, *payment.id.as_uuid()),
                format!("Payment {} ({})", payment.reference_number, payment.method),
                payment.payment_date,
            )?;
            post_entry(tx.as_mut(), draft, now).await?;
        }

        tx.commit().await?;
        info!(payment_id = %payment.id, amount = %payment.amount, "Payment recorded");
        Ok(payment)
    }

    /// Marks a payment reversed, appending the reason to its notes
    ///
    /// With payment ledgering enabled the amount also comes back off the linked
    /// invoice and a REVERSAL entry is appended.
    ///
    /// # Errors
    ///
    /// `StateConflict` if the payment is already reversed.
    #[instrument(skip(self, id, reason), fields(payment_id = %id))]
    pub async fn reverse(&self, id: PaymentId, reason: &str) -> BillingResult<Payment> {
        let today = self.ctx.today();
        let now = self.ctx.now();

        let mut tx = self.ctx.begin().await?;
        let student_id = found(tx.get_payment(id).await?, "Payment", id)?.student_id;
        lock_student(tx.as_mut(), &student_id).await?;

        let mut payment = found(tx.get_payment(id).await?, "Payment", id)?;
        payment.reverse(reason, now)?;
        tx.update_payment(&payment).await?;

        if self.ctx.settings.ledgers_payments() {
            let mut period = None;
            if let Some(invoice_id) = payment.invoice_id {
                let mut invoice = found(tx.get_invoice(invoice_id).await?, "Invoice", invoice_id)?;
                invoice.reverse_payment(payment.amount, today);
                invoice.touch(now);
                tx.update_invoice(&invoice).await?;
                period = Some(invoice.period);
            }

            let period = resolve_period(tx.as_mut(), &payment.student_id, period).await?;
            let draft = EntryDraft::new(
                payment.student_id.clone(),
                period,
                TransactionType::Reversal,
                payment.amount,
                (ReferenceType::Payment, *payment.id.as_uuid()),
                format!("Payment {} reversed: {reason}", payment.reference_number),
                today,
            )?;
            post_entry(tx.as_mut(), draft, now).await?;
        }

        tx.commit().await?;
        info!(reference = %payment.reference_number, "Payment reversed");
        Ok(payment)
    }

    pub async fn get(&self, id: PaymentId) -> BillingResult<Payment> {
        let mut tx = self.ctx.begin().await?;
        found(tx.get_payment(id).await?, "Payment", id)
    }

    pub async fn find_by_reference(&self, reference_number: &str) -> BillingResult<Payment> {
        let mut tx = self.ctx.begin().await?;
        found(tx.get_payment_by_reference(reference_number).await?, "Payment", reference_number)
    }

    pub async fn list_for_student(&self, student_id: &StudentId) -> BillingResult<Vec<Payment>> {
        self.list(&PaymentFilter {
            student_id: Some(student_id.clone()),
            between: None,
        })
        .await
    }

    pub async fn list_between(&self, range: DateRange) -> BillingResult<Vec<Payment>> {
        self.list(&PaymentFilter {
            student_id: None,
            between: Some(range),
        })
        .await
    }

    pub async fn list(&self, filter: &PaymentFilter) -> BillingResult<Vec<Payment>> {
        let mut tx = self.ctx.begin().await?;
        Ok(tx.list_payments(filter).await?)
    }
}
