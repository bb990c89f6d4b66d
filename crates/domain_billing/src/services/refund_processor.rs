use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use core_kernel::{AcademicPeriod, Money, RefundId, StudentId};

use crate::error::{BillingError, BillingResult};
use crate::invoice::InvoiceStatus;
use crate::ledger::{EntryDraft, ReferenceType, TransactionType};
use crate::ports::{BillingTransaction, InvoiceFilter};
use crate::refund::{Refund, RefundType};
use crate::settings::PaymentLedgering;

use super::{found, lock_student, post_entry, resolve_period, BillingContext};

/// Request to refund part of a student's credit balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub student_id: StudentId,
    pub amount: Money,
    pub reason: String,
    pub refund_type: RefundType,
    #[serde(default)]
    pub holding_semester: Option<String>,
    /// Period the ledger entry is booked under; defaults to the student's latest
    #[serde(default)]
    pub period: Option<AcademicPeriod>,
}

/// Validates and records refunds against credit balances
#[derive(Clone)]
pub struct RefundProcessor {
    ctx: BillingContext,
}

impl RefundProcessor {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    /// Amount the student could be refunded right now
    pub async fn credit_balance(&self, student_id: &StudentId) -> BillingResult<Money> {
        let mut tx = self.ctx.begin().await?;
        credit_balance(tx.as_mut(), student_id, self.ctx.settings.payment_ledgering).await
    }

    /// Records a refund and books it against the student's ledger
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the amount is not positive, the student has no
    /// credit, the amount exceeds the credit, or a semester transfer has no
    /// holding semester. Nothing is written when any check fails.
    #[instrument(skip(self, request), fields(student_id = %request.student_id, amount = %request.amount))]
    pub async fn process_refund(&self, request: RefundRequest) -> BillingResult<Refund> {
        if !request.amount.is_positive() {
            return Err(BillingError::invalid("refund amount must be positive"));
        }

        let now = self.ctx.now();
        let mut tx = self.ctx.begin_for(&request.student_id).await?;
        let credit = credit_balance(tx.as_mut(), &request.student_id, self.ctx.settings.payment_ledgering).await?;
        if !credit.is_positive() {
            return Err(BillingError::invalid("no credit balance available"));
        }
        if request.amount > credit {
            return Err(BillingError::invalid(format!(
                "refund amount {} exceeds available credit balance {credit}",
                request.amount
            )));
        }

        let refund = Refund::new(
            request.student_id.clone(),
            request.amount,
            request.reason,
            request.refund_type,
            request.holding_semester,
            now,
        )?;
        let period = resolve_period(tx.as_mut(), &refund.student_id, request.period).await?;

        tx.insert_refund(&refund).await?;
        let draft = EntryDraft::new(
            refund.student_id.clone(),
            period,
            TransactionType::Refund,
            refund.amount,
            (ReferenceType::Refund, *refund.id.as_uuid()),
            format!("Refund ({}): {}", refund.refund_type, refund.reason),
            self.ctx.today(),
        )?;
        post_entry(tx.as_mut(), draft, now).await?;
        tx.commit().await?;

        info!(refund_id = %refund.id, status = %refund.status, credit_before = %credit, "Refund processed");
        Ok(refund)
    }

    /// PENDING or HELD → APPROVED
    #[instrument(skip(self, id, approved_by), fields(refund_id = %id))]
    pub async fn approve(&self, id: RefundId, approved_by: &str) -> BillingResult<Refund> {
        let now = self.ctx.now();
        self.transition(id, |refund| refund.approve(approved_by, now)).await
    }

    /// APPROVED or HELD → PROCESSED; invoices are not touched
    #[instrument(skip(self, id, processed_by, bank_reference), fields(refund_id = %id))]
    pub async fn complete(&self, id: RefundId, processed_by: &str, bank_reference: Option<String>) -> BillingResult<Refund> {
        let now = self.ctx.now();
        self.transition(id, |refund| refund.complete(processed_by, bank_reference, now)).await
    }

    /// Rejects an open refund and returns its amount to the student's credit
    #[instrument(skip(self, id, reason), fields(refund_id = %id))]
    pub async fn reject(&self, id: RefundId, reason: &str) -> BillingResult<Refund> {
        let now = self.ctx.now();
        self.close(id, reason, |refund| refund.reject(reason, now)).await
    }

    /// Cancels an open refund and returns its amount to the student's credit
    #[instrument(skip(self, id, reason), fields(refund_id = %id))]
    pub async fn cancel(&self, id: RefundId, reason: &str) -> BillingResult<Refund> {
        let now = self.ctx.now();
        self.close(id, reason, |refund| refund.cancel(reason, now)).await
    }

    pub async fn get(&self, id: RefundId) -> BillingResult<Refund> {
        let mut tx = self.ctx.begin().await?;
        found(tx.get_refund(id).await?, "Refund", id)
    }

    pub async fn list_for_student(&self, student_id: &StudentId) -> BillingResult<Vec<Refund>> {
        let mut tx = self.ctx.begin().await?;
        Ok(tx.list_refunds(student_id).await?)
    }

    async fn transition<F>(&self, id: RefundId, apply: F) -> BillingResult<Refund>
    where
        F: FnOnce(&mut Refund) -> BillingResult<()> + Send,
    {
        let mut tx = self.ctx.begin().await?;
        let mut refund = locked_refund(tx.as_mut(), id).await?;
        apply(&mut refund)?;
        tx.update_refund(&refund).await?;
        tx.commit().await?;
        info!(status = %refund.status, "Refund updated");
        Ok(refund)
    }

    async fn close<F>(&self, id: RefundId, reason: &str, apply: F) -> BillingResult<Refund>
    where
        F: FnOnce(&mut Refund) -> BillingResult<()> + Send,
    {
        let mut tx = self.ctx.begin().await?;
        let mut refund = locked_refund(tx.as_mut(), id).await?;
        apply(&mut refund)?;
        tx.update_refund(&refund).await?;

        let period = resolve_period(tx.as_mut(), &refund.student_id, None).await?;
        let draft = EntryDraft::new(
            refund.student_id.clone(),
            period,
            TransactionType::Adjustment,
            refund.amount,
            (ReferenceType::Refund, *refund.id.as_uuid()),
            format!("Refund {} {}: {reason}", refund.id, refund.status),
            self.ctx.today(),
        )?;
        post_entry(tx.as_mut(), draft, self.ctx.now()).await?;
        tx.commit().await?;

        info!(status = %refund.status, amount = %refund.amount, "Refund closed and amount reinstated");
        Ok(refund)
    }
}

/// Reads a refund under its student's ledger lock
async fn locked_refund(tx: &mut dyn BillingTransaction, id: RefundId) -> BillingResult<Refund> {
    let student_id = found(tx.get_refund(id).await?, "Refund", id)?.student_id;
    lock_student(tx, &student_id).await?;
    found(tx.get_refund(id).await?, "Refund", id)
}

/// Refundable credit for a student
///
/// A positive ledger balance is the credit. Otherwise, unless payments are
/// ledgered, credit is recomputed from invoices as
/// `max(0, Σ(paid + aid) − Σ(total + late fee) − refunded)`, ignoring
/// cancelled invoices and rejected or cancelled refunds.
pub(crate) async fn credit_balance(
    tx: &mut dyn BillingTransaction,
    student_id: &StudentId,
    mode: PaymentLedgering,
) -> BillingResult<Money> {
    let ledger_balance = tx.ledger_head(student_id).await?.balance;
    if ledger_balance.is_positive() || mode == PaymentLedgering::LedgerEntry {
        return Ok(ledger_balance.non_negative());
    }

    let refunded: Money = tx
        .list_refunds(student_id)
        .await?
        .iter()
        .filter(|refund| !refund.is_closed())
        .map(|refund| refund.amount)
        .sum();

    let invoices = tx.list_invoices(&InvoiceFilter::for_student(student_id.clone())).await?;
    let (received, billed) = invoices
        .iter()
        .filter(|invoice| invoice.status != InvoiceStatus::Cancelled)
        .fold((Money::zero(), Money::zero()), |(received, billed), invoice| {
            (
                received + invoice.amount_paid + invoice.financial_aid_amount,
                billed + invoice.total_amount + invoice.late_fee_amount,
            )
        });
    Ok((received - billed - refunded).non_negative())
}
