use std::sync::Arc;

use tracing::{info, instrument, warn};

use core_kernel::{AcademicPeriod, FinancialAidId, StudentId};

use crate::aid::{AidStatus, AlwaysEligible, EligibilityPolicy, FinancialAid, INELIGIBLE_REASON};
use crate::error::{BillingError, BillingResult};
use crate::ledger::{EntryDraft, ReferenceType, TransactionType};
use crate::ports::{AidFilter, InvoiceFilter};

use super::{found, lock_student, post_entry, BillingContext};

/// Applies pending aid to invoices and unwinds revoked aid
#[derive(Clone)]
pub struct FinancialAidAllocator {
    ctx: BillingContext,
    eligibility: Arc<dyn EligibilityPolicy>,
}

impl FinancialAidAllocator {
    /// Creates an allocator that treats every award as eligible
    pub fn new(ctx: BillingContext) -> Self {
        Self::with_eligibility(ctx, Arc::new(AlwaysEligible))
    }

    pub fn with_eligibility(ctx: BillingContext, eligibility: Arc<dyn EligibilityPolicy>) -> Self {
        Self { ctx, eligibility }
    }

    /// Records a new award as PENDING
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the award is not pending or its amount is not
    /// positive.
    #[instrument(skip(self, aid), fields(student_id = %aid.student_id, period = %aid.period))]
    pub async fn create(&self, aid: FinancialAid) -> BillingResult<FinancialAid> {
        if !aid.amount.is_positive() {
            return Err(BillingError::invalid("aid amount must be positive"));
        }
        if aid.status != AidStatus::Pending {
            return Err(BillingError::invalid(format!("new aid must be PENDING, got {}", aid.status)));
        }

        let mut tx = self.ctx.begin().await?;
        tx.insert_aid(&aid).await?;
        tx.commit().await?;
        info!(aid_id = %aid.id, amount = %aid.amount, aid_type = %aid.aid_type, "Financial aid created");
        Ok(aid)
    }

    pub async fn get(&self, id: FinancialAidId) -> BillingResult<FinancialAid> {
        let mut tx = self.ctx.begin().await?;
        found(tx.get_aid(id).await?, "Financial aid", id)
    }

    pub async fn list_for_student(&self, student_id: &StudentId) -> BillingResult<Vec<FinancialAid>> {
        let mut tx = self.ctx.begin().await?;
        Ok(tx.list_aid(&AidFilter::for_student(student_id.clone())).await?)
    }

    pub async fn list_for_period(&self, period: &AcademicPeriod) -> BillingResult<Vec<FinancialAid>> {
        let mut tx = self.ctx.begin().await?;
        Ok(tx.list_aid(&AidFilter::for_period(period.clone())).await?)
    }

    /// Sweeps every pending award in the system
    ///
    /// Awards are grouped by student and period and each group is applied in
    /// its own transaction. A group that fails is logged and skipped.
    ///
    /// # Returns
    ///
    /// Every award the sweep attempted, in its state after the sweep
    #[instrument(skip(self))]
    pub async fn allocate(&self) -> BillingResult<Vec<FinancialAid>> {
        let pending = {
            let mut tx = self.ctx.begin().await?;
            tx.list_aid(&AidFilter::pending()).await?
        };

        let mut groups: Vec<(StudentId, AcademicPeriod)> = Vec::new();
        for aid in &pending {
            let group = (aid.student_id.clone(), aid.period.clone());
            if !groups.contains(&group) {
                groups.push(group);
            }
        }

        let mut failed = 0usize;
        for (student_id, period) in &groups {
            if let Err(error) = self.apply_to_student(student_id, period).await {
                failed += 1;
                warn!(student_id = %student_id, period = %period, %error, "Skipping aid group in allocation sweep");
            }
        }

        let mut tx = self.ctx.begin().await?;
        let mut attempted = Vec::with_capacity(pending.len());
        for aid in pending {
            attempted.push(tx.get_aid(aid.id).await?.unwrap_or(aid));
        }

        info!(groups = groups.len(), failed, attempted = attempted.len(), "Aid allocation sweep finished");
        Ok(attempted)
    }

    /// Applies a student's pending aid for a period to their open invoice
    ///
    /// Awards are taken in creation order. Ineligible awards are revoked.
    /// Non-refundable awards are capped at what is still outstanding; awards
    /// that no longer fit are left pending.
    ///
    /// # Returns
    ///
    /// The first award applied
    ///
    /// # Errors
    ///
    /// `NotFound` if there is no pending aid or no invoice with an outstanding
    /// balance; `InvalidArgument` if nothing could be applied.
    #[instrument(skip(self, student_id, period), fields(student_id = %student_id, period = %period))]
    pub async fn apply_to_student(&self, student_id: &StudentId, period: &AcademicPeriod) -> BillingResult<FinancialAid> {
        let today = self.ctx.today();
        let now = self.ctx.now();

        let mut tx = self.ctx.begin_for(student_id).await?;
        let pending = tx
            .list_aid(&AidFilter {
                student_id: Some(student_id.clone()),
                period: Some(period.clone()),
                status: Some(AidStatus::Pending),
            })
            .await?;
        if pending.is_empty() {
            return Err(BillingError::not_found(
                "Pending financial aid",
                format!("{student_id} {period}"),
            ));
        }

        let mut invoice = tx
            .list_invoices(&InvoiceFilter::for_student(student_id.clone()).in_period(period.clone()))
            .await?
            .into_iter()
            .find(|invoice| invoice.is_open())
            .ok_or_else(|| {
                BillingError::not_found(
                    "Invoice with outstanding balance",
                    format!("{student_id} {period} (generate an invoice first)"),
                )
            })?;

        let mut applied: Vec<FinancialAid> = Vec::new();
        for mut aid in pending {
            if !self.eligibility.is_eligible(&aid, &invoice) {
                aid.revoke(INELIGIBLE_REASON, now)?;
                tx.update_aid(&aid).await?;
                info!(aid_id = %aid.id, "Financial aid revoked as ineligible");
                continue;
            }

            let amount = aid.applicable_amount(invoice.outstanding_balance);
            if amount.is_zero() {
                continue;
            }

            aid.mark_applied(amount, invoice.id, now);
            tx.update_aid(&aid).await?;
            invoice.add_financial_aid(amount, today);

            let draft = EntryDraft::new(
                student_id.clone(),
                period.clone(),
                TransactionType::FinancialAid,
                amount,
                (ReferenceType::FinancialAid, *aid.id.as_uuid()),
                format!("{} applied to invoice {}", aid.aid_type, invoice.invoice_number),
                today,
            )?;
            post_entry(tx.as_mut(), draft, now).await?;

            info!(aid_id = %aid.id, amount = %amount, invoice_number = %invoice.invoice_number, "Financial aid applied");
            applied.push(aid);
        }

        if applied.is_empty() {
            return Err(BillingError::invalid(
                "no financial aid was applied: all amounts may have been capped or invoice already paid",
            ));
        }

        invoice.touch(now);
        tx.update_invoice(&invoice).await?;
        tx.commit().await?;
        Ok(applied.swap_remove(0))
    }

    /// Revokes an award, unwinding it if it had been applied
    ///
    /// Applied aid is taken back off its invoice and a REVERSAL entry for the
    /// same amount cancels the original ledger credit.
    ///
    /// # Errors
    ///
    /// `StateConflict` if the award is already revoked.
    #[instrument(skip(self, id, reason), fields(aid_id = %id))]
    pub async fn revoke(&self, id: FinancialAidId, reason: &str) -> BillingResult<FinancialAid> {
        let today = self.ctx.today();
        let now = self.ctx.now();

        let mut tx = self.ctx.begin().await?;
        let student_id = found(tx.get_aid(id).await?, "Financial aid", id)?.student_id;
        lock_student(tx.as_mut(), &student_id).await?;

        let mut aid = found(tx.get_aid(id).await?, "Financial aid", id)?;
        let unwind = aid.revoke(reason, now)?;
        tx.update_aid(&aid).await?;

        if let Some((invoice_id, amount)) = unwind {
            let mut invoice = found(tx.get_invoice(invoice_id).await?, "Invoice", invoice_id)?;
            invoice.remove_financial_aid(amount, today);
            invoice.touch(now);
            tx.update_invoice(&invoice).await?;

            let draft = EntryDraft::new(
                aid.student_id.clone(),
                aid.period.clone(),
                TransactionType::Reversal,
                amount,
                (ReferenceType::FinancialAid, *aid.id.as_uuid()),
                format!("{} revoked: {reason}", aid.aid_type),
                today,
            )?;
            post_entry(tx.as_mut(), draft, now).await?;
        }

        tx.commit().await?;
        info!(amount = %aid.amount, "Financial aid revoked");
        Ok(aid)
    }
}
