use tracing::{debug, instrument};

use core_kernel::{AcademicPeriod, DateRange, Money, StudentId};

use crate::error::BillingResult;
use crate::ledger::{EntryDraft, LedgerQuery, StatementEntry, TaxStatement};

use super::{post_entry, BillingContext};

/// Appends to and reads from student ledgers
#[derive(Clone)]
pub struct LedgerService {
    ctx: BillingContext,
}

impl LedgerService {
    pub fn new(ctx: BillingContext) -> Self {
        Self { ctx }
    }

    /// Appends one entry in its own transaction
    ///
    /// The running balance is computed from the student's ledger head under
    /// the store's per-student lock.
    #[instrument(skip(self, draft), fields(student_id = %draft.student_id, transaction_type = %draft.transaction_type))]
    pub async fn append(&self, draft: EntryDraft) -> BillingResult<StatementEntry> {
        let mut tx = self.ctx.begin().await?;
        let entry = post_entry(tx.as_mut(), draft, self.ctx.now()).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Entries matching a query, in sequence order
    #[instrument(skip(self, student_id), fields(student_id = %student_id))]
    pub async fn entries(&self, student_id: &StudentId, query: &LedgerQuery) -> BillingResult<Vec<StatementEntry>> {
        let mut tx = self.ctx.begin().await?;
        let entries = tx.list_entries(student_id, query).await?;
        debug!(count = entries.len(), "Ledger entries loaded");
        Ok(entries)
    }

    pub async fn history(&self, student_id: &StudentId) -> BillingResult<Vec<StatementEntry>> {
        self.entries(student_id, &LedgerQuery::All).await
    }

    pub async fn for_period(&self, student_id: &StudentId, period: &AcademicPeriod) -> BillingResult<Vec<StatementEntry>> {
        self.entries(student_id, &LedgerQuery::Period(period.clone())).await
    }

    pub async fn between(&self, student_id: &StudentId, range: DateRange) -> BillingResult<Vec<StatementEntry>> {
        self.entries(student_id, &LedgerQuery::Between(range)).await
    }

    pub async fn for_tax_year(&self, student_id: &StudentId, year: i32) -> BillingResult<Vec<StatementEntry>> {
        self.entries(student_id, &LedgerQuery::TaxYear(year)).await
    }

    /// Running balance after the student's latest entry; zero with no history
    pub async fn current_balance(&self, student_id: &StudentId) -> BillingResult<Money> {
        let mut tx = self.ctx.begin().await?;
        Ok(tx.ledger_head(student_id).await?.balance)
    }

    /// Per-type totals and balances for a calendar year
    #[instrument(skip(self, student_id), fields(student_id = %student_id))]
    pub async fn tax_statement(&self, student_id: &StudentId, year: i32) -> BillingResult<TaxStatement> {
        let history = self.history(student_id).await?;
        Ok(TaxStatement::compile(student_id.clone(), year, &history))
    }
}
