//! Invoices and their status state machine
//!
//! An invoice is created once per student, term and credit load. After that
//! only four amounts move: `amount_paid` (payments), `financial_aid_amount`
//! (aid), `late_fee_amount` (the late-fee job) and, for cancelled invoices, the
//! status. Every mutation goes through [`Invoice::recalculate`], which re-derives
//! the outstanding balance and the status.

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{days_between, AcademicPeriod, InvoiceId, Money, Rate, StudentId};

use crate::codes::code_enum;
use crate::error::{BillingError, BillingResult};
use crate::fee::{FeeItem, FeeStructure};

code_enum! {
    /// Invoice status
    pub enum InvoiceStatus ("invoice status") {
        /// Nothing paid, not yet due
        Unpaid => "UNPAID",
        /// Some payment received, not yet due
        PartiallyPaid => "PARTIALLY_PAID",
        /// Nothing outstanding
        Paid => "PAID",
        /// Past the due date with a balance outstanding
        Overdue => "OVERDUE",
        /// Total was zero when the invoice was issued
        Settled => "SETTLED",
        /// Withdrawn before any money moved
        Cancelled => "CANCELLED",
        /// Money returned to the student
        Refunded => "REFUNDED",
    }
}

impl InvoiceStatus {
    /// Statuses that are only ever set by an explicit operation
    pub fn is_manual(&self) -> bool {
        matches!(self, InvoiceStatus::Cancelled | InvoiceStatus::Refunded)
    }
}

code_enum! {
    /// Kind of invoice line
    pub enum LineItemKind ("line item kind") {
        Tuition => "TUITION",
        Fee => "FEE",
        LateFee => "LATE_FEE",
        Other => "OTHER",
    }
}

/// A line on an invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub description: String,
    pub amount: Money,
    pub kind: LineItemKind,
    pub quantity: Decimal,
    pub unit_price: Money,
}

impl InvoiceLineItem {
    /// Tuition for a credit load at a per-credit rate
    pub fn tuition(credits: u32, per_credit_rate: Money) -> Self {
        let quantity = Decimal::from(credits);
        Self {
            description: format!("Tuition ({credits} credits)"),
            amount: per_credit_rate * quantity,
            kind: LineItemKind::Tuition,
            quantity,
            unit_price: per_credit_rate,
        }
    }

    /// A fixed fee from the catalog
    pub fn fee(item: &FeeItem) -> Self {
        Self {
            description: item.name.clone(),
            amount: item.amount,
            kind: LineItemKind::Fee,
            quantity: Decimal::ONE,
            unit_price: item.amount,
        }
    }
}

/// Tuition priced from a fee structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuitionQuote {
    pub credits: u32,
    pub per_credit_rate: Money,
    pub tuition_amount: Money,
    pub fixed_fees_amount: Money,
    pub other_charges: Money,
    pub total_amount: Money,
    pub line_items: Vec<InvoiceLineItem>,
}

impl TuitionQuote {
    /// `rate × credits + Σ fixed fees + other charges (none today)`
    pub fn price(structure: &FeeStructure, credits: u32) -> BillingResult<Self> {
        if credits == 0 {
            return Err(BillingError::invalid("credits must be positive"));
        }

        let tuition = InvoiceLineItem::tuition(credits, structure.per_credit_rate);
        let tuition_amount = tuition.amount;
        let fixed_fees_amount = structure.total_fixed_fees();
        let other_charges = Money::zero();

        let mut line_items = vec![tuition];
        line_items.extend(structure.fixed_items().map(InvoiceLineItem::fee));

        Ok(Self {
            credits,
            per_credit_rate: structure.per_credit_rate,
            tuition_amount,
            fixed_fees_amount,
            other_charges,
            total_amount: tuition_amount + fixed_fees_amount + other_charges,
            line_items,
        })
    }
}

/// A student invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub student_id: StudentId,
    #[serde(flatten)]
    pub period: AcademicPeriod,
    pub credits: u32,
    pub tuition_amount: Money,
    pub fixed_fees_amount: Money,
    pub other_charges: Money,
    pub late_fee_amount: Money,
    pub financial_aid_amount: Money,
    pub total_amount: Money,
    pub amount_paid: Money,
    pub outstanding_balance: Money,
    pub status: InvoiceStatus,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub line_items: Vec<InvoiceLineItem>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Issues an invoice from a tuition quote
    ///
    /// # Arguments
    ///
    /// * `student_id` - Student being billed
    /// * `period` - Term and academic year billed
    /// * `quote` - Priced tuition and line items
    /// * `issue_date` - Calendar date of issue
    /// * `due_days` - Days from issue until payment is due
    /// * `now` - Creation timestamp
    ///
    /// A zero total is issued SETTLED; anything else starts UNPAID.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the due date falls outside the calendar.
    pub fn issue(
        student_id: StudentId,
        period: AcademicPeriod,
        quote: TuitionQuote,
        issue_date: NaiveDate,
        due_days: u32,
        now: DateTime<Utc>,
    ) -> BillingResult<Self> {
        let due_date = issue_date
            .checked_add_days(Days::new(u64::from(due_days)))
            .ok_or_else(|| {
                BillingError::invalid(format!("due date {due_days} days after {issue_date} is out of range"))
            })?;
        let status = if quote.total_amount.is_zero() {
            InvoiceStatus::Settled
        } else {
            InvoiceStatus::Unpaid
        };

        Ok(Self {
            id: InvoiceId::new(),
            invoice_number: generate_invoice_number(issue_date),
            student_id,
            period,
            credits: quote.credits,
            tuition_amount: quote.tuition_amount,
            fixed_fees_amount: quote.fixed_fees_amount,
            other_charges: quote.other_charges,
            late_fee_amount: Money::zero(),
            financial_aid_amount: Money::zero(),
            total_amount: quote.total_amount,
            amount_paid: Money::zero(),
            outstanding_balance: quote.total_amount,
            status,
            issue_date,
            due_date,
            line_items: quote.line_items,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// `max(0, total + late fee − paid − aid)`
    pub fn computed_outstanding(&self) -> Money {
        (self.total_amount + self.late_fee_amount - self.amount_paid - self.financial_aid_amount)
            .non_negative()
    }

    /// Stamps the last-modified time before the invoice is written back
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    /// True once the due date has passed
    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        today > self.due_date
    }

    /// Re-derives the outstanding balance and status
    ///
    /// Status rules, first match wins: nothing outstanding is PAID (SETTLED
    /// stays SETTLED); paid and past due is OVERDUE; paid is PARTIALLY_PAID;
    /// past due is OVERDUE; otherwise UNPAID. CANCELLED and REFUNDED are left
    /// alone.
    pub fn recalculate(&mut self, today: NaiveDate) {
        self.outstanding_balance = self.computed_outstanding();

        if self.status.is_manual() {
            return;
        }

        self.status = if self.outstanding_balance.is_zero() {
            if self.status == InvoiceStatus::Settled {
                InvoiceStatus::Settled
            } else {
                InvoiceStatus::Paid
            }
        } else if self.amount_paid.is_positive() && self.is_past_due(today) {
            InvoiceStatus::Overdue
        } else if self.amount_paid.is_positive() {
            InvoiceStatus::PartiallyPaid
        } else if self.is_past_due(today) {
            InvoiceStatus::Overdue
        } else {
            InvoiceStatus::Unpaid
        };
    }

    /// True when the invoice can still receive aid, payments or late fees
    pub fn is_open(&self) -> bool {
        !self.status.is_manual() && self.outstanding_balance.is_positive()
    }

    pub fn record_payment(&mut self, amount: Money, today: NaiveDate) {
        self.amount_paid += amount;
        self.recalculate(today);
    }

    /// Takes a reversed payment back out of `amount_paid`
    pub fn reverse_payment(&mut self, amount: Money, today: NaiveDate) {
        self.amount_paid = self.amount_paid.saturating_sub(amount);
        self.recalculate(today);
    }

    pub fn add_financial_aid(&mut self, amount: Money, today: NaiveDate) {
        self.financial_aid_amount += amount;
        self.recalculate(today);
    }

    /// Removes revoked aid, never taking the aid total below zero
    pub fn remove_financial_aid(&mut self, amount: Money, today: NaiveDate) {
        self.financial_aid_amount = self.financial_aid_amount.saturating_sub(amount);
        self.recalculate(today);
    }

    /// Raises the late fee to `base × rate × days overdue`, capped at the total
    ///
    /// `base` is `total − paid − aid`. The fee only ever grows: running the job
    /// twice on the same day changes nothing. Returns the increase, which is
    /// zero when nothing changed.
    pub fn apply_late_fee(&mut self, rate: Rate, today: NaiveDate) -> Money {
        if self.status.is_manual() || !self.outstanding_balance.is_positive() || !self.is_past_due(today) {
            return Money::zero();
        }

        let days_overdue = days_between(self.due_date, today);
        let base = self.total_amount - self.amount_paid - self.financial_aid_amount;
        if !base.is_positive() {
            return Money::zero();
        }

        let computed = base
            .multiply(rate.as_decimal() * Decimal::from(days_overdue))
            .min(self.total_amount);
        if computed <= self.late_fee_amount {
            return Money::zero();
        }

        let increase = computed - self.late_fee_amount;
        self.late_fee_amount = computed;
        self.recalculate(today);
        increase
    }

    /// Withdraws an invoice nothing has been paid or granted against
    ///
    /// Returns the outstanding amount being written back to the student's
    /// ledger. Amounts are left as issued so the outstanding formula still
    /// holds for the record.
    ///
    /// # Errors
    ///
    /// `StateConflict` unless the invoice is UNPAID or OVERDUE with no payment
    /// and no aid against it.
    pub fn cancel(&mut self, reason: &str, at: DateTime<Utc>) -> BillingResult<Money> {
        if !matches!(self.status, InvoiceStatus::Unpaid | InvoiceStatus::Overdue) {
            return Err(BillingError::conflict(
                "Invoice",
                &self.invoice_number,
                self.status,
                "only unpaid or overdue invoices can be cancelled",
            ));
        }
        if self.amount_paid.is_positive() || self.financial_aid_amount.is_positive() {
            return Err(BillingError::conflict(
                "Invoice",
                &self.invoice_number,
                self.status,
                "payments or aid have been applied",
            ));
        }

        let written_back = self.outstanding_balance;
        self.status = InvoiceStatus::Cancelled;
        self.notes = Some(format!("Cancelled: {reason}"));
        self.updated_at = at;
        Ok(written_back)
    }
}

/// Generates a unique invoice number: `INV-<issue date>-<random hex>`
fn generate_invoice_number(issue_date: NaiveDate) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "INV-{}-{}",
        issue_date.format("%Y%m%d"),
        suffix[..10].to_uppercase()
    )
}
