//! Payment recording

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{InvoiceId, Money, PaymentId, StudentId};

use crate::codes::code_enum;
use crate::error::{BillingError, BillingResult};

code_enum! {
    /// Payment method
    pub enum PaymentMethod ("payment method") {
        Cash => "CASH",
        BankTransfer => "BANK_TRANSFER",
        CreditCard => "CREDIT_CARD",
        DebitCard => "DEBIT_CARD",
        Check => "CHECK",
        DirectDebit => "DIRECT_DEBIT",
        DigitalWallet => "DIGITAL_WALLET",
    }
}

code_enum! {
    /// Payment status
    pub enum PaymentStatus ("payment status") {
        /// Payment is being processed
        Pending => "PENDING",
        /// Payment completed successfully
        Completed => "COMPLETED",
        /// Payment failed
        Failed => "FAILED",
        /// Payment was reversed
        Reversed => "REVERSED",
        /// Payment was withdrawn before completing
        Cancelled => "CANCELLED",
    }
}

/// A payment record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub student_id: StudentId,
    /// Invoice the payment is applied to, if any
    pub invoice_id: Option<InvoiceId>,
    pub amount: Money,
    /// External reference (bank ref, receipt number); unique
    pub reference_number: String,
    pub method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a pending payment
    ///
    /// # Arguments
    ///
    /// * `student_id` - Who paid
    /// * `amount` - Payment amount, must be positive
    /// * `reference_number` - External reference, must be unique
    /// * `method` - Payment method
    /// * `payment_date` - Date the money was received
    /// * `now` - Creation timestamp
    pub fn new(
        student_id: StudentId,
        amount: Money,
        reference_number: impl Into<String>,
        method: PaymentMethod,
        payment_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> BillingResult<Self> {
        let reference_number = reference_number.into();
        if !amount.is_positive() {
            return Err(BillingError::invalid("payment amount must be positive"));
        }
        if reference_number.trim().is_empty() {
            return Err(BillingError::invalid("payment reference number must not be blank"));
        }

        Ok(Self {
            id: PaymentId::new(),
            student_id,
            invoice_id: None,
            amount,
            reference_number,
            method,
            payment_date,
            status: PaymentStatus::Pending,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn for_invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.invoice_id = Some(invoice_id);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Marks the payment as completed
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = PaymentStatus::Completed;
        self.updated_at = at;
    }

    /// Reverses the payment, appending the reason to the notes
    ///
    /// # Errors
    ///
    /// `StateConflict` if the payment is already reversed, failed or cancelled.
    pub fn reverse(&mut self, reason: &str, at: DateTime<Utc>) -> BillingResult<()> {
        if matches!(
            self.status,
            PaymentStatus::Reversed | PaymentStatus::Failed | PaymentStatus::Cancelled
        ) {
            return Err(BillingError::conflict(
                "Payment",
                &self.reference_number,
                self.status,
                "only pending or completed payments can be reversed",
            ));
        }

        let line = format!("Reversed: {reason}");
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.is_empty() => format!("{existing}\n{line}"),
            _ => line,
        });
        self.status = PaymentStatus::Reversed;
        self.updated_at = at;
        Ok(())
    }
}
