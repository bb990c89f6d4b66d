//! Refunds against a student's credit balance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Money, RefundId, StudentId};

use crate::codes::code_enum;
use crate::error::{BillingError, BillingResult};

code_enum! {
    /// How the money goes back to the student
    pub enum RefundType ("refund type") {
        BankTransfer => "BANK_TRANSFER",
        Check => "CHECK",
        /// Held and carried into a later semester
        TransferNextSemester => "TRANSFER_NEXT_SEMESTER",
        CreditToAccount => "CREDIT_TO_ACCOUNT",
    }
}

code_enum! {
    /// Refund lifecycle
    pub enum RefundStatus ("refund status") {
        Pending => "PENDING",
        Approved => "APPROVED",
        Processing => "PROCESSING",
        Processed => "PROCESSED",
        Held => "HELD",
        Rejected => "REJECTED",
        Cancelled => "CANCELLED",
    }
}

impl RefundStatus {
    /// Statuses from which a refund can still be rejected or cancelled
    pub fn is_open(&self) -> bool {
        matches!(self, RefundStatus::Pending | RefundStatus::Held | RefundStatus::Approved)
    }
}

/// A refund request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    pub student_id: StudentId,
    pub amount: Money,
    pub reason: String,
    pub refund_type: RefundType,
    pub status: RefundStatus,
    pub holding_semester: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub processed_by: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub bank_reference: Option<String>,
    /// Why the refund was rejected or cancelled
    pub closed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Refund {
    /// Creates a refund request
    ///
    /// Transfers to a later semester start HELD and need a holding semester;
    /// everything else starts PENDING.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a non-positive amount or a transfer with no
    /// holding semester.
    pub fn new(
        student_id: StudentId,
        amount: Money,
        reason: impl Into<String>,
        refund_type: RefundType,
        holding_semester: Option<String>,
        now: DateTime<Utc>,
    ) -> BillingResult<Self> {
        if !amount.is_positive() {
            return Err(BillingError::invalid("refund amount must be positive"));
        }

        let holding_semester = holding_semester.filter(|s| !s.trim().is_empty());
        let status = if refund_type == RefundType::TransferNextSemester {
            if holding_semester.is_none() {
                return Err(BillingError::invalid(
                    "a holding semester is required for TRANSFER_NEXT_SEMESTER refunds",
                ));
            }
            RefundStatus::Held
        } else {
            RefundStatus::Pending
        };

        Ok(Self {
            id: RefundId::new(),
            student_id,
            amount,
            reason: reason.into(),
            refund_type,
            status,
            holding_semester,
            approved_by: None,
            approved_at: None,
            processed_by: None,
            processed_at: None,
            bank_reference: None,
            closed_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// True once rejected or cancelled; the amount is back on the student's account
    pub fn is_closed(&self) -> bool {
        matches!(self.status, RefundStatus::Rejected | RefundStatus::Cancelled)
    }

    fn conflict(&self, message: &str) -> BillingError {
        BillingError::conflict("Refund", self.id, self.status, message)
    }

    /// PENDING or HELD → APPROVED
    pub fn approve(&mut self, approved_by: impl Into<String>, at: DateTime<Utc>) -> BillingResult<()> {
        if !matches!(self.status, RefundStatus::Pending | RefundStatus::Held) {
            return Err(self.conflict("only pending or held refunds can be approved"));
        }
        self.status = RefundStatus::Approved;
        self.approved_by = Some(approved_by.into());
        self.approved_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    /// APPROVED or HELD → PROCESSED
    pub fn complete(
        &mut self,
        processed_by: impl Into<String>,
        bank_reference: Option<String>,
        at: DateTime<Utc>,
    ) -> BillingResult<()> {
        if !matches!(self.status, RefundStatus::Approved | RefundStatus::Held) {
            return Err(self.conflict("only approved or held refunds can be completed"));
        }
        self.status = RefundStatus::Processed;
        self.processed_by = Some(processed_by.into());
        self.processed_at = Some(at);
        self.bank_reference = bank_reference;
        self.updated_at = at;
        Ok(())
    }

    pub fn reject(&mut self, reason: impl Into<String>, at: DateTime<Utc>) -> BillingResult<()> {
        self.close(RefundStatus::Rejected, reason.into(), at)
    }

    pub fn cancel(&mut self, reason: impl Into<String>, at: DateTime<Utc>) -> BillingResult<()> {
        self.close(RefundStatus::Cancelled, reason.into(), at)
    }

    fn close(&mut self, status: RefundStatus, reason: String, at: DateTime<Utc>) -> BillingResult<()> {
        if !self.status.is_open() {
            return Err(self.conflict("refund is no longer open"));
        }
        self.status = status;
        self.closed_reason = Some(reason);
        self.updated_at = at;
        Ok(())
    }
}
