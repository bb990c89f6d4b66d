//! Financial aid awards
//!
//! Aid is created PENDING and is either applied to an invoice or revoked.
//! Applied aid can still be revoked later, which undoes its effect on the
//! invoice and the ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{AcademicPeriod, FinancialAidId, InvoiceId, Money, StudentId};

use crate::codes::code_enum;
use crate::error::{BillingError, BillingResult};
use crate::invoice::Invoice;

/// Reason recorded when the eligibility policy turns an award down
pub const INELIGIBLE_REASON: &str = "eligibility criteria not met";

code_enum! {
    /// Kind of aid award
    pub enum AidType ("aid type") {
        Scholarship => "SCHOLARSHIP",
        Grant => "GRANT",
        Waiver => "WAIVER",
        Loan => "LOAN",
        Bursary => "BURSARY",
        Sponsorship => "SPONSORSHIP",
    }
}

code_enum! {
    /// Aid lifecycle
    pub enum AidStatus ("aid status") {
        Pending => "PENDING",
        Approved => "APPROVED",
        Applied => "APPLIED",
        Revoked => "REVOKED",
        Expired => "EXPIRED",
        Rejected => "REJECTED",
    }
}

/// A financial aid award for one student and term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialAid {
    pub id: FinancialAidId,
    pub student_id: StudentId,
    pub aid_type: AidType,
    /// Awarded amount; once applied, the amount actually applied
    pub amount: Money,
    #[serde(flatten)]
    pub period: AcademicPeriod,
    /// Advisory only
    pub min_gpa_required: Option<Decimal>,
    /// Advisory only
    pub max_aid_cap: Option<Money>,
    /// Refundable aid may exceed what is outstanding and leave the student in credit
    pub is_refundable: bool,
    pub status: AidStatus,
    pub applied_to_invoice_id: Option<InvoiceId>,
    pub applied_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FinancialAid {
    /// Creates a pending, non-refundable award
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the amount is not positive.
    pub fn new(
        student_id: StudentId,
        aid_type: AidType,
        amount: Money,
        period: AcademicPeriod,
        now: DateTime<Utc>,
    ) -> BillingResult<Self> {
        if !amount.is_positive() {
            return Err(BillingError::invalid("aid amount must be positive"));
        }
        Ok(Self {
            id: FinancialAidId::new(),
            student_id,
            aid_type,
            amount,
            period,
            min_gpa_required: None,
            max_aid_cap: None,
            is_refundable: false,
            status: AidStatus::Pending,
            applied_to_invoice_id: None,
            applied_at: None,
            revoked_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn refundable(mut self, is_refundable: bool) -> Self {
        self.is_refundable = is_refundable;
        self
    }

    pub fn with_eligibility(mut self, min_gpa_required: Option<Decimal>, max_aid_cap: Option<Money>) -> Self {
        self.min_gpa_required = min_gpa_required;
        self.max_aid_cap = max_aid_cap;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == AidStatus::Pending
    }

    /// How much of this award fits against an outstanding balance
    ///
    /// Nothing fits once the balance is exhausted. Non-refundable aid is capped
    /// at the balance; refundable aid applies in full.
    pub fn applicable_amount(&self, outstanding: Money) -> Money {
        if !outstanding.is_positive() {
            return Money::zero();
        }
        if self.amount > outstanding && !self.is_refundable {
            outstanding
        } else {
            self.amount
        }
    }

    /// Marks the award applied for `amount` against an invoice
    pub fn mark_applied(&mut self, amount: Money, invoice_id: InvoiceId, at: DateTime<Utc>) {
        self.amount = amount;
        self.status = AidStatus::Applied;
        self.applied_to_invoice_id = Some(invoice_id);
        self.applied_at = Some(at);
        self.updated_at = at;
    }

    /// Revokes the award
    ///
    /// Returns the invoice and amount to unwind when the award had been applied.
    ///
    /// # Errors
    ///
    /// `StateConflict` if the award is already revoked.
    pub fn revoke(&mut self, reason: impl Into<String>, at: DateTime<Utc>) -> BillingResult<Option<(InvoiceId, Money)>> {
        if self.status == AidStatus::Revoked {
            return Err(BillingError::conflict(
                "Financial aid",
                self.id,
                self.status,
                "aid is already revoked",
            ));
        }

        let unwind = match (self.status, self.applied_to_invoice_id) {
            (AidStatus::Applied, Some(invoice_id)) => Some((invoice_id, self.amount)),
            _ => None,
        };

        self.status = AidStatus::Revoked;
        self.revoked_reason = Some(reason.into());
        self.updated_at = at;
        Ok(unwind)
    }
}

/// Decides whether an award may be applied to an invoice
///
/// The allocator consults this before applying each pending award. Awards it
/// turns down are revoked with [`INELIGIBLE_REASON`].
pub trait EligibilityPolicy: Send + Sync {
    fn is_eligible(&self, aid: &FinancialAid, invoice: &Invoice) -> bool;
}

/// Accepts every award
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysEligible;

impl EligibilityPolicy for AlwaysEligible {
    fn is_eligible(&self, _aid: &FinancialAid, _invoice: &Invoice) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn award(amount: Decimal) -> FinancialAid {
        FinancialAid::new(
            StudentId::new("S-1").unwrap(),
            AidType::Scholarship,
            Money::new(amount),
            AcademicPeriod::new("Fall", "2024-2025").unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_award_is_pending() {
        let aid = award(dec!(500));
        assert!(aid.is_pending());
        assert!(!aid.is_refundable);
        assert!(FinancialAid::new(
            StudentId::new("S-1").unwrap(),
            AidType::Grant,
            Money::zero(),
            AcademicPeriod::new("Fall", "2024-2025").unwrap(),
            Utc::now(),
        )
        .is_err());
    }

    #[test]
    fn test_applicable_amount_caps_non_refundable() {
        let aid = award(dec!(5000));
        assert_eq!(aid.applicable_amount(Money::new(dec!(3050))), Money::new(dec!(3050)));
        assert!(aid.applicable_amount(Money::zero()).is_zero());

        let refundable = award(dec!(5000)).refundable(true);
        assert_eq!(refundable.applicable_amount(Money::new(dec!(3050))), Money::new(dec!(5000)));
    }

    #[test]
    fn test_revoke_applied_returns_unwind() {
        let mut aid = award(dec!(500));
        let invoice_id = InvoiceId::new();
        aid.mark_applied(Money::new(dec!(400)), invoice_id, Utc::now());

        let unwind = aid.revoke("withdrew from course", Utc::now()).unwrap();
        assert_eq!(unwind, Some((invoice_id, Money::new(dec!(400)))));
        assert_eq!(aid.status, AidStatus::Revoked);
        assert_eq!(aid.revoked_reason.as_deref(), Some("withdrew from course"));
    }

    #[test]
    fn test_revoke_pending_has_nothing_to_unwind() {
        let mut aid = award(dec!(500));
        assert_eq!(aid.revoke("duplicate", Utc::now()).unwrap(), None);
    }

    #[test]
    fn test_double_revoke_conflicts() {
        let mut aid = award(dec!(500));
        aid.revoke("first", Utc::now()).unwrap();
        let err = aid.revoke("second", Utc::now()).unwrap_err();
        assert!(matches!(err, BillingError::StateConflict { .. }));
        assert_eq!(aid.revoked_reason.as_deref(), Some("first"));
    }
}
