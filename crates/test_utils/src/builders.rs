//! Test Data Builders
//!
//! Provides builder patterns for constructing requests with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use chrono::NaiveDate;
use core_kernel::{AcademicPeriod, InvoiceId, Money, StudentId};
use domain_billing::{
    AidType, FinancialAid, GenerateInvoice, PaymentMethod, RecordPayment, RefundRequest, RefundType,
};
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::fixtures::{money, DateFixtures, FeeFixtures, StudentFixtures};

/// Builder for invoice generation requests
pub struct GenerateInvoiceBuilder {
    student_id: StudentId,
    period: AcademicPeriod,
    department: String,
    student_category: String,
    credits: u32,
}

impl Default for GenerateInvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerateInvoiceBuilder {
    /// Creates a new builder for 15 CS undergraduate credits in Fall 2024-2025
    pub fn new() -> Self {
        Self {
            student_id: StudentFixtures::student(),
            period: StudentFixtures::fall_2024(),
            department: FeeFixtures::DEPARTMENT.to_string(),
            student_category: FeeFixtures::CATEGORY.to_string(),
            credits: 15,
        }
    }

    pub fn with_student(mut self, student_id: StudentId) -> Self {
        self.student_id = student_id;
        self
    }

    pub fn with_period(mut self, period: AcademicPeriod) -> Self {
        self.period = period;
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = department.into();
        self
    }

    pub fn with_credits(mut self, credits: u32) -> Self {
        self.credits = credits;
        self
    }

    pub fn build(self) -> GenerateInvoice {
        GenerateInvoice {
            student_id: self.student_id,
            period: self.period,
            department: self.department,
            student_category: self.student_category,
            credits: self.credits,
        }
    }
}

/// Builder for payment requests
pub struct PaymentBuilder {
    request: RecordPayment,
}

impl PaymentBuilder {
    /// Creates a bank transfer with a unique reference number
    pub fn new(amount: Money) -> Self {
        Self {
            request: RecordPayment {
                student_id: StudentFixtures::student(),
                amount,
                reference_number: format!("RCPT-{}", Uuid::new_v4().simple()),
                method: PaymentMethod::BankTransfer,
                payment_date: None,
                invoice_id: None,
                notes: None,
                period: None,
            },
        }
    }

    pub fn for_student(mut self, student_id: StudentId) -> Self {
        self.request.student_id = student_id;
        self
    }

    pub fn for_invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.request.invoice_id = Some(invoice_id);
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.request.reference_number = reference.into();
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.request.payment_date = Some(date);
        self
    }

    pub fn build(self) -> RecordPayment {
        self.request
    }
}

/// Builder for financial aid awards
pub struct AidBuilder {
    student_id: StudentId,
    period: AcademicPeriod,
    aid_type: AidType,
    amount: Money,
    refundable: bool,
}

impl Default for AidBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AidBuilder {
    /// A $1000 non-refundable scholarship for Fall 2024-2025
    pub fn new() -> Self {
        Self {
            student_id: StudentFixtures::student(),
            period: StudentFixtures::fall_2024(),
            aid_type: AidType::Scholarship,
            amount: money(dec!(1000)),
            refundable: false,
        }
    }

    pub fn with_student(mut self, student_id: StudentId) -> Self {
        self.student_id = student_id;
        self
    }

    pub fn with_period(mut self, period: AcademicPeriod) -> Self {
        self.period = period;
        self
    }

    pub fn with_type(mut self, aid_type: AidType) -> Self {
        self.aid_type = aid_type;
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn refundable(mut self) -> Self {
        self.refundable = true;
        self
    }

    pub fn build(self) -> FinancialAid {
        FinancialAid::new(self.student_id, self.aid_type, self.amount, self.period, DateFixtures::recorded_at())
            .expect("valid aid fixture")
            .refundable(self.refundable)
    }
}

/// Builds a bank-transfer refund request
pub fn refund_request(student_id: StudentId, amount: Money) -> RefundRequest {
    RefundRequest {
        student_id,
        amount,
        reason: "Overpayment".to_string(),
        refund_type: RefundType::BankTransfer,
        holding_semester: None,
        period: None,
    }
}
