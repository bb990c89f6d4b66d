//! Invoice DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, StudentId};
use domain_billing::{FeeStructureKey, Invoice, InvoiceFilter, InvoiceStatus};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CalculateTuitionRequest {
    pub academic_year: String,
    pub department: String,
    pub student_category: String,
    pub credits: u32,
}

impl CalculateTuitionRequest {
    pub fn key(&self) -> Result<FeeStructureKey, ApiError> {
        Ok(FeeStructureKey::new(
            self.academic_year.clone(),
            self.department.clone(),
            self.student_category.clone(),
        )?)
    }
}

/// `GET /invoices?student_id&status`
#[derive(Debug, Default, Deserialize)]
pub struct InvoiceListParams {
    pub student_id: Option<StudentId>,
    pub status: Option<InvoiceStatus>,
}

impl From<InvoiceListParams> for InvoiceFilter {
    fn from(params: InvoiceListParams) -> Self {
        InvoiceFilter {
            student_id: params.student_id,
            status: params.status,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LateFeeRequest {
    /// Daily rate in percent, e.g. `1` for 1% per day overdue
    pub rate_percentage: Decimal,
}

#[derive(Debug, Serialize)]
pub struct LateFeeResponse {
    pub increase: Money,
    pub invoice: Invoice,
}
