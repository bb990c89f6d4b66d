//! Payment DTOs

use chrono::NaiveDate;
use serde::Deserialize;

use core_kernel::{DateRange, StudentId};
use domain_billing::PaymentFilter;

use crate::error::ApiError;

/// `GET /payments?student_id&from&to`
#[derive(Debug, Default, Deserialize)]
pub struct PaymentListParams {
    pub student_id: Option<StudentId>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl TryFrom<PaymentListParams> for PaymentFilter {
    type Error = ApiError;

    fn try_from(params: PaymentListParams) -> Result<Self, Self::Error> {
        let between = match (params.from, params.to) {
            (Some(from), Some(to)) => Some(DateRange::new(from, to)?),
            (None, None) => None,
            _ => return Err(ApiError::BadRequest("from and to must be given together".to_string())),
        };
        Ok(PaymentFilter {
            student_id: params.student_id,
            between,
        })
    }
}
