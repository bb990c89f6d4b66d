//! Financial aid DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use core_kernel::{AcademicPeriod, Money, StudentId};
use domain_billing::{AidType, FinancialAid};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateAidRequest {
    pub student_id: StudentId,
    pub aid_type: AidType,
    pub amount: Money,
    pub term: String,
    pub academic_year: String,
    #[serde(default)]
    pub min_gpa_required: Option<Decimal>,
    #[serde(default)]
    pub max_aid_cap: Option<Money>,
    #[serde(default)]
    pub is_refundable: bool,
}

impl CreateAidRequest {
    pub fn into_domain(self, now: DateTime<Utc>) -> Result<FinancialAid, ApiError> {
        let period = AcademicPeriod::new(self.term, self.academic_year)?;
        let aid = FinancialAid::new(self.student_id, self.aid_type, Money::new(self.amount.amount()), period, now)?
            .refundable(self.is_refundable)
            .with_eligibility(self.min_gpa_required, self.max_aid_cap);
        Ok(aid)
    }
}

/// `GET /financial-aid?student_id` or `?term&year`
#[derive(Debug, Default, Deserialize)]
pub struct AidListParams {
    pub student_id: Option<StudentId>,
    pub term: Option<String>,
    pub year: Option<String>,
}

impl AidListParams {
    pub fn period(&self) -> Result<Option<AcademicPeriod>, ApiError> {
        match (&self.term, &self.year) {
            (Some(term), Some(year)) => Ok(Some(AcademicPeriod::new(term.clone(), year.clone())?)),
            (None, None) => Ok(None),
            _ => Err(ApiError::BadRequest("term and year must be given together".to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplyAidRequest {
    pub student_id: StudentId,
    pub term: String,
    pub academic_year: String,
}
