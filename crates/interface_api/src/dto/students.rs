//! Per-student ledger DTOs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{AcademicPeriod, DateRange, Money, StudentId};
use domain_billing::LedgerQuery;

use crate::error::ApiError;

/// `GET /students/:student_id/ledger`
///
/// At most one selector: `term&year`, `from&to` or `tax_year`. None returns
/// the full history.
#[derive(Debug, Default, Deserialize)]
pub struct LedgerParams {
    pub term: Option<String>,
    pub year: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub tax_year: Option<i32>,
}

impl TryFrom<LedgerParams> for LedgerQuery {
    type Error = ApiError;

    fn try_from(params: LedgerParams) -> Result<Self, Self::Error> {
        let period = match (params.term, params.year) {
            (Some(term), Some(year)) => Some(AcademicPeriod::new(term, year)?),
            (None, None) => None,
            _ => return Err(ApiError::BadRequest("term and year must be given together".to_string())),
        };
        let range = match (params.from, params.to) {
            (Some(from), Some(to)) => Some(DateRange::new(from, to)?),
            (None, None) => None,
            _ => return Err(ApiError::BadRequest("from and to must be given together".to_string())),
        };

        match (period, range, params.tax_year) {
            (None, None, None) => Ok(LedgerQuery::All),
            (Some(period), None, None) => Ok(LedgerQuery::Period(period)),
            (None, Some(range), None) => Ok(LedgerQuery::Between(range)),
            (None, None, Some(year)) => Ok(LedgerQuery::TaxYear(year)),
            _ => Err(ApiError::BadRequest(
                "use only one of term&year, from&to or tax_year".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub student_id: StudentId,
    pub balance: Money,
}

#[derive(Debug, Serialize)]
pub struct CreditBalanceResponse {
    pub student_id: StudentId,
    pub credit_balance: Money,
}
