//! Repository implementations for billing records
//!
//! Each module maps one aggregate to its tables: a `FromRow` row type, the
//! conversion back to the domain type, and the queries. Every query runs on a
//! borrowed `PgConnection` so callers decide the transaction boundary; the
//! billing adapter passes its open transaction.
//!
//! Enumerations are stored as their code strings and parsed back with
//! `FromStr`; a value the domain does not know is a `SerializationError`.

pub mod aid;
pub mod fee_structures;
pub mod invoices;
pub mod ledger;
pub mod payments;
pub mod refunds;

use std::fmt::Display;
use std::str::FromStr;

use core_kernel::{AcademicPeriod, Money, StudentId};
use rust_decimal::Decimal;

use crate::error::DatabaseError;

/// Parses a stored code back into its domain type
pub(crate) fn decode<T>(column: &str, value: &str) -> Result<T, DatabaseError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e| DatabaseError::column(column, e))
}

pub(crate) fn student(value: String) -> Result<StudentId, DatabaseError> {
    StudentId::new(value).map_err(|e| DatabaseError::column("student_id", e))
}

pub(crate) fn period(term: String, academic_year: String) -> Result<AcademicPeriod, DatabaseError> {
    AcademicPeriod::new(term, academic_year).map_err(|e| DatabaseError::column("term", e))
}

pub(crate) fn money(value: Decimal) -> Money {
    Money::new(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_billing::InvoiceStatus;

    #[test]
    fn test_decode_known_code() {
        let status: InvoiceStatus = decode("status", "PARTIALLY_PAID").unwrap();
        assert_eq!(status, InvoiceStatus::PartiallyPaid);
    }

    #[test]
    fn test_decode_unknown_code_is_serialization_error() {
        let error = decode::<InvoiceStatus>("status", "LOST").unwrap_err();
        assert!(matches!(error, DatabaseError::SerializationError(_)));
        assert!(error.to_string().contains("status"));
    }

    #[test]
    fn test_blank_student_rejected() {
        assert!(student("  ".to_string()).is_err());
    }
}
