//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for billing types that give
//! more meaningful error messages than standard assertions.

use core_kernel::Money;
use domain_billing::{BillingError, BillingResult, Invoice, StatementEntry};
use rust_decimal::Decimal;

/// Asserts that a Money value equals a decimal amount
pub fn assert_money_eq(actual: Money, expected: Decimal) {
    assert_eq!(
        actual,
        Money::new(expected),
        "Money mismatch: actual={}, expected={}",
        actual,
        Money::new(expected)
    );
}

/// Asserts that an invoice's stored outstanding balance matches its amounts
///
/// # Panics
///
/// Panics if `outstanding != max(0, total + late fee - paid - aid)`
pub fn assert_invoice_consistent(invoice: &Invoice) {
    let expected = (invoice.total_amount + invoice.late_fee_amount
        - invoice.amount_paid
        - invoice.financial_aid_amount)
        .non_negative();
    assert_eq!(
        invoice.outstanding_balance, expected,
        "Invoice {} outstanding {} does not match its amounts (expected {})",
        invoice.invoice_number, invoice.outstanding_balance, expected
    );
}

/// Asserts that each entry's balance follows from its predecessor
///
/// # Arguments
///
/// * `entries` - One student's full history in sequence order
///
/// # Panics
///
/// Panics on a broken chain, a gap in sequence numbers, or an entry with both
/// or neither column set.
pub fn assert_running_balance_chain(entries: &[StatementEntry]) {
    let mut previous = Money::zero();
    for (index, entry) in entries.iter().enumerate() {
        assert_eq!(
            entry.sequence,
            index as i64 + 1,
            "Sequence gap at entry {}",
            entry.id
        );
        assert!(
            entry.debit_amount.is_zero() != entry.credit_amount.is_zero(),
            "Entry {} must book exactly one column",
            entry.id
        );
        assert_eq!(
            entry.running_balance,
            previous + entry.debit_amount - entry.credit_amount,
            "Running balance broken at sequence {}",
            entry.sequence
        );
        previous = entry.running_balance;
    }
}

/// Asserts that a result failed with `NotFound`
pub fn assert_not_found<T: std::fmt::Debug>(result: BillingResult<T>) {
    match result {
        Err(BillingError::NotFound { .. }) => {}
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

/// Asserts that a result failed with `InvalidArgument` mentioning `fragment`
pub fn assert_invalid<T: std::fmt::Debug>(result: BillingResult<T>, fragment: &str) {
    match result {
        Err(BillingError::InvalidArgument(message)) => assert!(
            message.contains(fragment),
            "Expected message containing '{}', got '{}'",
            fragment,
            message
        ),
        other => panic!("Expected InvalidArgument, got {:?}", other),
    }
}

/// Asserts that a result failed with `StateConflict`
pub fn assert_conflict<T: std::fmt::Debug>(result: BillingResult<T>) {
    match result {
        Err(BillingError::StateConflict { .. }) => {}
        other => panic!("Expected StateConflict, got {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_assert_money_eq() {
        assert_money_eq(Money::new(dec!(10.5)), dec!(10.50));
    }

    #[test]
    #[should_panic(expected = "Expected NotFound")]
    fn test_assert_not_found_panics_on_ok() {
        assert_not_found(Ok::<_, BillingError>(1));
    }

    #[test]
    fn test_assert_invalid_matches_fragment() {
        assert_invalid::<()>(Err(BillingError::invalid("no credit balance available")), "no credit");
    }
}
