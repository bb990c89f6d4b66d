//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating billing data that respects
//! domain invariants.

use core_kernel::Money;
use domain_billing::TransactionType;
use proptest::prelude::*;

/// Strategy for generating valid positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..100_000_000i64
}

/// Strategy for generating positive Money values up to $1,000,000
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(Money::from_minor)
}

/// Strategy for credit loads a student can register for
pub fn credits_strategy() -> impl Strategy<Value = u32> {
    1u32..=24
}

/// Strategy for any ledger transaction type
pub fn transaction_type_strategy() -> impl Strategy<Value = TransactionType> {
    proptest::sample::select(TransactionType::ALL.to_vec())
}

/// Strategy for an amount valid for the transaction type
///
/// Adjustments may be negative; every other type takes a positive amount.
pub fn ledger_posting_strategy() -> impl Strategy<Value = (TransactionType, Money)> {
    (transaction_type_strategy(), positive_money_strategy(), any::<bool>()).prop_map(|(tx, amount, negate)| {
        if tx == TransactionType::Adjustment && negate {
            (tx, -amount)
        } else {
            (tx, amount)
        }
    })
}
