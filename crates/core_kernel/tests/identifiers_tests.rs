//! Tests for typed identifiers

use core_kernel::{FeeStructureId, FinancialAidId, InvoiceId, LedgerEntryId, PaymentId, RefundId, StudentId};
use uuid::Uuid;

#[test]
fn test_prefixes() {
    assert_eq!(FeeStructureId::prefix(), "FEE");
    assert_eq!(InvoiceId::prefix(), "INV");
    assert_eq!(LedgerEntryId::prefix(), "LED");
    assert_eq!(FinancialAidId::prefix(), "AID");
    assert_eq!(PaymentId::prefix(), "PAY");
    assert_eq!(RefundId::prefix(), "RFD");
}

#[test]
fn test_new_generates_unique_ids() {
    assert_ne!(PaymentId::new(), PaymentId::new());
}

#[test]
fn test_uuid_round_trip() {
    let uuid = Uuid::new_v4();
    let id = FinancialAidId::from(uuid);
    let back: Uuid = id.into();
    assert_eq!(uuid, back);
}

#[test]
fn test_invalid_string_fails_to_parse() {
    assert!("INV-not-a-uuid".parse::<InvoiceId>().is_err());
}

#[test]
fn test_student_id_is_exact() {
    let a: StudentId = "s1001".parse().unwrap();
    let b: StudentId = "S1001".parse().unwrap();
    assert_ne!(a, b);
    assert_eq!(serde_json::to_string(&a).unwrap(), "\"s1001\"");
}
