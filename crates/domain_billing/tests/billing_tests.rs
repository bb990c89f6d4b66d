//! Service-level tests for domain_billing over the in-memory store

use std::sync::Arc;

use rust_decimal_macros::dec;

use core_kernel::{DateRange, Money, Rate};
use domain_billing::{
    AidStatus, AidType, BillingServices, BillingSettings, EligibilityPolicy, FeeItem, FeeStructureStatus,
    FinancialAid, Invoice, InvoiceStatus, LedgerQuery, PaymentLedgering, PaymentStatus, RefundStatus, RefundType,
    TransactionType,
};
use test_utils::{
    assert_conflict, assert_invalid, assert_invoice_consistent, assert_money_eq, assert_not_found,
    assert_running_balance_chain, date, money, refund_request, AidBuilder, BillingHarness, DateFixtures,
    FeeFixtures, GenerateInvoiceBuilder, PaymentBuilder, StudentFixtures,
};

// ============================================================================
// Fee Catalog Tests
// ============================================================================

mod fee_catalog_tests {
    use super::*;

    #[tokio::test]
    async fn test_save_then_lookup() {
        let h = BillingHarness::new();
        let saved = h.seed_fee_structure().await;

        let found = h.billing.fees.lookup(&FeeFixtures::cs_undergraduate_key()).await.unwrap();
        assert_eq!(found.id, saved.id);
        assert_money_eq(found.total_fixed_fees(), dec!(50));
        assert_eq!(h.billing.fees.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_same_key_replaces_items_keeping_identity() {
        let h = BillingHarness::new();
        let original = h.seed_fee_structure().await;

        let mut replacement = FeeFixtures::cs_undergraduate()
            .with_item(FeeItem::fixed("Technology Fee", money(dec!(120))));
        replacement.per_credit_rate = money(dec!(210));

        let saved = h.billing.fees.save(replacement).await.unwrap();
        assert_eq!(saved.id, original.id);
        assert_money_eq(saved.per_credit_rate, dec!(210));
        assert_eq!(saved.items.len(), 2);
        assert_money_eq(saved.total_fixed_fees(), dec!(170));

        let reloaded = h.billing.fees.get(original.id).await.unwrap();
        assert_eq!(reloaded.items, saved.items);
        assert_eq!(h.billing.fees.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_only_fixed_items_count_towards_fixed_fees() {
        let h = BillingHarness::new();
        let saved = h.billing.fees.save(FeeFixtures::cs_undergraduate_with_extras()).await.unwrap();

        assert_eq!(saved.items.len(), 3);
        assert_money_eq(saved.total_fixed_fees(), dec!(50));
    }

    #[tokio::test]
    async fn test_delete_removes_structure() {
        let h = BillingHarness::new();
        let saved = h.seed_fee_structure().await;

        h.billing.fees.delete(saved.id).await.unwrap();
        assert_not_found(h.billing.fees.lookup(&FeeFixtures::cs_undergraduate_key()).await);
        assert_not_found(h.billing.fees.delete(saved.id).await);
    }

    #[tokio::test]
    async fn test_negative_rate_rejected() {
        let h = BillingHarness::new();
        let mut structure = FeeFixtures::cs_undergraduate();
        structure.per_credit_rate = money(dec!(-1));

        assert_invalid(h.billing.fees.save(structure).await, "rate");
    }
}

// ============================================================================
// Invoice Engine Tests
// ============================================================================

mod invoice_engine_tests {
    use super::*;

    #[tokio::test]
    async fn test_calculate_tuition() {
        let h = BillingHarness::new();
        h.seed_fee_structure().await;

        let quote = h
            .billing
            .invoices
            .calculate_tuition(&FeeFixtures::cs_undergraduate_key(), 15)
            .await
            .unwrap();
        assert_money_eq(quote.tuition_amount, dec!(3000));
        assert_money_eq(quote.fixed_fees_amount, dec!(50));
        assert_money_eq(quote.total_amount, dec!(3050));
    }

    #[tokio::test]
    async fn test_calculate_tuition_without_structure_is_not_found() {
        let h = BillingHarness::new();
        assert_not_found(
            h.billing
                .invoices
                .calculate_tuition(&FeeFixtures::cs_undergraduate_key(), 15)
                .await,
        );
    }

    #[tokio::test]
    async fn test_inactive_structure_does_not_price() {
        let h = BillingHarness::new();
        h.billing
            .fees
            .save(FeeFixtures::cs_undergraduate().with_status(FeeStructureStatus::Inactive))
            .await
            .unwrap();

        assert_not_found(
            h.billing
                .invoices
                .generate_invoice(GenerateInvoiceBuilder::new().build())
                .await,
        );
    }

    #[tokio::test]
    async fn test_generate_invoice_charges_ledger() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;

        assert_eq!(invoice.status, InvoiceStatus::Unpaid);
        assert_money_eq(invoice.total_amount, dec!(3050));
        assert_money_eq(invoice.outstanding_balance, dec!(3050));
        assert_eq!(invoice.issue_date, DateFixtures::term_start());
        assert_eq!(invoice.due_date, DateFixtures::due_date());
        assert_eq!(invoice.line_items.len(), 2);
        assert!(invoice.invoice_number.starts_with("INV-20240901-"));

        let history = h.billing.ledger.history(&invoice.student_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].transaction_type, TransactionType::Charge);
        assert_money_eq(history[0].credit_amount, dec!(3050));
        assert_money_eq(history[0].running_balance, dec!(-3050));
    }

    #[tokio::test]
    async fn test_zero_total_invoice_is_settled_without_entry() {
        let h = BillingHarness::new();
        h.billing.fees.save(FeeFixtures::fully_funded("Honors")).await.unwrap();

        let invoice = h
            .billing
            .invoices
            .generate_invoice(GenerateInvoiceBuilder::new().with_department("Honors").build())
            .await
            .unwrap();

        assert_eq!(invoice.status, InvoiceStatus::Settled);
        assert!(h.billing.ledger.history(&invoice.student_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_credits_rejected() {
        let h = BillingHarness::new();
        h.seed_fee_structure().await;

        let result = h
            .billing
            .invoices
            .generate_invoice(GenerateInvoiceBuilder::new().with_credits(0).build())
            .await;
        assert_invalid(result, "credits");
    }

    #[tokio::test]
    async fn test_invoice_queries() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;
        h.billing
            .invoices
            .generate_invoice(
                GenerateInvoiceBuilder::new()
                    .with_student(StudentFixtures::other_student())
                    .build(),
            )
            .await
            .unwrap();

        let by_number = h.billing.invoices.get_by_number(&invoice.invoice_number).await.unwrap();
        assert_eq!(by_number.id, invoice.id);

        let mine = h.billing.invoices.list_for_student(&StudentFixtures::student()).await.unwrap();
        assert_eq!(mine.len(), 1);

        let unpaid = h.billing.invoices.list_by_status(InvoiceStatus::Unpaid).await.unwrap();
        assert_eq!(unpaid.len(), 2);

        let fall = h
            .billing
            .invoices
            .list_for_period(&StudentFixtures::student(), &StudentFixtures::fall_2024())
            .await
            .unwrap();
        assert_eq!(fall.len(), 1);
        let spring = h
            .billing
            .invoices
            .list_for_period(&StudentFixtures::student(), &StudentFixtures::spring_2025())
            .await
            .unwrap();
        assert!(spring.is_empty());

        assert_not_found(h.billing.invoices.get_by_number("INV-19990101-0000000000").await);
    }

    #[tokio::test]
    async fn test_cancel_unpaid_invoice_writes_back_charge() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;

        let cancelled = h.billing.invoices.cancel_invoice(invoice.id, "withdrew").await.unwrap();
        assert_eq!(cancelled.status, InvoiceStatus::Cancelled);
        assert_invoice_consistent(&cancelled);

        let history = h.billing.ledger.history(&invoice.student_id).await.unwrap();
        assert_eq!(history.last().unwrap().transaction_type, TransactionType::Adjustment);
        assert_money_eq(history.last().unwrap().running_balance, dec!(0));
        assert_running_balance_chain(&history);

        assert_conflict(h.billing.invoices.cancel_invoice(invoice.id, "again").await);
    }

    #[tokio::test]
    async fn test_cancel_paid_invoice_conflicts() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;
        h.billing
            .payments
            .record(PaymentBuilder::new(money(dec!(100))).for_invoice(invoice.id).build())
            .await
            .unwrap();

        assert_conflict(h.billing.invoices.cancel_invoice(invoice.id, "withdrew").await);
    }
}

// ============================================================================
// Late Fee Tests
// ============================================================================

mod late_fee_tests {
    use super::*;

    #[tokio::test]
    async fn test_no_late_fee_before_due_date() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;

        h.set_today(DateFixtures::due_date());
        let increase = h
            .billing
            .invoices
            .apply_late_fee(invoice.id, Rate::from_percentage(dec!(1)))
            .await
            .unwrap();
        assert!(increase.is_zero());
    }

    #[tokio::test]
    async fn test_late_fee_capped_at_total() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;

        h.set_today(date(2025, 6, 1));
        let increase = h
            .billing
            .invoices
            .apply_late_fee(invoice.id, Rate::from_percentage(dec!(5)))
            .await
            .unwrap();
        assert_money_eq(increase, dec!(3050));

        let reloaded = h.billing.invoices.get(invoice.id).await.unwrap();
        assert_money_eq(reloaded.late_fee_amount, dec!(3050));
        assert_money_eq(reloaded.outstanding_balance, dec!(6100));
        assert_eq!(reloaded.status, InvoiceStatus::Overdue);
    }

    #[tokio::test]
    async fn test_late_fee_job_sweeps_open_invoices() {
        let h = BillingHarness::new();
        let first = h.issue_standard_invoice().await;
        let second = h
            .billing
            .invoices
            .generate_invoice(
                GenerateInvoiceBuilder::new()
                    .with_student(StudentFixtures::other_student())
                    .build(),
            )
            .await
            .unwrap();
        h.billing
            .payments
            .record(PaymentBuilder::new(money(dec!(3050))).for_invoice(first.id).build())
            .await
            .unwrap();

        h.set_today(DateFixtures::ten_days_overdue());
        let assessed = h
            .billing
            .invoices
            .apply_late_fees(Rate::from_percentage(dec!(1)))
            .await
            .unwrap();

        assert_eq!(assessed.len(), 1);
        assert_eq!(assessed[0].invoice_id, second.id);
        assert_money_eq(assessed[0].increase, dec!(305));

        let rerun = h
            .billing
            .invoices
            .apply_late_fees(Rate::from_percentage(dec!(1)))
            .await
            .unwrap();
        assert!(rerun.is_empty());
    }

    #[tokio::test]
    async fn test_negative_rate_rejected() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;

        let result = h
            .billing
            .invoices
            .apply_late_fee(invoice.id, Rate::from_percentage(dec!(-1)))
            .await;
        assert_invalid(result, "rate");
    }
}

// ============================================================================
// Payment Recorder Tests
// ============================================================================

mod payment_tests {
    use super::*;

    #[tokio::test]
    async fn test_partial_payment_updates_invoice_only() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;

        let payment = h
            .billing
            .payments
            .record(PaymentBuilder::new(money(dec!(1000))).for_invoice(invoice.id).build())
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.payment_date, DateFixtures::term_start());

        let reloaded = h.billing.invoices.get(invoice.id).await.unwrap();
        assert_eq!(reloaded.status, InvoiceStatus::PartiallyPaid);
        assert_money_eq(reloaded.outstanding_balance, dec!(2050));
        assert_invoice_consistent(&reloaded);

        let history = h.billing.ledger.history(&invoice.student_id).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_late_partial_payment_is_overdue() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;

        h.set_today(DateFixtures::ten_days_overdue());
        h.billing
            .payments
            .record(PaymentBuilder::new(money(dec!(1000))).for_invoice(invoice.id).build())
            .await
            .unwrap();

        let reloaded = h.billing.invoices.get(invoice.id).await.unwrap();
        assert_eq!(reloaded.status, InvoiceStatus::Overdue);
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;

        let request = PaymentBuilder::new(money(dec!(100)))
            .for_invoice(invoice.id)
            .with_reference("RCPT-0001")
            .build();
        h.billing.payments.record(request.clone()).await.unwrap();

        assert_invalid(h.billing.payments.record(request).await, "already exists");

        let reloaded = h.billing.invoices.get(invoice.id).await.unwrap();
        assert_money_eq(reloaded.amount_paid, dec!(100));
    }

    #[tokio::test]
    async fn test_payment_requires_existing_invoice_of_same_student() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;

        let missing = PaymentBuilder::new(money(dec!(100)))
            .for_invoice(core_kernel::InvoiceId::new())
            .build();
        assert_not_found(h.billing.payments.record(missing).await);

        let foreign = PaymentBuilder::new(money(dec!(100)))
            .for_student(StudentFixtures::other_student())
            .for_invoice(invoice.id)
            .build();
        assert_invalid(h.billing.payments.record(foreign).await, "does not belong");
    }

    #[tokio::test]
    async fn test_non_positive_payment_rejected() {
        let h = BillingHarness::new();
        assert_invalid(h.billing.payments.record(PaymentBuilder::new(Money::zero()).build()).await, "positive");
    }

    #[tokio::test]
    async fn test_reverse_leaves_invoice_untouched_by_default() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;
        let payment = h
            .billing
            .payments
            .record(PaymentBuilder::new(money(dec!(500))).for_invoice(invoice.id).build())
            .await
            .unwrap();

        let reversed = h.billing.payments.reverse(payment.id, "bounced").await.unwrap();
        assert_eq!(reversed.status, PaymentStatus::Reversed);
        assert!(reversed.notes.unwrap().contains("Reversed: bounced"));

        let reloaded = h.billing.invoices.get(invoice.id).await.unwrap();
        assert_money_eq(reloaded.amount_paid, dec!(500));

        assert_conflict(h.billing.payments.reverse(payment.id, "again").await);
    }

    #[tokio::test]
    async fn test_payment_queries() {
        let h = BillingHarness::new();
        h.issue_standard_invoice().await;
        let early = h
            .billing
            .payments
            .record(
                PaymentBuilder::new(money(dec!(100)))
                    .with_reference("RCPT-EARLY")
                    .on(date(2024, 9, 5))
                    .build(),
            )
            .await
            .unwrap();
        h.billing
            .payments
            .record(PaymentBuilder::new(money(dec!(200))).on(date(2024, 11, 5)).build())
            .await
            .unwrap();

        let found = h.billing.payments.find_by_reference("RCPT-EARLY").await.unwrap();
        assert_eq!(found.id, early.id);

        let all = h.billing.payments.list_for_student(&StudentFixtures::student()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].payment_date <= all[1].payment_date);

        let september = DateRange::new(date(2024, 9, 1), date(2024, 9, 30)).unwrap();
        let in_september = h.billing.payments.list_between(september).await.unwrap();
        assert_eq!(in_september.len(), 1);
        assert_eq!(in_september[0].id, early.id);

        assert_not_found(h.billing.payments.find_by_reference("RCPT-NONE").await);
    }
}

// ============================================================================
// Payment Ledgering Tests
// ============================================================================

mod payment_ledgering_tests {
    use super::*;

    fn ledgered() -> BillingHarness {
        BillingHarness::with_settings(BillingSettings::default().with_payment_ledgering(PaymentLedgering::LedgerEntry))
    }

    #[tokio::test]
    async fn test_payment_appends_debit_entry() {
        let h = ledgered();
        let invoice = h.issue_standard_invoice().await;

        h.billing
            .payments
            .record(PaymentBuilder::new(money(dec!(3500))).for_invoice(invoice.id).build())
            .await
            .unwrap();

        let history = h.billing.ledger.history(&invoice.student_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].transaction_type, TransactionType::Payment);
        assert_money_eq(history[1].debit_amount, dec!(3500));
        assert_money_eq(history[1].running_balance, dec!(450));

        let credit = h.billing.refunds.credit_balance(&invoice.student_id).await.unwrap();
        assert_money_eq(credit, dec!(450));
    }

    #[tokio::test]
    async fn test_reversal_rolls_back_invoice_and_ledger() {
        let h = ledgered();
        let invoice = h.issue_standard_invoice().await;
        let payment = h
            .billing
            .payments
            .record(PaymentBuilder::new(money(dec!(3050))).for_invoice(invoice.id).build())
            .await
            .unwrap();
        assert_eq!(h.billing.invoices.get(invoice.id).await.unwrap().status, InvoiceStatus::Paid);

        h.billing.payments.reverse(payment.id, "chargeback").await.unwrap();

        let reloaded = h.billing.invoices.get(invoice.id).await.unwrap();
        assert_money_eq(reloaded.amount_paid, dec!(0));
        assert_eq!(reloaded.status, InvoiceStatus::Unpaid);

        let history = h.billing.ledger.history(&invoice.student_id).await.unwrap();
        assert_eq!(history.last().unwrap().transaction_type, TransactionType::Reversal);
        assert_money_eq(history.last().unwrap().running_balance, dec!(-3050));
        assert_running_balance_chain(&history);
    }

    #[tokio::test]
    async fn test_unlinked_payment_without_history_needs_period() {
        let h = ledgered();
        let request = PaymentBuilder::new(money(dec!(100))).build();

        assert_invalid(h.billing.payments.record(request.clone()).await, "no billing history");

        let mut with_period = request;
        with_period.period = Some(StudentFixtures::fall_2024());
        h.billing.payments.record(with_period).await.unwrap();
        let balance = h.billing.ledger.current_balance(&StudentFixtures::student()).await.unwrap();
        assert_money_eq(balance, dec!(100));
    }
}

// ============================================================================
// Financial Aid Tests
// ============================================================================

mod financial_aid_tests {
    use super::*;

    struct NobodyEligible;

    impl EligibilityPolicy for NobodyEligible {
        fn is_eligible(&self, _aid: &FinancialAid, _invoice: &Invoice) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_apply_partial_aid() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;
        h.billing.aid.create(AidBuilder::new().build()).await.unwrap();

        let applied = h
            .billing
            .aid
            .apply_to_student(&StudentFixtures::student(), &StudentFixtures::fall_2024())
            .await
            .unwrap();
        assert_eq!(applied.status, AidStatus::Applied);
        assert_eq!(applied.applied_to_invoice_id, Some(invoice.id));
        assert!(applied.applied_at.is_some());

        let reloaded = h.billing.invoices.get(invoice.id).await.unwrap();
        assert_money_eq(reloaded.financial_aid_amount, dec!(1000));
        assert_money_eq(reloaded.outstanding_balance, dec!(2050));
        assert_invoice_consistent(&reloaded);

        let balance = h.billing.ledger.current_balance(&invoice.student_id).await.unwrap();
        assert_money_eq(balance, dec!(-2050));
    }

    #[tokio::test]
    async fn test_apply_without_pending_aid_is_not_found() {
        let h = BillingHarness::new();
        h.issue_standard_invoice().await;

        assert_not_found(
            h.billing
                .aid
                .apply_to_student(&StudentFixtures::student(), &StudentFixtures::fall_2024())
                .await,
        );
    }

    #[tokio::test]
    async fn test_apply_without_invoice_is_not_found() {
        let h = BillingHarness::new();
        h.billing.aid.create(AidBuilder::new().build()).await.unwrap();

        let result = h
            .billing
            .aid
            .apply_to_student(&StudentFixtures::student(), &StudentFixtures::fall_2024())
            .await;
        match result {
            Err(error) => assert!(error.to_string().contains("generate an invoice first")),
            Ok(aid) => panic!("expected NotFound, applied {:?}", aid.id),
        }
    }

    #[tokio::test]
    async fn test_nothing_applied_when_invoice_already_paid() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;
        h.billing
            .payments
            .record(PaymentBuilder::new(money(dec!(3050))).for_invoice(invoice.id).build())
            .await
            .unwrap();
        h.billing.aid.create(AidBuilder::new().build()).await.unwrap();

        assert_not_found(
            h.billing
                .aid
                .apply_to_student(&StudentFixtures::student(), &StudentFixtures::fall_2024())
                .await,
        );
    }

    #[tokio::test]
    async fn test_second_non_refundable_award_left_pending_once_paid_off() {
        let h = BillingHarness::new();
        h.issue_standard_invoice().await;
        let first = h
            .billing
            .aid
            .create(AidBuilder::new().with_amount(money(dec!(3050))).build())
            .await
            .unwrap();
        let second = h
            .billing
            .aid
            .create(AidBuilder::new().with_type(AidType::Grant).with_amount(money(dec!(400))).build())
            .await
            .unwrap();

        let applied = h
            .billing
            .aid
            .apply_to_student(&StudentFixtures::student(), &StudentFixtures::fall_2024())
            .await
            .unwrap();
        assert_eq!(applied.id, first.id);
        assert_eq!(h.billing.aid.get(second.id).await.unwrap().status, AidStatus::Pending);
    }

    #[tokio::test]
    async fn test_ineligible_aid_is_not_applied() {
        let h = BillingHarness::new();
        let billing = BillingServices::with_eligibility(h.context(BillingSettings::default()), Arc::new(NobodyEligible));
        h.issue_standard_invoice().await;
        let aid = billing.aid.create(AidBuilder::new().build()).await.unwrap();

        let result = billing
            .aid
            .apply_to_student(&StudentFixtures::student(), &StudentFixtures::fall_2024())
            .await;
        assert_invalid(result, "capped or invoice already paid");

        // nothing applied means nothing committed
        assert_eq!(billing.aid.get(aid.id).await.unwrap().status, AidStatus::Pending);
    }

    #[tokio::test]
    async fn test_ineligible_award_revoked_when_another_applies() {
        struct OnlyGrants;

        impl EligibilityPolicy for OnlyGrants {
            fn is_eligible(&self, aid: &FinancialAid, _invoice: &Invoice) -> bool {
                aid.aid_type == AidType::Grant
            }
        }

        let h = BillingHarness::new();
        let billing = BillingServices::with_eligibility(h.context(BillingSettings::default()), Arc::new(OnlyGrants));
        h.issue_standard_invoice().await;
        let scholarship = billing.aid.create(AidBuilder::new().build()).await.unwrap();
        let grant = billing
            .aid
            .create(AidBuilder::new().with_type(AidType::Grant).build())
            .await
            .unwrap();

        let applied = billing
            .aid
            .apply_to_student(&StudentFixtures::student(), &StudentFixtures::fall_2024())
            .await
            .unwrap();
        assert_eq!(applied.id, grant.id);

        let revoked = billing.aid.get(scholarship.id).await.unwrap();
        assert_eq!(revoked.status, AidStatus::Revoked);
        assert_eq!(revoked.revoked_reason.as_deref(), Some("eligibility criteria not met"));
    }

    #[tokio::test]
    async fn test_revoke_applied_aid_unwinds_invoice_and_ledger() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;
        let aid = h.billing.aid.create(AidBuilder::new().build()).await.unwrap();
        h.billing
            .aid
            .apply_to_student(&StudentFixtures::student(), &StudentFixtures::fall_2024())
            .await
            .unwrap();

        let revoked = h.billing.aid.revoke(aid.id, "enrollment dropped").await.unwrap();
        assert_eq!(revoked.status, AidStatus::Revoked);

        let reloaded = h.billing.invoices.get(invoice.id).await.unwrap();
        assert_money_eq(reloaded.financial_aid_amount, dec!(0));
        assert_money_eq(reloaded.outstanding_balance, dec!(3050));
        assert_eq!(reloaded.status, InvoiceStatus::Unpaid);

        let history = h.billing.ledger.history(&invoice.student_id).await.unwrap();
        let last = history.last().unwrap();
        assert_eq!(last.transaction_type, TransactionType::Reversal);
        assert_money_eq(last.credit_amount, dec!(1000));
        assert_money_eq(last.running_balance, dec!(-3050));
        assert_running_balance_chain(&history);

        assert_conflict(h.billing.aid.revoke(aid.id, "again").await);
    }

    #[tokio::test]
    async fn test_second_revoke_appends_no_reversal() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;
        let aid = h.billing.aid.create(AidBuilder::new().build()).await.unwrap();
        h.billing
            .aid
            .apply_to_student(&StudentFixtures::student(), &StudentFixtures::fall_2024())
            .await
            .unwrap();
        h.billing.aid.revoke(aid.id, "enrollment dropped").await.unwrap();

        assert_conflict(h.billing.aid.revoke(aid.id, "enrollment dropped").await);

        let history = h.billing.ledger.history(&invoice.student_id).await.unwrap();
        let reversals = history
            .iter()
            .filter(|entry| entry.transaction_type == TransactionType::Reversal)
            .count();
        assert_eq!(reversals, 1);
        assert_money_eq(history.last().unwrap().running_balance, dec!(-3050));
        assert_money_eq(
            h.billing.invoices.get(invoice.id).await.unwrap().outstanding_balance,
            dec!(3050),
        );
    }

    #[tokio::test]
    async fn test_racing_revokes_unwind_once() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;
        let aid = h.billing.aid.create(AidBuilder::new().build()).await.unwrap();
        h.billing
            .aid
            .apply_to_student(&StudentFixtures::student(), &StudentFixtures::fall_2024())
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            h.billing.aid.revoke(aid.id, "first"),
            h.billing.aid.revoke(aid.id, "second"),
        );
        assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);
        assert_conflict(if first.is_ok() { second } else { first });

        let history = h.billing.ledger.history(&invoice.student_id).await.unwrap();
        let reversals = history
            .iter()
            .filter(|entry| entry.transaction_type == TransactionType::Reversal)
            .count();
        assert_eq!(reversals, 1);
        assert_running_balance_chain(&history);
    }

    #[tokio::test]
    async fn test_revoke_pending_aid_touches_nothing_else() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;
        let aid = h.billing.aid.create(AidBuilder::new().build()).await.unwrap();

        h.billing.aid.revoke(aid.id, "withdrawn").await.unwrap();

        let history = h.billing.ledger.history(&invoice.student_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_not_found(
            h.billing
                .aid
                .apply_to_student(&StudentFixtures::student(), &StudentFixtures::fall_2024())
                .await,
        );
    }

    #[tokio::test]
    async fn test_allocation_sweep_skips_failing_groups() {
        let h = BillingHarness::new();
        h.issue_standard_invoice().await;
        let with_invoice = h.billing.aid.create(AidBuilder::new().build()).await.unwrap();
        let without_invoice = h
            .billing
            .aid
            .create(AidBuilder::new().with_student(StudentFixtures::other_student()).build())
            .await
            .unwrap();

        let attempted = h.billing.aid.allocate().await.unwrap();
        assert_eq!(attempted.len(), 2);

        let status_of = |id| attempted.iter().find(|a| a.id == id).map(|a| a.status);
        assert_eq!(status_of(with_invoice.id), Some(AidStatus::Applied));
        assert_eq!(status_of(without_invoice.id), Some(AidStatus::Pending));
    }

    #[tokio::test]
    async fn test_aid_queries() {
        let h = BillingHarness::new();
        h.billing.aid.create(AidBuilder::new().build()).await.unwrap();
        h.billing
            .aid
            .create(AidBuilder::new().with_period(StudentFixtures::spring_2025()).build())
            .await
            .unwrap();

        assert_eq!(h.billing.aid.list_for_student(&StudentFixtures::student()).await.unwrap().len(), 2);
        assert_eq!(
            h.billing.aid.list_for_period(&StudentFixtures::spring_2025()).await.unwrap().len(),
            1
        );
        assert_not_found(h.billing.aid.get(core_kernel::FinancialAidId::new()).await);
    }
}

// ============================================================================
// Refund Processor Tests
// ============================================================================

mod refund_tests {
    use super::*;

    /// Issues the standard invoice and applies $5000 of refundable aid,
    /// leaving the student $1950 in credit
    async fn student_in_credit(h: &BillingHarness) {
        h.issue_standard_invoice().await;
        h.billing
            .aid
            .create(AidBuilder::new().with_amount(money(dec!(5000))).refundable().build())
            .await
            .unwrap();
        h.billing
            .aid
            .apply_to_student(&StudentFixtures::student(), &StudentFixtures::fall_2024())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_credit_balance() {
        let h = BillingHarness::new();
        h.issue_standard_invoice().await;

        let result = h
            .billing
            .refunds
            .process_refund(refund_request(StudentFixtures::student(), money(dec!(10))))
            .await;
        assert_invalid(result, "no credit balance available");
    }

    #[tokio::test]
    async fn test_credit_from_overpaid_invoices() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;
        h.billing
            .payments
            .record(PaymentBuilder::new(money(dec!(3500))).for_invoice(invoice.id).build())
            .await
            .unwrap();

        let credit = h.billing.refunds.credit_balance(&invoice.student_id).await.unwrap();
        assert_money_eq(credit, dec!(450));

        h.billing
            .refunds
            .process_refund(refund_request(invoice.student_id.clone(), money(dec!(200))))
            .await
            .unwrap();
        let credit = h.billing.refunds.credit_balance(&invoice.student_id).await.unwrap();
        assert_money_eq(credit, dec!(250));
    }

    #[tokio::test]
    async fn test_approve_and_complete() {
        let h = BillingHarness::new();
        student_in_credit(&h).await;

        let refund = h
            .billing
            .refunds
            .process_refund(refund_request(StudentFixtures::student(), money(dec!(500))))
            .await
            .unwrap();
        assert_eq!(refund.status, RefundStatus::Pending);

        assert_conflict(h.billing.refunds.complete(refund.id, "cashier", None).await);

        let approved = h.billing.refunds.approve(refund.id, "bursar").await.unwrap();
        assert_eq!(approved.approved_by.as_deref(), Some("bursar"));

        let processed = h
            .billing
            .refunds
            .complete(refund.id, "cashier", Some("BANK-42".to_string()))
            .await
            .unwrap();
        assert_eq!(processed.status, RefundStatus::Processed);
        assert_eq!(processed.bank_reference.as_deref(), Some("BANK-42"));
        assert!(processed.processed_at.is_some());

        assert_conflict(h.billing.refunds.approve(refund.id, "bursar").await);
        assert_eq!(h.billing.refunds.list_for_student(&StudentFixtures::student()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_next_semester_is_held() {
        let h = BillingHarness::new();
        student_in_credit(&h).await;

        let mut request = refund_request(StudentFixtures::student(), money(dec!(300)));
        request.refund_type = RefundType::TransferNextSemester;
        assert_invalid(h.billing.refunds.process_refund(request.clone()).await, "holding semester");

        request.holding_semester = Some("Spring 2024-2025".to_string());
        let refund = h.billing.refunds.process_refund(request).await.unwrap();
        assert_eq!(refund.status, RefundStatus::Held);

        let processed = h.billing.refunds.complete(refund.id, "registrar", None).await.unwrap();
        assert_eq!(processed.status, RefundStatus::Processed);
    }

    #[tokio::test]
    async fn test_reject_reinstates_credit() {
        let h = BillingHarness::new();
        student_in_credit(&h).await;
        let refund = h
            .billing
            .refunds
            .process_refund(refund_request(StudentFixtures::student(), money(dec!(700))))
            .await
            .unwrap();
        assert_money_eq(
            h.billing.refunds.credit_balance(&StudentFixtures::student()).await.unwrap(),
            dec!(1250),
        );

        let rejected = h.billing.refunds.reject(refund.id, "duplicate request").await.unwrap();
        assert_eq!(rejected.status, RefundStatus::Rejected);
        assert_money_eq(
            h.billing.refunds.credit_balance(&StudentFixtures::student()).await.unwrap(),
            dec!(1950),
        );

        let history = h.billing.ledger.history(&StudentFixtures::student()).await.unwrap();
        assert_eq!(history.last().unwrap().transaction_type, TransactionType::Adjustment);
        assert_running_balance_chain(&history);

        assert_conflict(h.billing.refunds.cancel(refund.id, "too late").await);
    }

    #[tokio::test]
    async fn test_unknown_refund_is_not_found() {
        let h = BillingHarness::new();
        assert_not_found(h.billing.refunds.approve(core_kernel::RefundId::new(), "bursar").await);
    }
}

// ============================================================================
// Ledger Query Tests
// ============================================================================

mod ledger_query_tests {
    use super::*;

    #[tokio::test]
    async fn test_period_and_date_range_queries() {
        let h = BillingHarness::new();
        h.issue_standard_invoice().await;

        h.set_today(date(2025, 1, 15));
        h.billing
            .invoices
            .generate_invoice(
                GenerateInvoiceBuilder::new()
                    .with_period(StudentFixtures::spring_2025())
                    .with_credits(12)
                    .build(),
            )
            .await
            .unwrap();

        let student = StudentFixtures::student();
        let fall = h.billing.ledger.for_period(&student, &StudentFixtures::fall_2024()).await.unwrap();
        assert_eq!(fall.len(), 1);

        let january = DateRange::new(date(2025, 1, 1), date(2025, 1, 31)).unwrap();
        let in_january = h.billing.ledger.between(&student, january).await.unwrap();
        assert_eq!(in_january.len(), 1);
        assert_money_eq(in_january[0].credit_amount, dec!(2450));

        let all = h.billing.ledger.entries(&student, &LedgerQuery::All).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].sequence, 2);
        assert_money_eq(all[1].running_balance, dec!(-5500));
    }

    #[tokio::test]
    async fn test_tax_year_requires_matching_academic_year() {
        let h = BillingHarness::new();
        h.issue_standard_invoice().await;

        h.set_today(date(2025, 1, 15));
        h.billing
            .invoices
            .generate_invoice(
                GenerateInvoiceBuilder::new()
                    .with_period(StudentFixtures::spring_2025())
                    .build(),
            )
            .await
            .unwrap();

        let student = StudentFixtures::student();
        assert_eq!(h.billing.ledger.for_tax_year(&student, 2024).await.unwrap().len(), 1);
        // dated 2025 but billed under 2024-2025
        assert!(h.billing.ledger.for_tax_year(&student, 2025).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tax_statement_totals() {
        let h = BillingHarness::new();
        let invoice = h.issue_standard_invoice().await;
        h.billing.aid.create(AidBuilder::new().build()).await.unwrap();
        h.billing
            .aid
            .apply_to_student(&invoice.student_id, &StudentFixtures::fall_2024())
            .await
            .unwrap();

        let statement = h.billing.ledger.tax_statement(&invoice.student_id, 2024).await.unwrap();
        assert_money_eq(statement.opening_balance, dec!(0));
        assert_money_eq(statement.closing_balance, dec!(-2050));
        assert_money_eq(statement.total_for(TransactionType::Charge), dec!(3050));
        assert_money_eq(statement.total_for(TransactionType::FinancialAid), dec!(1000));
        assert!(statement.total_for(TransactionType::Refund).is_zero());
        assert_eq!(statement.entries.len(), 2);
    }
}
