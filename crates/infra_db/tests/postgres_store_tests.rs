//! Billing workflows against a real PostgreSQL store
//!
//! These tests start a Postgres container and are ignored by default; run
//! them with `cargo test -p infra_db -- --ignored`.

use std::sync::Arc;

use rust_decimal_macros::dec;

use core_kernel::{AdapterHealth, FixedClock, HealthCheckable, Rate};
use domain_billing::{
    BillingContext, BillingServices, BillingSettings, BillingStore, BillingTransaction, InvoiceFilter, InvoiceStatus, LedgerQuery,
    PaymentLedgering, TransactionType,
};
use infra_db::PostgresBillingStore;
use test_utils::{
    assert_conflict, assert_invalid, assert_invoice_consistent, assert_money_eq, assert_running_balance_chain, money, refund_request,
    AidBuilder, DateFixtures, FeeFixtures, GenerateInvoiceBuilder, PaymentBuilder, StudentFixtures, TestDatabase,
};

fn services(db: &TestDatabase, clock: &FixedClock, settings: BillingSettings) -> BillingServices {
    let store: Arc<dyn BillingStore> = Arc::new(db.store());
    BillingServices::new(BillingContext::new(store, Arc::new(clock.clone()), settings))
}

test_utils::db_test!(health_check_reports_healthy, |db| {
    let store = db.store();
    let health = store.health_check().await;
    assert_eq!(health.status, AdapterHealth::Healthy);
    assert_eq!(health.adapter_id, "postgres-billing-store");
});

test_utils::db_test!(fee_structure_round_trips_with_items, |db| {
    let clock = FixedClock::new(DateFixtures::term_start());
    let billing = services(&db, &clock, BillingSettings::default());

    let saved = billing.fees.save(FeeFixtures::cs_undergraduate_with_extras()).await.unwrap();
    let loaded = billing.fees.lookup(&FeeFixtures::cs_undergraduate_key()).await.unwrap();
    assert_eq!(loaded.id, saved.id);
    assert_eq!(loaded.items, saved.items);

    let mut replacement = FeeFixtures::cs_undergraduate();
    replacement.per_credit_rate = money(dec!(250));
    let replaced = billing.fees.save(replacement).await.unwrap();
    assert_eq!(replaced.id, saved.id);
    assert_eq!(billing.fees.get(saved.id).await.unwrap().items.len(), 1);

    billing.fees.delete(saved.id).await.unwrap();
    assert!(billing.fees.list().await.unwrap().is_empty());
});

test_utils::db_test!(invoice_lifecycle_persists_amounts_and_entries, |db| {
    let clock = FixedClock::new(DateFixtures::term_start());
    let billing = services(&db, &clock, BillingSettings::default());
    billing.fees.save(FeeFixtures::cs_undergraduate()).await.unwrap();

    let invoice = billing
        .invoices
        .generate_invoice(GenerateInvoiceBuilder::new().build())
        .await
        .unwrap();
    assert_money_eq(invoice.total_amount, dec!(3050));

    let by_number = billing.invoices.get_by_number(&invoice.invoice_number).await.unwrap();
    assert_eq!(by_number.id, invoice.id);
    assert_eq!(by_number.line_items.len(), invoice.line_items.len());

    billing
        .payments
        .record(PaymentBuilder::new(money(dec!(2050))).for_invoice(invoice.id).build())
        .await
        .unwrap();

    clock.set(DateFixtures::ten_days_overdue());
    let increase = billing
        .invoices
        .apply_late_fee(invoice.id, Rate::from_percentage(dec!(1)))
        .await
        .unwrap();
    assert_money_eq(increase, dec!(100));

    let reloaded = billing.invoices.get(invoice.id).await.unwrap();
    assert_eq!(reloaded.status, InvoiceStatus::Overdue);
    assert_invoice_consistent(&reloaded);

    let overdue = billing
        .invoices
        .list(&InvoiceFilter::with_status(InvoiceStatus::Overdue))
        .await
        .unwrap();
    assert_eq!(overdue.len(), 1);

    let history = billing.ledger.history(&invoice.student_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_running_balance_chain(&history);
});

test_utils::db_test!(duplicate_payment_reference_is_rejected, |db| {
    let clock = FixedClock::new(DateFixtures::term_start());
    let billing = services(&db, &clock, BillingSettings::default());

    billing
        .payments
        .record(PaymentBuilder::new(money(dec!(100))).with_reference("RCPT-1").build())
        .await
        .unwrap();
    let result = billing
        .payments
        .record(PaymentBuilder::new(money(dec!(50))).with_reference("RCPT-1").build())
        .await;
    assert_invalid(result, "already exists");
});

test_utils::db_test!(aid_and_refund_flow, |db| {
    let clock = FixedClock::new(DateFixtures::term_start());
    let billing = services(&db, &clock, BillingSettings::default());
    billing.fees.save(FeeFixtures::cs_undergraduate()).await.unwrap();
    let invoice = billing
        .invoices
        .generate_invoice(GenerateInvoiceBuilder::new().build())
        .await
        .unwrap();

    billing
        .aid
        .create(AidBuilder::new().with_amount(money(dec!(4000))).refundable().build())
        .await
        .unwrap();
    billing
        .aid
        .apply_to_student(&invoice.student_id, &invoice.period)
        .await
        .unwrap();

    let credit = billing.refunds.credit_balance(&invoice.student_id).await.unwrap();
    assert_money_eq(credit, dec!(950));

    let refund = billing
        .refunds
        .process_refund(refund_request(invoice.student_id.clone(), money(dec!(500))))
        .await
        .unwrap();
    billing.refunds.approve(refund.id, "bursar").await.unwrap();
    billing.refunds.complete(refund.id, "bursar", Some("BANK-9".into())).await.unwrap();

    let statement = billing
        .ledger
        .tax_statement(&invoice.student_id, 2024)
        .await
        .unwrap();
    assert_money_eq(statement.total_for(TransactionType::Refund), dec!(500));
    assert_money_eq(statement.closing_balance, dec!(450));
});

test_utils::db_test!(concurrent_payments_serialize_on_ledger_head, |db| {
    let clock = FixedClock::new(DateFixtures::term_start());
    let settings = BillingSettings::default().with_payment_ledgering(PaymentLedgering::LedgerEntry);
    let billing = services(&db, &clock, settings);
    billing.fees.save(FeeFixtures::cs_undergraduate()).await.unwrap();
    billing
        .invoices
        .generate_invoice(GenerateInvoiceBuilder::new().build())
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let payments = billing.payments.clone();
        tasks.push(tokio::spawn(async move {
            payments.record(PaymentBuilder::new(money(dec!(10))).build()).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let student = StudentFixtures::student();
    let history = billing.ledger.entries(&student, &LedgerQuery::All).await.unwrap();
    assert_eq!(history.len(), 11);
    assert_running_balance_chain(&history);
    assert_money_eq(history.last().unwrap().running_balance, dec!(-2950));
});

test_utils::db_test!(racing_revokes_unwind_applied_aid_once, |db| {
    let clock = FixedClock::new(DateFixtures::term_start());
    let billing = services(&db, &clock, BillingSettings::default());
    billing.fees.save(FeeFixtures::cs_undergraduate()).await.unwrap();
    let invoice = billing
        .invoices
        .generate_invoice(GenerateInvoiceBuilder::new().build())
        .await
        .unwrap();
    let aid = billing.aid.create(AidBuilder::new().build()).await.unwrap();
    billing
        .aid
        .apply_to_student(&invoice.student_id, &invoice.period)
        .await
        .unwrap();

    let first = tokio::spawn({
        let aid_service = billing.aid.clone();
        async move { aid_service.revoke(aid.id, "first").await }
    });
    let second = tokio::spawn({
        let aid_service = billing.aid.clone();
        async move { aid_service.revoke(aid.id, "second").await }
    });
    let (first, second) = (first.await.unwrap(), second.await.unwrap());

    assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);
    assert_conflict(if first.is_ok() { second } else { first });

    let history = billing.ledger.history(&invoice.student_id).await.unwrap();
    let reversals = history
        .iter()
        .filter(|entry| entry.transaction_type == TransactionType::Reversal)
        .count();
    assert_eq!(reversals, 1);
    assert_running_balance_chain(&history);

    let reloaded = billing.invoices.get(invoice.id).await.unwrap();
    assert_money_eq(reloaded.financial_aid_amount, dec!(0));
    assert_money_eq(reloaded.outstanding_balance, dec!(3050));
});

test_utils::db_test!(concurrent_payments_on_one_invoice_all_count, |db| {
    let clock = FixedClock::new(DateFixtures::term_start());
    let billing = services(&db, &clock, BillingSettings::default());
    billing.fees.save(FeeFixtures::cs_undergraduate()).await.unwrap();
    let invoice = billing
        .invoices
        .generate_invoice(GenerateInvoiceBuilder::new().build())
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let payments = billing.payments.clone();
        let invoice_id = invoice.id;
        tasks.push(tokio::spawn(async move {
            payments
                .record(PaymentBuilder::new(money(dec!(25))).for_invoice(invoice_id).build())
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let reloaded = billing.invoices.get(invoice.id).await.unwrap();
    assert_money_eq(reloaded.amount_paid, dec!(200));
    assert_money_eq(reloaded.outstanding_balance, dec!(2850));
    assert_invoice_consistent(&reloaded);
});

test_utils::db_test!(dropped_transaction_rolls_back, |db| {
    let store = db.store();
    let clock = FixedClock::new(DateFixtures::term_start());
    let billing = services(&db, &clock, BillingSettings::default());
    billing.fees.save(FeeFixtures::cs_undergraduate()).await.unwrap();
    let invoice = billing
        .invoices
        .generate_invoice(GenerateInvoiceBuilder::new().build())
        .await
        .unwrap();

    {
        let mut tx = store.begin().await.unwrap();
        let mut copy = tx.get_invoice(invoice.id).await.unwrap().unwrap();
        copy.notes = Some("never committed".into());
        tx.update_invoice(&copy).await.unwrap();
    }

    let reloaded = billing.invoices.get(invoice.id).await.unwrap();
    assert_eq!(reloaded.notes, invoice.notes);
});
