//! Billing services over an in-memory store and a fixed clock

use std::sync::Arc;

use chrono::NaiveDate;
use core_kernel::FixedClock;
use domain_billing::{
    BillingContext, BillingServices, BillingSettings, FeeStructure, InMemoryBillingStore, Invoice,
};

use crate::builders::GenerateInvoiceBuilder;
use crate::fixtures::{DateFixtures, FeeFixtures};

/// A complete billing engine for tests
///
/// The clock starts on [`DateFixtures::term_start`] and can be moved with
/// [`BillingHarness::set_today`] or [`BillingHarness::advance_days`].
pub struct BillingHarness {
    pub store: InMemoryBillingStore,
    pub clock: FixedClock,
    pub billing: BillingServices,
}

impl Default for BillingHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl BillingHarness {
    pub fn new() -> Self {
        Self::with_settings(BillingSettings::default())
    }

    pub fn with_settings(settings: BillingSettings) -> Self {
        let store = InMemoryBillingStore::new();
        let clock = FixedClock::new(DateFixtures::term_start());
        let billing = BillingServices::new(Self::context_for(&store, &clock, settings));
        Self { store, clock, billing }
    }

    fn context_for(store: &InMemoryBillingStore, clock: &FixedClock, settings: BillingSettings) -> BillingContext {
        BillingContext::new(Arc::new(store.clone()), Arc::new(clock.clone()), settings)
    }

    /// A context sharing this harness's store and clock
    pub fn context(&self, settings: BillingSettings) -> BillingContext {
        Self::context_for(&self.store, &self.clock, settings)
    }

    pub fn set_today(&self, today: NaiveDate) {
        self.clock.set(today);
    }

    pub fn advance_days(&self, days: u64) {
        self.clock.advance_days(days);
    }

    /// Saves the CS undergraduate fee structure
    pub async fn seed_fee_structure(&self) -> FeeStructure {
        self.billing
            .fees
            .save(FeeFixtures::cs_undergraduate())
            .await
            .expect("seed fee structure")
    }

    /// Issues the 15-credit CS invoice ($3050) to the default student
    pub async fn issue_standard_invoice(&self) -> Invoice {
        self.seed_fee_structure().await;
        self.billing
            .invoices
            .generate_invoice(GenerateInvoiceBuilder::new().build())
            .await
            .expect("issue standard invoice")
    }
}
