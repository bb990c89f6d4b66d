//! Engine settings

use serde::{Deserialize, Serialize};

use crate::codes::code_enum;

/// Days between issue and due date unless configured otherwise
pub const DEFAULT_DUE_DAYS: u32 = 30;

code_enum! {
    /// Whether recording a payment writes to the student ledger
    pub enum PaymentLedgering ("payment ledgering mode") {
        /// Payments only touch the invoice. Refundable credit falls back to
        /// invoice totals when the ledger shows none, and reversing a payment
        /// leaves the invoice alone.
        InvoiceOnly => "INVOICE_ONLY",
        /// Payments append a PAYMENT entry and reversals a REVERSAL entry that
        /// also takes the amount back off the invoice. The ledger is the only
        /// source of refundable credit.
        LedgerEntry => "LEDGER_ENTRY",
    }
}

impl Default for PaymentLedgering {
    fn default() -> Self {
        PaymentLedgering::InvoiceOnly
    }
}

/// Tunables shared by every billing service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingSettings {
    pub due_days: u32,
    pub payment_ledgering: PaymentLedgering,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            due_days: DEFAULT_DUE_DAYS,
            payment_ledgering: PaymentLedgering::default(),
        }
    }
}

impl BillingSettings {
    pub fn with_payment_ledgering(mut self, mode: PaymentLedgering) -> Self {
        self.payment_ledgering = mode;
        self
    }

    pub fn ledgers_payments(&self) -> bool {
        self.payment_ledgering == PaymentLedgering::LedgerEntry
    }
}
