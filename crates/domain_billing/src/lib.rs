//! Billing Domain - Student Ledger and Settlement Engine
//!
//! This crate bills students for tuition and keeps an append-only account
//! ledger of every financial event against them.
//!
//! # Components
//!
//! - **Fee catalog** ([`FeeCatalog`]): per-credit rates and fee items keyed by
//!   academic year, department and student category
//! - **Invoice engine** ([`InvoiceEngine`]): prices tuition, issues invoices,
//!   runs the invoice status state machine and assesses late fees
//! - **Ledger** ([`LedgerService`]): per-student entries with running balances
//! - **Financial aid allocator** ([`FinancialAidAllocator`]): applies pending
//!   aid to open invoices and unwinds revoked aid
//! - **Refund processor** ([`RefundProcessor`]): refunds against credit balances
//! - **Payment recorder** ([`PaymentRecorder`]): records and reverses payments
//!
//! # Balance Convention
//!
//! Every ledger entry books a positive amount in exactly one column:
//! - Debits (payments, aid) increase the balance
//! - Credits (charges, late fees, refunds, reversals) decrease it
//! - A positive balance is credit held by the student; negative is money owed
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillingContext, BillingServices, BillingSettings, InMemoryBillingStore};
//!
//! let ctx = BillingContext::new(
//!     Arc::new(InMemoryBillingStore::new()),
//!     Arc::new(SystemClock::default()),
//!     BillingSettings::default(),
//! );
//! let billing = BillingServices::new(ctx);
//!
//! let invoice = billing.invoices.generate_invoice(request).await?;
//! let balance = billing.ledger.current_balance(&invoice.student_id).await?;
//! ```

mod codes;

pub mod aid;
pub mod error;
pub mod fee;
pub mod invoice;
pub mod ledger;
pub mod memory;
pub mod payment;
pub mod ports;
pub mod refund;
pub mod services;
pub mod settings;

pub use aid::{AidStatus, AidType, AlwaysEligible, EligibilityPolicy, FinancialAid};
pub use error::{BillingError, BillingResult};
pub use fee::{FeeItem, FeeItemKind, FeeStructure, FeeStructureKey, FeeStructureStatus};
pub use invoice::{Invoice, InvoiceLineItem, InvoiceStatus, LineItemKind, TuitionQuote};
pub use ledger::{EntryDraft, LedgerHead, LedgerQuery, ReferenceType, StatementEntry, TaxStatement, TransactionType};
pub use memory::InMemoryBillingStore;
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use ports::{AidFilter, BillingStore, BillingTransaction, InvoiceFilter, PaymentFilter};
pub use refund::{Refund, RefundStatus, RefundType};
pub use services::{
    BillingContext, BillingServices, FeeCatalog, FinancialAidAllocator, GenerateInvoice, InvoiceEngine,
    LateFeeAssessment, LedgerService, PaymentRecorder, RecordPayment, RefundProcessor, RefundRequest,
};
pub use settings::{BillingSettings, PaymentLedgering};
