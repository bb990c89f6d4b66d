//! Core Kernel - Foundational types for the student billing system
//!
//! This crate provides the building blocks shared by every other crate:
//! - `Money` and `Rate` with precise decimal arithmetic
//! - Typed identifiers for billing entities and the opaque `StudentId`
//! - Academic period labels and the billing `Clock`
//! - Port error and health-check types for store adapters

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod academic;
pub mod ports;
pub mod error;

pub use money::{Money, Rate, MoneyError, MONEY_SCALE};
pub use temporal::{Clock, SystemClock, FixedClock, Timezone, DateRange, TemporalError, days_between};
pub use identifiers::{
    FeeStructureId, InvoiceId, LedgerEntryId, FinancialAidId, PaymentId, RefundId, StudentId,
};
pub use academic::AcademicPeriod;
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
pub use error::CoreError;
