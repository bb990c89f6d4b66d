//! Request handlers, one module per resource

pub mod fee_structures;
pub mod financial_aid;
pub mod health;
pub mod invoices;
pub mod payments;
pub mod refunds;
pub mod students;
