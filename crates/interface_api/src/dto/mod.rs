//! Request and response bodies
//!
//! Domain records serialize directly; these types cover request shapes that
//! differ from the records they create and the query strings of list routes.

pub mod fee_structures;
pub mod financial_aid;
pub mod invoices;
pub mod payments;
pub mod refunds;
pub mod students;

use serde::Deserialize;

/// Body of every action that only records why it happened
#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}
