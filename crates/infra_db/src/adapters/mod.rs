//! Adapters implementing domain ports on PostgreSQL

pub mod billing;

pub use billing::{PostgresBillingStore, PostgresTransaction};
