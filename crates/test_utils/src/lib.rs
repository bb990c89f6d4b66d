//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! student billing test suite.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built test data for common entities
//! - `builders`: Builder patterns for test data construction
//! - `harness`: Billing services wired over an in-memory store and fixed clock
//! - `database`: PostgreSQL test container management
//! - `assertions`: Custom assertion helpers for domain types
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod harness;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use harness::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
