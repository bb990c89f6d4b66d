//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the student billing ledger, using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. Repositories map one aggregate
//! each to its tables and run on a borrowed connection; the
//! [`PostgresBillingStore`] adapter opens a transaction per unit of work and
//! implements the domain's `BillingStore` port on top of them.
//!
//! # Ledger Serialization
//!
//! Appends for one student are serialized by a row lock on that student's
//! `ledger_heads` row, taken when the head is read and held until commit.
//! Entry sequences are unique per student, so a lost race can never produce
//! two entries with the same predecessor.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresBillingStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/student_billing")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresBillingStore::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::{PostgresBillingStore, PostgresTransaction};
pub use error::DatabaseError;
pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
