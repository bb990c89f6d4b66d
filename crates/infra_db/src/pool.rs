//! PostgreSQL pool and schema setup for the billing store

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::error::DatabaseError;

/// Pool type shared by the billing store and its tests
pub type DatabasePool = PgPool;

/// Connection settings for the billing database
///
/// ```rust
/// use infra_db::DatabaseConfig;
///
/// let config = DatabaseConfig {
///     max_connections: 20,
///     ..DatabaseConfig::new("postgres://localhost/student_billing")
/// };
/// assert_eq!(config.min_connections, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long a caller waits for a free connection
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Settings for `url` with a pool of 2 to 10 connections
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("postgres://localhost/student_billing")
    }
}

/// Opens the connection pool
///
/// Ledger appends hold a row lock on the student's ledger head for the whole
/// transaction, so `max_connections` also bounds how many students can be
/// written concurrently.
///
/// # Errors
///
/// `DatabaseError::ConnectionFailed` if no connection can be established.
pub async fn create_pool(config: DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Connecting to billing database"
    );

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))
}

/// Brings the schema up to date with `crates/infra_db/migrations`
///
/// # Errors
///
/// `DatabaseError::MigrationFailed` if a migration does not apply.
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Billing schema migrated");
    Ok(())
}
