//! Throwaway PostgreSQL databases for store tests
//!
//! Each [`TestDatabase`] is its own container with the billing schema
//! migrated, so tests never share ledger heads or sequences.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

use infra_db::PostgresBillingStore;

type SetupError = Box<dyn std::error::Error + Send + Sync>;

const IMAGE: (&str, &str) = ("postgres", "16-alpine");
const CREDENTIALS: (&str, &str) = ("billing", "billing");
const DATABASE: &str = "billing_test";

/// Connection URL for a container listening on `host:port`
fn database_url(host: &str, port: u16) -> String {
    let (user, password) = CREDENTIALS;
    format!("postgres://{user}:{password}@{host}:{port}/{DATABASE}")
}

/// A migrated billing database living as long as the value
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts Postgres and applies the billing migrations
    ///
    /// # Errors
    ///
    /// Fails if Docker is unavailable, the container never becomes ready, or
    /// the migrations do not apply.
    pub async fn start() -> Result<Self, SetupError> {
        let (user, password) = CREDENTIALS;
        let container = GenericImage::new(IMAGE.0, IMAGE.1)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr("database system is ready to accept connections"))
            .with_env_var("POSTGRES_USER", user)
            .with_env_var("POSTGRES_PASSWORD", password)
            .with_env_var("POSTGRES_DB", DATABASE)
            .start()
            .await?;

        let host = container.get_host().await?.to_string();
        let port = container.get_host_port_ipv4(5432).await?;

        // Enough connections for the concurrent ledger tests
        let pool = PgPoolOptions::new()
            .max_connections(12)
            .connect(&database_url(&host, port))
            .await?;
        infra_db::run_migrations(&pool).await?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    /// A billing store over this database
    pub fn store(&self) -> PostgresBillingStore {
        PostgresBillingStore::new(self.pool.clone())
    }
}

/// Declares an async test that receives a fresh [`TestDatabase`] as `$db`
///
/// The test needs Docker, so it is ignored by default; run it with
/// `cargo test -- --ignored`.
#[macro_export]
macro_rules! db_test {
    ($name:ident, |$db:ident| $body:block) => {
        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        #[ignore = "requires Docker"]
        async fn $name() {
            let $db = $crate::database::TestDatabase::start()
                .await
                .expect("start test database");
            $body
        }
    };
}
