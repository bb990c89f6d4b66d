//! Student Billing Ledger - API Server Binary
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin billing-api
//!
//! # Run with environment variables
//! BILLING_PORT=8080 BILLING_DATABASE_URL=postgres://... cargo run --bin billing-api
//! ```
//!
//! # Environment Variables
//!
//! * `BILLING_HOST` - Server host (default: 0.0.0.0)
//! * `BILLING_PORT` - Server port (default: 8080)
//! * `BILLING_DATABASE_URL` - PostgreSQL connection string
//! * `BILLING_MAX_CONNECTIONS` / `BILLING_MIN_CONNECTIONS` - Pool bounds (default: 10 / 2)
//! * `BILLING_LOG_LEVEL` - Log level or filter directive (default: info); `RUST_LOG` wins if set
//! * `BILLING_JSON_LOGS` - Emit JSON log lines (default: false)
//! * `BILLING_TIMEZONE` - Institution timezone, e.g. `America/Chicago` (default: UTC)
//! * `BILLING_DUE_DAYS` - Days from invoice issue to due date (default: 30)
//! * `BILLING_PAYMENT_LEDGERING` - `INVOICE_ONLY` or `LEDGER_ENTRY` (default: INVOICE_ONLY)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::SystemClock;
use infra_db::{create_pool, run_migrations, PostgresBillingStore};
use interface_api::{config::ApiConfig, create_router, AppState};

/// Main entry point for the API server.
///
/// Initializes logging, loads configuration, connects to and migrates the
/// database, and serves until Ctrl+C or SIGTERM.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("loading BILLING_* configuration")?;

    init_tracing(&config.log_level, config.json_logs);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        timezone = %config.timezone.0,
        payment_ledgering = %config.payment_ledgering,
        "Starting Student Billing API Server"
    );

    let pool = create_pool(config.database_config())
        .await
        .context("connecting to database")?;
    run_migrations(&pool).await.context("running migrations")?;

    let store = Arc::new(PostgresBillingStore::new(pool));
    let clock = Arc::new(SystemClock::new(config.timezone));
    let addr: SocketAddr = config.server_addr().parse().context("parsing server address")?;
    let app = create_router(AppState::new(store, clock, config));

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await.context("binding listener")?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(true)).init();
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
