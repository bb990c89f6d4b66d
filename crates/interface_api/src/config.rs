//! API configuration

use serde::Deserialize;

use core_kernel::Timezone;
use domain_billing::{BillingSettings, PaymentLedgering};
use infra_db::DatabaseConfig;

/// Prefix of the environment variables read by [`ApiConfig::from_env`]
pub const ENV_PREFIX: &str = "BILLING";

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL
    pub database_url: String,
    /// Upper bound of the connection pool
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    /// Emit logs as JSON lines
    pub json_logs: bool,
    /// Institution timezone; decides the calendar date used as "today"
    pub timezone: Timezone,
    /// Days between invoice issue and due date
    pub due_days: u32,
    /// Whether payments are booked to the ledger
    pub payment_ledgering: PaymentLedgering,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let settings = BillingSettings::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/student_billing".to_string(),
            max_connections: 10,
            min_connections: 2,
            log_level: "info".to_string(),
            json_logs: false,
            timezone: Timezone::default(),
            due_days: settings.due_days,
            payment_ledgering: settings.payment_ledgering,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `BILLING_*` environment variables
    ///
    /// Unset variables keep their defaults, e.g. `BILLING_PORT=9000` overrides
    /// only the port.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("database_url", defaults.database_url)?
            .set_default("max_connections", i64::from(defaults.max_connections))?
            .set_default("min_connections", i64::from(defaults.min_connections))?
            .set_default("log_level", defaults.log_level)?
            .set_default("json_logs", defaults.json_logs)?
            .set_default("timezone", "UTC")?
            .set_default("due_days", i64::from(defaults.due_days))?
            .set_default("payment_ledgering", defaults.payment_ledgering.as_str())?
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings handed to the billing services
    pub fn billing_settings(&self) -> BillingSettings {
        BillingSettings {
            due_days: self.due_days,
            payment_ledgering: self.payment_ledgering,
        }
    }

    /// Connection pool options
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            ..DatabaseConfig::new(self.database_url.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
        assert_eq!(config.billing_settings(), BillingSettings::default());
        assert_eq!(config.database_config().max_connections, 10);
    }

    #[test]
    fn test_payment_ledgering_deserializes_from_code() {
        let config: ApiConfig = config::Config::builder()
            .set_default("host", "127.0.0.1")
            .unwrap()
            .set_default("port", 3000_i64)
            .unwrap()
            .set_default("database_url", "postgres://db/billing")
            .unwrap()
            .set_default("max_connections", 4_i64)
            .unwrap()
            .set_default("min_connections", 1_i64)
            .unwrap()
            .set_default("log_level", "debug")
            .unwrap()
            .set_default("json_logs", true)
            .unwrap()
            .set_default("timezone", "America/New_York")
            .unwrap()
            .set_default("due_days", 14_i64)
            .unwrap()
            .set_default("payment_ledgering", "LEDGER_ENTRY")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.payment_ledgering, PaymentLedgering::LedgerEntry);
        assert_eq!(config.billing_settings().due_days, 14);
        assert_eq!(config.timezone, "America/New_York".parse::<Timezone>().unwrap());
    }
}
