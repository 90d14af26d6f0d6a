use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::application::billing::PaymentDuePolicy;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 100_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a valid number, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },

    #[error("PAYMENT_DUE_POLICY: {0}")]
    InvalidPolicy(String),
}

/// Process settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Postgres URL; `None` selects the in-process store.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub store_timeout: Duration,
    pub payment_due_policy: PaymentDuePolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                name: "PORT",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let timeout_ms = match lookup("STORE_TIMEOUT_MS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber {
                    name: "STORE_TIMEOUT_MS",
                    value,
                })?,
            None => DEFAULT_STORE_TIMEOUT_MS,
        };
        if timeout_ms == 0 {
            return Err(ConfigError::Zero {
                name: "STORE_TIMEOUT_MS",
            });
        }

        let payment_due_policy = match lookup("PAYMENT_DUE_POLICY") {
            Some(value) => value.parse().map_err(ConfigError::InvalidPolicy)?,
            None => PaymentDuePolicy::default(),
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            store_timeout: Duration::from_millis(timeout_ms),
            payment_due_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config(&[]).expect("config");
        assert_eq!(config.database_url, None);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.store_timeout, Duration::from_secs(100));
        assert_eq!(config.payment_due_policy, PaymentDuePolicy::UnitPrice);
    }

    #[test]
    fn reads_every_variable() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/restaurant"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("STORE_TIMEOUT_MS", "250"),
            ("PAYMENT_DUE_POLICY", "price_times_quantity"),
        ])
        .expect("config");
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/restaurant")
        );
        assert_eq!(config.port, 9000);
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(
            config.payment_due_policy,
            PaymentDuePolicy::PriceTimesQuantity
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            config(&[("PORT", "http")]),
            Err(ConfigError::InvalidNumber { name: "PORT", .. })
        ));
        assert_eq!(
            config(&[("STORE_TIMEOUT_MS", "0")]),
            Err(ConfigError::Zero {
                name: "STORE_TIMEOUT_MS"
            })
        );
        assert!(matches!(
            config(&[("PAYMENT_DUE_POLICY", "average")]),
            Err(ConfigError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn blank_database_url_selects_memory_store() {
        let config = config(&[("DATABASE_URL", "  ")]).expect("config");
        assert!(config.database_url.is_none());
    }
}
