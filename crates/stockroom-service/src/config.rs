//! Service configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `STOCKROOM_DB_PATH` | `./stockroom.db` |
//! | `STOCKROOM_DB_MAX_CONNECTIONS` | `5` |
//! | `STOCKROOM_DB_BUSY_TIMEOUT_SECS` | `5` |
//! | `STOCKROOM_TAX_RATE_BPS` | `1900` |
//! | `STOCKROOM_TAX_INCLUDED` | `false` |
//! | `STOCKROOM_AUDIT_QUEUE_CAPACITY` | `256` |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stockroom_core::TaxRate;
use stockroom_db::DbConfig;

use crate::engine::TaxDefaults;

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// SQLite database file
    pub db_path: String,

    /// Pool size
    pub db_max_connections: u32,

    /// How long a sale waits for the write lock, in seconds
    pub db_busy_timeout_secs: u64,

    /// Default sale tax rate in basis points (1900 = 19%)
    pub tax_rate_bps: u32,

    /// Default tax mode
    pub tax_included: bool,

    /// Bound of the audit queue
    pub audit_queue_capacity: usize,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = ServiceConfig {
            db_path: lookup("STOCKROOM_DB_PATH").unwrap_or_else(|| "./stockroom.db".to_string()),

            db_max_connections: parse_var(&lookup, "STOCKROOM_DB_MAX_CONNECTIONS", 5)?,

            db_busy_timeout_secs: parse_var(&lookup, "STOCKROOM_DB_BUSY_TIMEOUT_SECS", 5)?,

            tax_rate_bps: parse_var(&lookup, "STOCKROOM_TAX_RATE_BPS", 1900)?,

            tax_included: parse_var(&lookup, "STOCKROOM_TAX_INCLUDED", false)?,

            audit_queue_capacity: parse_var(&lookup, "STOCKROOM_AUDIT_QUEUE_CAPACITY", 256)?,
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "STOCKROOM_DB_MAX_CONNECTIONS".to_string(),
            ));
        }
        // tokio's mpsc::channel panics on a zero bound
        if config.audit_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "STOCKROOM_AUDIT_QUEUE_CAPACITY".to_string(),
            ));
        }

        Ok(config)
    }

    /// Database settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.db_path)
            .max_connections(self.db_max_connections)
            .busy_timeout(Duration::from_secs(self.db_busy_timeout_secs))
    }

    /// Tax applied to sales that do not carry their own settings.
    pub fn tax_defaults(&self) -> TaxDefaults {
        TaxDefaults {
            rate: TaxRate::from_bps(self.tax_rate_bps),
            included: self.tax_included,
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
