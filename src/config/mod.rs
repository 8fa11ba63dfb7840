//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `ORDER_PAYMENTS`
//! prefix and nested values use `__` as separator.
//!
//! # Example
//!
//! ```no_run
//! use order_payments::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod payment;
mod reaper;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use reaper::ReaperConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Gateway, callback and idempotency settings
    pub payment: PaymentConfig,

    /// Expiry reaper schedule and retention
    #[serde(default)]
    pub reaper: ReaperConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (development)
    /// 2. Reads variables with the `ORDER_PAYMENTS` prefix
    /// 3. Uses `__` to separate nested values
    ///
    /// - `ORDER_PAYMENTS__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `ORDER_PAYMENTS__PAYMENT__CALLBACK_URL=...` -> `payment.callback_url = ...`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("ORDER_PAYMENTS")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate(&self.server.environment)?;
        self.reaper.validate()?;

        // Leave room for the gateway call plus persistence.
        if self.server.request_timeout_secs <= self.payment.gateway_timeout_secs {
            return Err(ValidationError::RequestTimeoutBelowGateway {
                request_secs: self.server.request_timeout_secs,
                gateway_secs: self.payment.gateway_timeout_secs,
            });
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
