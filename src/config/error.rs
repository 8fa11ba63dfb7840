//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid gateway base URL")]
    InvalidGatewayUrl,

    #[error("Callback URL must use HTTPS in production")]
    CallbackMustBeHttps,

    #[error("Invalid default currency: {0}")]
    InvalidCurrency(String),

    #[error("Webhook public key is not a valid PEM RSA key")]
    InvalidWebhookKey,

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("Request timeout ({request_secs}s) must exceed gateway timeout ({gateway_secs}s)")]
    RequestTimeoutBelowGateway { request_secs: u64, gateway_secs: u64 },
}
