//! Payment configuration (gateway, callbacks, idempotency)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;
use crate::adapters::gateway::HttpGatewayConfig;
use crate::application::handlers::{CreatePaymentIntentConfig, IdempotencyGuardConfig};
use crate::domain::foundation::Currency;
use crate::domain::payment::RsaSignatureVerifier;

/// Payment configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Gateway API root
    #[serde(default = "default_gateway_base_url")]
    pub gateway_base_url: String,

    /// Gateway secret key, sent as a bearer token
    pub gateway_secret_key: SecretString,

    /// Gateway request timeout in seconds
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_secs: u64,

    /// URL the gateway calls back with payment outcomes
    pub callback_url: String,

    /// Currency used when a request names none
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// PEM public key for signed webhooks; unset disables the signed route
    pub webhook_public_key_pem: Option<String>,

    /// Lifetime of idempotency records
    #[serde(default = "default_ttl_hours")]
    pub idempotency_ttl_hours: i64,

    /// How long a duplicate waits on an in-flight request
    #[serde(default = "default_in_flight_wait")]
    pub in_flight_wait_ms: u64,

    #[serde(default = "default_in_flight_poll")]
    pub in_flight_poll_ms: u64,
}

impl PaymentConfig {
    pub fn guard_config(&self) -> IdempotencyGuardConfig {
        IdempotencyGuardConfig {
            ttl_hours: self.idempotency_ttl_hours,
            in_flight_wait: Duration::from_millis(self.in_flight_wait_ms),
            in_flight_poll: Duration::from_millis(self.in_flight_poll_ms),
        }
    }

    pub fn intent_config(&self) -> Result<CreatePaymentIntentConfig, ValidationError> {
        let default_currency = Currency::new(&self.default_currency)
            .map_err(|_| ValidationError::InvalidCurrency(self.default_currency.clone()))?;
        Ok(CreatePaymentIntentConfig {
            callback_url: self.callback_url.clone(),
            default_currency,
            ..CreatePaymentIntentConfig::default()
        })
    }

    pub fn gateway_config(&self) -> HttpGatewayConfig {
        HttpGatewayConfig::new(
            self.gateway_secret_key.expose_secret().clone(),
            self.gateway_base_url.clone(),
        )
        .with_timeout(Duration::from_secs(self.gateway_timeout_secs))
    }

    /// Loads the signed-webhook verifier when a key is configured.
    pub fn webhook_verifier(&self) -> Result<Option<RsaSignatureVerifier>, ValidationError> {
        self.webhook_public_key_pem
            .as_deref()
            .filter(|pem| !pem.trim().is_empty())
            .map(|pem| {
                RsaSignatureVerifier::from_pem(pem).map_err(|_| ValidationError::InvalidWebhookKey)
            })
            .transpose()
    }

    /// Validate payment configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.gateway_secret_key.expose_secret().trim().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__GATEWAY_SECRET_KEY"));
        }
        if !self.gateway_base_url.starts_with("https://")
            && !self.gateway_base_url.starts_with("http://")
        {
            return Err(ValidationError::InvalidGatewayUrl);
        }
        if self.callback_url.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__CALLBACK_URL"));
        }
        if *environment == Environment::Production && !self.callback_url.starts_with("https://") {
            return Err(ValidationError::CallbackMustBeHttps);
        }
        if self.idempotency_ttl_hours <= 0 {
            return Err(ValidationError::MustBePositive("idempotency_ttl_hours"));
        }
        if self.in_flight_poll_ms == 0 {
            return Err(ValidationError::MustBePositive("in_flight_poll_ms"));
        }
        if self.gateway_timeout_secs == 0 {
            return Err(ValidationError::MustBePositive("gateway_timeout_secs"));
        }
        self.intent_config()?;
        self.webhook_verifier()?;
        Ok(())
    }
}

fn default_gateway_base_url() -> String {
    "https://api.chapa.co".to_string()
}

fn default_gateway_timeout() -> u64 {
    30
}

fn default_currency() -> String {
    "ETB".to_string()
}

fn default_ttl_hours() -> i64 {
    24
}

fn default_in_flight_wait() -> u64 {
    5_000
}

fn default_in_flight_poll() -> u64 {
    100
}
