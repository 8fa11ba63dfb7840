//! Hosted-checkout gateway over HTTPS.
//!
//! Opens checkouts with `POST {base}/v1/transaction/initialize` using a
//! bearer secret key. The gateway answers
//! `{"status": "success", "data": {"checkout_url": ...}}` on success; any
//! other `status` is a rejection carrying the gateway's `message`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ports::{
    GatewayError, GatewayErrorCode, InitializeTransactionRequest, InitializedTransaction,
    PaymentGateway,
};

const INITIALIZE_PATH: &str = "/v1/transaction/initialize";

/// Gateway connection settings.
#[derive(Clone)]
pub struct HttpGatewayConfig {
    secret_key: SecretString,
    base_url: String,
    timeout: Duration,
}

impl HttpGatewayConfig {
    pub fn new(secret_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            secret_key: SecretString::new(secret_key.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn initialize_url(&self) -> String {
        format!("{}{}", self.base_url, INITIALIZE_PATH)
    }
}

impl std::fmt::Debug for HttpGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGatewayConfig")
            .field("secret_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    amount: String,
    currency: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    tx_ref: &'a str,
    callback_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    status: Option<String>,
    message: Option<Value>,
    data: Option<InitializeData>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    checkout_url: Option<String>,
}

/// Payment gateway adapter speaking the hosted-checkout HTTP API.
pub struct HttpPaymentGateway {
    config: HttpGatewayConfig,
    http_client: reqwest::Client,
}

impl HttpPaymentGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    fn provider_name(&self) -> &'static str {
        "chapa"
    }

    async fn initialize_transaction(
        &self,
        request: InitializeTransactionRequest,
    ) -> Result<InitializedTransaction, GatewayError> {
        let body = InitializeBody {
            amount: request.amount.to_decimal_string(),
            currency: request.currency.as_str(),
            email: &request.email,
            first_name: &request.first_name,
            last_name: &request.last_name,
            tx_ref: request.tx_ref.as_str(),
            callback_url: &request.callback_url,
        };

        let response = self
            .http_client
            .post(self.config.initialize_url())
            .bearer_auth(self.config.secret_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::network(format!("Gateway request failed: {}", e)))?;

        let status = response.status();
        let raw: Value = response.json().await.map_err(|e| {
            GatewayError::invalid_response(format!("Failed to parse gateway response: {}", e))
        })?;

        tracing::debug!(
            http_status = status.as_u16(),
            tx_ref = %request.tx_ref,
            "Gateway initialize response received"
        );

        interpret_initialize_response(status.as_u16(), raw)
    }
}

/// Maps an HTTP status and decoded body to the gateway outcome.
pub(crate) fn interpret_initialize_response(
    http_status: u16,
    raw: Value,
) -> Result<InitializedTransaction, GatewayError> {
    let parsed: InitializeResponse = serde_json::from_value(raw.clone()).map_err(|e| {
        GatewayError::invalid_response(format!("Unexpected gateway response shape: {}", e))
    })?;

    if parsed.status.as_deref() != Some("success") {
        let message = parsed
            .message
            .map(|m| match m {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_else(|| "Gateway rejected the transaction".to_string());
        let code = match http_status {
            401 | 403 => GatewayErrorCode::AuthenticationError,
            429 => GatewayErrorCode::RateLimitExceeded,
            _ => GatewayErrorCode::Rejected,
        };
        return Err(GatewayError::new(code, message));
    }

    let checkout_url = parsed
        .data
        .and_then(|d| d.checkout_url)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| GatewayError::invalid_response("Gateway response missing checkout_url"))?;

    Ok(InitializedTransaction { checkout_url, raw })
}
