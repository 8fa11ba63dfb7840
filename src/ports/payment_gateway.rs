//! Payment gateway port for the external checkout provider.
//!
//! Only the "initialize transaction" call is modelled; everything after
//! that arrives asynchronously as webhooks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::{Amount, Currency, DomainError, ErrorCode};
use crate::domain::payment::{PaymentError, ProviderRef};

/// Port for the hosted-checkout payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Short provider name recorded on transactions.
    fn provider_name(&self) -> &'static str;

    /// Opens a checkout for the buyer. At most one call per idempotency key.
    async fn initialize_transaction(
        &self,
        request: InitializeTransactionRequest,
    ) -> Result<InitializedTransaction, GatewayError>;
}

/// Request to open a hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeTransactionRequest {
    pub amount: Amount,
    pub currency: Currency,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub tx_ref: ProviderRef,
    pub callback_url: String,
}

/// Accepted checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct InitializedTransaction {
    /// URL the buyer is redirected to.
    pub checkout_url: String,
    /// Full provider response, kept for audit.
    pub raw: Value,
}

/// Errors from gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayError {
    pub code: GatewayErrorCode,
    /// Provider's message where it sent one.
    pub message: String,
    pub retryable: bool,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::NetworkError, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::AuthenticationError, message)
    }

    /// Gateway answered with a non-success status.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::Rejected, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::InvalidResponse, message)
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        PaymentError::Provider(err.message)
    }
}

impl From<GatewayError> for DomainError {
    fn from(err: GatewayError) -> Self {
        DomainError::new(ErrorCode::ProviderError, err.message)
    }
}

/// Gateway error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayErrorCode {
    NetworkError,
    AuthenticationError,
    RateLimitExceeded,
    Rejected,
    InvalidResponse,
}

impl GatewayErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayErrorCode::NetworkError | GatewayErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::NetworkError => "network_error",
            GatewayErrorCode::AuthenticationError => "authentication_error",
            GatewayErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            GatewayErrorCode::Rejected => "rejected",
            GatewayErrorCode::InvalidResponse => "invalid_response",
        };
        write!(f, "{}", s)
    }
}
