//! Payment intent and transaction entities.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use super::{IntentMetadata, PaymentIntentStatus, TransactionStatus, TransactionType};
use crate::domain::foundation::{
    Amount, Currency, OrderId, PaymentIntentId, PaymentTransactionId, Timestamp, UserId,
    ValidationError,
};

/// Gateway-side transaction reference correlating callbacks to intents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderRef(String);

impl ProviderRef {
    /// Generates a fresh reference of the form `tx-<32 hex chars>`.
    pub fn generate() -> Self {
        Self(format!("tx-{}", Uuid::new_v4().simple()))
    }

    /// Wraps a reference received from the gateway or storage.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("provider_ref"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The system's record of an attempted charge.
///
/// Created once per successful gateway call. After creation only webhook
/// reconciliation changes its status.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub id: PaymentIntentId,
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub amount: Amount,
    pub currency: Currency,
    pub method: String,
    pub status: PaymentIntentStatus,
    pub provider_ref: ProviderRef,
    /// Redirect URL handed to the buyer's client.
    pub client_secret: String,
    pub metadata: IntentMetadata,
    pub idempotency_key: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PaymentIntent {
    pub fn summary(&self) -> PaymentIntentSummary {
        PaymentIntentSummary {
            id: self.id,
            client_secret: self.client_secret.clone(),
            status: self.status,
            amount: self.amount,
            currency: self.currency.clone(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
        }
    }
}

/// A money movement recorded against the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentTransaction {
    pub id: PaymentTransactionId,
    pub order_id: OrderId,
    pub payment_intent_id: PaymentIntentId,
    pub provider: String,
    pub provider_ref: ProviderRef,
    pub amount: Amount,
    pub status: TransactionStatus,
    pub transaction_type: TransactionType,
    /// Full gateway response; audit only, never exposed to clients.
    pub raw_payload: Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PaymentTransaction {
    /// The capture row paired with a freshly created intent.
    pub fn capture_for(
        intent: &PaymentIntent,
        provider: impl Into<String>,
        raw_payload: Value,
    ) -> Self {
        Self {
            id: PaymentTransactionId::new(),
            order_id: intent.order_id,
            payment_intent_id: intent.id,
            provider: provider.into(),
            provider_ref: intent.provider_ref.clone(),
            amount: intent.amount,
            status: TransactionStatus::Initiated,
            transaction_type: TransactionType::Capture,
            raw_payload,
            created_at: intent.created_at,
            updated_at: intent.created_at,
        }
    }
}

/// Client-facing view of a payment intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntentSummary {
    pub id: PaymentIntentId,
    pub client_secret: String,
    pub status: PaymentIntentStatus,
    pub amount: Amount,
    pub currency: Currency,
    pub metadata: IntentMetadata,
    pub created_at: Timestamp,
}
