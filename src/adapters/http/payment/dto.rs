//! Request and response bodies for the payment endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::handlers::{HandlePaymentWebhookResult, IgnoredReason};

/// POST /api/payments/intents body.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentIntentRequest {
    pub order_id: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Acknowledgement returned to the gateway for every handled callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    /// `reconciled` or `ignored`.
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&HandlePaymentWebhookResult> for WebhookAck {
    fn from(result: &HandlePaymentWebhookResult) -> Self {
        match result {
            HandlePaymentWebhookResult::Reconciled { .. } => Self {
                received: true,
                outcome: "reconciled".to_string(),
                reason: None,
            },
            HandlePaymentWebhookResult::Ignored(reason) => Self {
                received: true,
                outcome: "ignored".to_string(),
                reason: Some(
                    match reason {
                        IgnoredReason::MissingReference => "missing_reference",
                        IgnoredReason::UnknownReference => "unknown_reference",
                        IgnoredReason::StaleStatus => "stale_status",
                    }
                    .to_string(),
                ),
            },
        }
    }
}

/// Health check body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Standard error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{PaymentIntentStatus, ProviderRef};
    use serde_json::json;

    #[test]
    fn create_request_accepts_minimal_body() {
        let req: CreatePaymentIntentRequest =
            serde_json::from_value(json!({"order_id": "abc"})).unwrap();
        assert_eq!(req.order_id, "abc");
        assert!(req.currency.is_none());
        assert!(req.metadata.is_none());
    }

    #[test]
    fn ack_for_reconciled_omits_reason() {
        let result = HandlePaymentWebhookResult::Reconciled {
            provider_ref: ProviderRef::generate(),
            status: PaymentIntentStatus::Paid,
            orders_updated: 1,
        };
        let value = serde_json::to_value(WebhookAck::from(&result)).unwrap();
        assert_eq!(value, json!({"received": true, "outcome": "reconciled"}));
    }

    #[test]
    fn ack_for_ignored_names_reason() {
        let result = HandlePaymentWebhookResult::Ignored(IgnoredReason::UnknownReference);
        let ack = WebhookAck::from(&result);
        assert_eq!(ack.reason.as_deref(), Some("unknown_reference"));
    }
}
