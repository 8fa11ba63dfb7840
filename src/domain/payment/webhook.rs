//! Gateway callback payload interpretation.

use serde_json::Value;

use super::{PaymentIntentStatus, ProviderRef};

/// Payload fields that may carry the transaction reference, in priority order.
pub const REFERENCE_FIELDS: [&str; 3] = ["trx_ref", "tx_ref", "txRef"];

/// What a gateway callback tells us, reduced to the fields reconciliation uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotification {
    /// `None` when the payload carries no usable reference.
    pub provider_ref: Option<ProviderRef>,
    pub status: PaymentIntentStatus,
    /// Status string exactly as the gateway sent it, for logging.
    pub raw_status: String,
}

impl WebhookNotification {
    /// Interprets a callback payload. Never fails: malformed payloads yield a
    /// notification without a reference.
    pub fn from_payload(payload: &Value) -> Self {
        let provider_ref = REFERENCE_FIELDS
            .iter()
            .filter_map(|field| payload.get(*field))
            .filter_map(scalar_text)
            .find_map(|raw| ProviderRef::new(raw).ok());

        let raw_status = payload.get("status").and_then(scalar_text).unwrap_or_default();

        Self {
            provider_ref,
            status: PaymentIntentStatus::from_provider(&raw_status),
            raw_status,
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_trx_ref_and_success() {
        let n = WebhookNotification::from_payload(&json!({"trx_ref": "tx-1", "status": "success"}));
        assert_eq!(n.provider_ref.unwrap().as_str(), "tx-1");
        assert_eq!(n.status, PaymentIntentStatus::Paid);
    }

    #[test]
    fn falls_back_through_reference_fields() {
        let n = WebhookNotification::from_payload(&json!({"tx_ref": "tx-2", "status": "failed"}));
        assert_eq!(n.provider_ref.unwrap().as_str(), "tx-2");

        let n = WebhookNotification::from_payload(&json!({"txRef": "tx-3"}));
        assert_eq!(n.provider_ref.unwrap().as_str(), "tx-3");
    }

    #[test]
    fn trx_ref_wins_over_other_fields() {
        let n = WebhookNotification::from_payload(&json!({"txRef": "b", "trx_ref": "a"}));
        assert_eq!(n.provider_ref.unwrap().as_str(), "a");
    }

    #[test]
    fn blank_reference_falls_through_to_next_field() {
        let n = WebhookNotification::from_payload(&json!({"trx_ref": " ", "tx_ref": "tx-4"}));
        assert_eq!(n.provider_ref.unwrap().as_str(), "tx-4");
    }

    #[test]
    fn missing_reference_is_none() {
        let n = WebhookNotification::from_payload(&json!({"status": "success"}));
        assert!(n.provider_ref.is_none());
        let n = WebhookNotification::from_payload(&json!("not an object"));
        assert!(n.provider_ref.is_none());
    }

    #[test]
    fn missing_status_is_pending() {
        let n = WebhookNotification::from_payload(&json!({"trx_ref": "tx-5"}));
        assert_eq!(n.status, PaymentIntentStatus::Pending);
        assert_eq!(n.raw_status, "");
    }
}
