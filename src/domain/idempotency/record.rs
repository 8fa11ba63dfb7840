//! Idempotency record and its status lifecycle.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::{IdempotencyKey, RequestFingerprint};
use crate::domain::foundation::{StateMachine, Timestamp, ValidationError};

/// Lifecycle of a guarded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotencyStatus {
    /// Key reserved, side effect in flight.
    Pending,
    /// Side effect completed; `response_data` holds the cached response.
    Success,
    /// Side effect failed; `response_data` holds `{code, message}`.
    Failure,
}

impl IdempotencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdempotencyStatus::Pending => "PENDING",
            IdempotencyStatus::Success => "SUCCESS",
            IdempotencyStatus::Failure => "FAILURE",
        }
    }
}

impl StateMachine for IdempotencyStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use IdempotencyStatus::*;
        matches!((self, target), (Pending, Success) | (Pending, Failure))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use IdempotencyStatus::*;
        match self {
            Pending => vec![Success, Failure],
            Success | Failure => vec![],
        }
    }
}

impl fmt::Display for IdempotencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdempotencyStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(IdempotencyStatus::Pending),
            "SUCCESS" => Ok(IdempotencyStatus::Success),
            "FAILURE" => Ok(IdempotencyStatus::Failure),
            other => Err(ValidationError::invalid_format(
                "idempotency_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

/// Durable record of an in-flight or completed operation.
///
/// Unique per `(key, operation)`. A record whose `expires_at` has passed is
/// treated as absent even before the reaper deletes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: IdempotencyKey,
    pub operation: String,
    pub request_fingerprint: RequestFingerprint,
    pub status: IdempotencyStatus,
    pub response_data: Option<Value>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl IdempotencyRecord {
    /// Builds a new record expiring `ttl_hours` after `now`.
    pub fn new(
        key: IdempotencyKey,
        operation: impl Into<String>,
        request_fingerprint: RequestFingerprint,
        status: IdempotencyStatus,
        response_data: Option<Value>,
        now: Timestamp,
        ttl_hours: i64,
    ) -> Self {
        Self {
            key,
            operation: operation.into(),
            request_fingerprint,
            status,
            response_data,
            created_at: now,
            expires_at: now.plus_hours(ttl_hours),
        }
    }

    /// Builds the PENDING reservation written before a side effect runs.
    pub fn reservation(
        key: IdempotencyKey,
        operation: impl Into<String>,
        request_fingerprint: RequestFingerprint,
        now: Timestamp,
        ttl_hours: i64,
    ) -> Self {
        Self::new(
            key,
            operation,
            request_fingerprint,
            IdempotencyStatus::Pending,
            None,
            now,
            ttl_hours,
        )
    }

    /// Expired records are invisible to lookups.
    pub fn is_expired(&self, now: &Timestamp) -> bool {
        self.expires_at.is_before(now)
    }

    pub fn matches(&self, fingerprint: &RequestFingerprint) -> bool {
        &self.request_fingerprint == fingerprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(now: Timestamp) -> IdempotencyRecord {
        IdempotencyRecord::reservation(
            IdempotencyKey::parse("K1").unwrap(),
            "create_payment_intent",
            RequestFingerprint::of(&json!({"orderId": "O1"})),
            now,
            24,
        )
    }

    #[test]
    fn reservation_is_pending_without_response() {
        let rec = record(Timestamp::now());
        assert_eq!(rec.status, IdempotencyStatus::Pending);
        assert!(rec.response_data.is_none());
    }

    #[test]
    fn expiry_is_ttl_after_creation() {
        let now = Timestamp::now();
        let rec = record(now);
        assert_eq!(rec.expires_at, now.plus_hours(24));
    }

    #[test]
    fn record_is_not_expired_at_its_expiry_instant() {
        let now = Timestamp::now();
        let rec = record(now);
        assert!(!rec.is_expired(&rec.expires_at));
        assert!(rec.is_expired(&rec.expires_at.plus_secs(1)));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            IdempotencyStatus::Pending,
            IdempotencyStatus::Success,
            IdempotencyStatus::Failure,
        ] {
            assert_eq!(status.as_str().parse::<IdempotencyStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<IdempotencyStatus>().is_err());
    }

    #[test]
    fn only_pending_can_be_finalized() {
        assert!(IdempotencyStatus::Pending.can_transition_to(&IdempotencyStatus::Success));
        assert!(IdempotencyStatus::Pending.can_transition_to(&IdempotencyStatus::Failure));
        assert!(IdempotencyStatus::Success.is_terminal());
        assert!(IdempotencyStatus::Failure.is_terminal());
    }
}
