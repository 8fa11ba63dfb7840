//! Payment status vocabulary and provider status mapping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Status of a payment intent.
///
/// `Pending` is the only non-terminal state. `Paid` and `Failed` never
/// transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentIntentStatus {
    /// Maps the gateway's status vocabulary onto the internal tri-state.
    ///
    /// Unrecognized values mean "still pending", never an error.
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" => PaymentIntentStatus::Paid,
            "failed" | "cancelled" => PaymentIntentStatus::Failed,
            _ => PaymentIntentStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentIntentStatus::Pending => "pending",
            PaymentIntentStatus::Paid => "paid",
            PaymentIntentStatus::Failed => "failed",
        }
    }
}

impl StateMachine for PaymentIntentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentIntentStatus::*;
        matches!((self, target), (Pending, Paid) | (Pending, Failed))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use PaymentIntentStatus::*;
        match self {
            Pending => vec![Paid, Failed],
            Paid | Failed => vec![],
        }
    }
}

impl fmt::Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentIntentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentIntentStatus::Pending),
            "paid" => Ok(PaymentIntentStatus::Paid),
            "failed" => Ok(PaymentIntentStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "payment_intent_status",
                format!("unknown value '{}'", other),
            )),
        }
    }
}

/// Status of a payment transaction row.
///
/// Starts as `Initiated` when the gateway accepts the checkout, then mirrors
/// the intent status through reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Initiated,
    Pending,
    Paid,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Initiated => "initiated",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Paid => "paid",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl From<PaymentIntentStatus> for TransactionStatus {
    fn from(status: PaymentIntentStatus) -> Self {
        match status {
            PaymentIntentStatus::Pending => TransactionStatus::Pending,
            PaymentIntentStatus::Paid => TransactionStatus::Paid,
            PaymentIntentStatus::Failed => TransactionStatus::Failed,
        }
    }
}

impl StateMachine for TransactionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, target),
            (Initiated, Pending)
                | (Initiated, Paid)
                | (Initiated, Failed)
                | (Pending, Paid)
                | (Pending, Failed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use TransactionStatus::*;
        match self {
            Initiated => vec![Pending, Paid, Failed],
            Pending => vec![Paid, Failed],
            Paid | Failed => vec![],
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(TransactionStatus::Initiated),
            "pending" => Ok(TransactionStatus::Pending),
            "paid" => Ok(TransactionStatus::Paid),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "transaction_status",
                format!("unknown value '{}'", other),
            )),
        }
    }
}

/// Kind of money movement a transaction represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Capture,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Capture => "capture",
            TransactionType::Refund => "refund",
        }
    }
}

impl FromStr for TransactionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "capture" => Ok(TransactionType::Capture),
            "refund" => Ok(TransactionType::Refund),
            other => Err(ValidationError::invalid_format(
                "transaction_type",
                format!("unknown value '{}'", other),
            )),
        }
    }
}
