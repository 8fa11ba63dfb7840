//! Order status vocabulary.
//!
//! The order entity belongs to the order-management platform; this core only
//! reads its business status and writes the payment/delivery sub-statuses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Generates `as_str`, `Display` and `FromStr` for a snake_case status enum.
macro_rules! status_strings {
    ($ty:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(ValidationError::invalid_format(
                        $field,
                        format!("unknown value '{}'", other),
                    )),
                }
            }
        }
    };
}

/// Business lifecycle of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, waiting for the buyer to pay. The only state that accepts a
    /// new payment intent.
    AwaitingPayment,
    /// Paid (or payment attempt concluded); delivery still to be scheduled.
    AwaitingDelivery,
    OutForDelivery,
    Delivered,
    Cancelled,
}

status_strings!(OrderStatus, "order_status", {
    AwaitingPayment => "awaiting_payment",
    AwaitingDelivery => "awaiting_delivery",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

/// Payment sub-status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Confirmed,
    Failed,
}

status_strings!(PaymentStatus, "payment_status", {
    Unpaid => "unpaid",
    Confirmed => "confirmed",
    Failed => "failed",
});

/// Delivery sub-status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    NotScheduled,
    Scheduled,
    InTransit,
    Delivered,
}

status_strings!(DeliveryStatus, "delivery_status", {
    NotScheduled => "not_scheduled",
    Scheduled => "scheduled",
    InTransit => "in_transit",
    Delivered => "delivered",
});
