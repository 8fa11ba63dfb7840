//! Read model of an order plus the mutations this core applies to it.

use serde::{Deserialize, Serialize};

use super::{DeliveryStatus, OrderStatus, PaymentStatus};
use crate::domain::foundation::{Amount, Currency, OrderId, UserId};

/// Tracking step recorded when a payment is confirmed.
pub const PAYMENT_CONFIRMED_STEP: &str = "payment_confirmed";

/// Buyer contact details forwarded to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerContact {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// The parts of an order this core needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub buyer_id: UserId,
    pub total_amount: Amount,
    pub currency: Currency,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub delivery_status: DeliveryStatus,
    pub buyer: BuyerContact,
}

impl OrderSnapshot {
    pub fn is_awaiting_payment(&self) -> bool {
        self.status == OrderStatus::AwaitingPayment
    }

    pub fn is_owned_by(&self, buyer_id: &UserId) -> bool {
        &self.buyer_id == buyer_id
    }
}

/// Partial update of an order's status fields. `None` leaves a field as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderPaymentUpdate {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub delivery_status: Option<DeliveryStatus>,
}

impl OrderPaymentUpdate {
    /// Fields written when the gateway reports a successful charge.
    pub fn payment_confirmed() -> Self {
        Self {
            status: Some(OrderStatus::AwaitingDelivery),
            payment_status: Some(PaymentStatus::Confirmed),
            delivery_status: Some(DeliveryStatus::NotScheduled),
        }
    }

    /// Fields written when the gateway reports a failed or cancelled charge.
    ///
    /// The business status still moves to awaiting delivery; only the
    /// payment sub-status records the failure.
    pub fn payment_failed() -> Self {
        Self {
            status: Some(OrderStatus::AwaitingDelivery),
            payment_status: Some(PaymentStatus::Failed),
            delivery_status: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.payment_status.is_none() && self.delivery_status.is_none()
    }

    /// Applies the update to a snapshot in place.
    pub fn apply_to(&self, order: &mut OrderSnapshot) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(payment_status) = self.payment_status {
            order.payment_status = payment_status;
        }
        if let Some(delivery_status) = self.delivery_status {
            order.delivery_status = delivery_status;
        }
    }
}

/// One row of an order's tracking history, unique per `(order_id, step_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingStep {
    pub order_id: OrderId,
    pub step_type: String,
    pub message: String,
}

impl TrackingStep {
    pub fn payment_confirmed(order_id: OrderId) -> Self {
        Self {
            order_id,
            step_type: PAYMENT_CONFIRMED_STEP.to_string(),
            message: "Payment confirmed".to_string(),
        }
    }
}
