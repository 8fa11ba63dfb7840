//! Order domain - the slice of the external order entity this core touches.

mod snapshot;
mod status;

pub use snapshot::{
    BuyerContact, OrderPaymentUpdate, OrderSnapshot, TrackingStep, PAYMENT_CONFIRMED_STEP,
};
pub use status::{DeliveryStatus, OrderStatus, PaymentStatus};
