//! HTTP adapter for payment endpoints.
//!
//! - `POST /api/payments/intents` - Create a payment intent (idempotent)
//! - `GET /api/payments/intents/:id` - Read a payment intent
//! - `POST /api/payments/maintenance/reap` - Trigger the expiry reaper
//! - `GET|POST /api/webhooks/payment` - Gateway callback
//! - `POST /api/webhooks/payment/signed` - Signed gateway callback

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{
    health, status_for_code, AuthenticatedBuyer, PaymentApiError, PaymentAppState,
    IDEMPOTENCY_KEY_HEADER, IDEMPOTENT_REPLAYED_HEADER, SIGNATURE_HEADER,
};
pub use routes::{payment_router, payment_routes, webhook_routes};
