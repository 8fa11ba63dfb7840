//! Axum router configuration for payment endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    create_payment_intent, get_payment_intent, handle_payment_webhook,
    handle_payment_webhook_query, handle_signed_payment_webhook, run_reaper, PaymentAppState,
};

/// Create the payment intent router.
///
/// # Routes
/// - `POST /intents` - Create or replay a payment intent
/// - `GET /intents/:id` - Read a payment intent
/// - `POST /maintenance/reap` - Run the expiry reaper once
pub fn payment_routes() -> Router<PaymentAppState> {
    Router::new()
        .route("/intents", post(create_payment_intent))
        .route("/intents/:id", get(get_payment_intent))
        .route("/maintenance/reap", post(run_reaper))
}

/// Create the gateway webhook router.
///
/// Separate from the intent routes because callbacks carry no buyer
/// identity.
///
/// # Routes
/// - `GET|POST /payment` - Unsigned callback
/// - `POST /payment/signed` - RSA-SHA256 signed callback
pub fn webhook_routes() -> Router<PaymentAppState> {
    Router::new()
        .route(
            "/payment",
            get(handle_payment_webhook_query).post(handle_payment_webhook),
        )
        .route("/payment/signed", post(handle_signed_payment_webhook))
}

/// Combined payment router, mounted under `/api`.
pub fn payment_router() -> Router<PaymentAppState> {
    Router::new()
        .nest("/payments", payment_routes())
        .nest("/webhooks", webhook_routes())
}
