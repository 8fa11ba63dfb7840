//! HTTP adapters - REST API implementations.

pub mod payment;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub use payment::{payment_router, PaymentAppState};

/// Builds the full application router with request tracing.
pub fn app_router(state: PaymentAppState) -> Router {
    Router::new()
        .route("/health", get(payment::health))
        .nest("/api", payment_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
