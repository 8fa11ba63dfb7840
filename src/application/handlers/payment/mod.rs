//! Payment handlers.
//!
//! ## Commands
//! - Creating payment intents (guarded by idempotency keys)
//! - Reconciling gateway webhooks
//!
//! ## Queries
//! - Get payment intent
//!
//! ## Background
//! - Expiry reaper for idempotency records and stale failed payments

mod create_payment_intent;
mod expiry_reaper;
mod get_payment_intent;
mod handle_payment_webhook;
mod idempotency_guard;

// Commands
pub use create_payment_intent::{
    CreatePaymentIntentCommand, CreatePaymentIntentConfig, CreatePaymentIntentHandler,
    CreatePaymentIntentResult, CREATE_PAYMENT_INTENT_OPERATION,
};
pub use handle_payment_webhook::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
    IgnoredReason,
};

// Queries
pub use get_payment_intent::{GetPaymentIntentHandler, GetPaymentIntentQuery};

// Idempotency and maintenance
pub use expiry_reaper::{ExpiryReaper, ExpiryReaperConfig, ReaperReport};
pub use idempotency_guard::{IdempotencyGuard, IdempotencyGuardConfig};
