//! Payment domain - intents, transactions, status vocabulary and callbacks.
//!
//! A payment intent is created once per accepted gateway checkout and then
//! moves monotonically from `Pending` to `Paid` or `Failed` as gateway
//! callbacks arrive.

mod errors;
mod intent;
mod metadata;
mod signature;
mod status;
mod webhook;

pub use errors::PaymentError;
pub use intent::{PaymentIntent, PaymentIntentSummary, PaymentTransaction, ProviderRef};
pub use metadata::{IntentMetadata, MAX_METADATA_BYTES, MAX_METADATA_KEYS};
pub use signature::{verify_signature, RsaSignatureVerifier, SignatureError};
pub use status::{PaymentIntentStatus, TransactionStatus, TransactionType};
pub use webhook::{WebhookNotification, REFERENCE_FIELDS};
