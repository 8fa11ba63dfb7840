//! Idempotency domain - keys, request fingerprints and reservation records.

mod fingerprint;
mod key;
mod record;

pub use fingerprint::{RequestFingerprint, VOLATILE_FIELDS};
pub use key::{IdempotencyKey, MAX_KEY_LENGTH};
pub use record::{IdempotencyRecord, IdempotencyStatus};
