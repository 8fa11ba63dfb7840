//! Idempotency key value object.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

/// Number of random bytes in a generated key.
const GENERATED_KEY_BYTES: usize = 32;

/// Upper bound on client-supplied key length.
pub const MAX_KEY_LENGTH: usize = 255;

/// Token that scopes "the same logical request" across retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Generates a fresh key from the operating system CSPRNG.
    ///
    /// 256 bits of entropy, hex-encoded (64 characters).
    pub fn generate() -> Self {
        let mut bytes = [0u8; GENERATED_KEY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Accepts a client-supplied key.
    ///
    /// Keys must be 1..=255 visible ASCII characters so they survive
    /// header transport unchanged.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(ValidationError::empty_field("idempotency_key"));
        }
        if raw.len() > MAX_KEY_LENGTH {
            return Err(ValidationError::out_of_range(
                "idempotency_key",
                1,
                MAX_KEY_LENGTH as i64,
                raw.len() as i64,
            ));
        }
        if !raw.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ValidationError::invalid_format(
                "idempotency_key",
                "only visible ASCII characters are allowed",
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
