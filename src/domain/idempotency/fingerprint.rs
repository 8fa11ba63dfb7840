//! Request fingerprinting.
//!
//! A fingerprint is a SHA-256 digest over the canonical form of a request
//! payload. Two payloads that differ only in object key order, or only in
//! the volatile top-level fields, produce the same fingerprint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Top-level fields that change between retries of the same logical request.
pub const VOLATILE_FIELDS: [&str; 3] = ["idempotencyKey", "timestamp", "nonce"];

/// Hex-encoded SHA-256 digest of a normalized payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    /// Computes the fingerprint of a payload.
    pub fn of(payload: &Value) -> Self {
        let canonical = canonicalize(&strip_volatile(payload));
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        Self(hex::encode(digest))
    }

    /// Wraps a fingerprint loaded from storage.
    pub fn from_stored(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn strip_volatile(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => {
            let mut map = map.clone();
            for field in VOLATILE_FIELDS {
                map.remove(field);
            }
            Value::Object(map)
        }
        other => other.clone(),
    }
}

/// Rebuilds the value with every object's keys inserted in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                if let Some(child) = map.get(key) {
                    sorted.insert(key.clone(), canonicalize(child));
                }
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
