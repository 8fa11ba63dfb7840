//! Intent metadata validated at the boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::ValidationError;

/// Maximum number of top-level metadata keys.
pub const MAX_METADATA_KEYS: usize = 50;

/// Maximum serialized metadata size in bytes.
pub const MAX_METADATA_BYTES: usize = 8 * 1024;

/// Free-form key/value metadata attached to a payment intent.
///
/// Always a JSON object; size-bounded so a client cannot bloat the intent row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentMetadata(Map<String, Value>);

impl IntentMetadata {
    /// Validates client-supplied metadata. `None` and `null` mean empty.
    pub fn from_value(value: Option<Value>) -> Result<Self, ValidationError> {
        let map = match value {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(ValidationError::invalid_format(
                    "metadata",
                    "must be a JSON object",
                ))
            }
        };

        if map.len() > MAX_METADATA_KEYS {
            return Err(ValidationError::out_of_range(
                "metadata",
                0,
                MAX_METADATA_KEYS as i64,
                map.len() as i64,
            ));
        }

        let size = Value::Object(map.clone()).to_string().len();
        if size > MAX_METADATA_BYTES {
            return Err(ValidationError::out_of_range(
                "metadata",
                0,
                MAX_METADATA_BYTES as i64,
                size as i64,
            ));
        }

        Ok(Self(map))
    }

    /// Returns a copy with the correlation fields the orchestrator records.
    pub fn with_correlation(&self, idempotency_key: &str, tx_ref: &str) -> Self {
        let mut map = self.0.clone();
        map.insert(
            "idempotencyKey".to_string(),
            Value::String(idempotency_key.to_string()),
        );
        map.insert("txRef".to_string(), Value::String(tx_ref.to_string()));
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}
