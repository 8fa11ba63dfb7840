//! Payment-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | Validation | 400 |
//! | NotFound | 404 |
//! | Conflict | 409 |
//! | RequestInProgress | 409 |
//! | Unauthorized | 403 |
//! | Provider | 502 |
//! | Database | 500 |
//! | PreviouslyFailed | status of the cached code |

use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Errors surfaced by intent creation and lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// Bad input, or the order is not in a payable state. No gateway call made.
    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// Idempotency key reused for a different request.
    #[error("{0}")]
    Conflict(String),

    /// Another request holding the same key has not finished yet.
    #[error("A request with this idempotency key is still in progress")]
    RequestInProgress,

    /// The caller does not own the order.
    #[error("{0}")]
    Unauthorized(String),

    /// Gateway rejected the request or was unreachable.
    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Cached terminal failure replayed for a key.
    #[error("{message}")]
    PreviouslyFailed { code: ErrorCode, message: String },
}

impl PaymentError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PaymentError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        PaymentError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn conflict() -> Self {
        PaymentError::Conflict(
            "Idempotency key was already used for a different request".to_string(),
        )
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        PaymentError::Unauthorized(message.into())
    }

    pub fn provider(message: impl Into<String>) -> Self {
        PaymentError::Provider(message.into())
    }

    pub fn database(message: impl Into<String>) -> Self {
        PaymentError::Database(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            PaymentError::Validation { .. } => ErrorCode::ValidationFailed,
            PaymentError::NotFound { .. } => ErrorCode::NotFound,
            PaymentError::Conflict(_) => ErrorCode::Conflict,
            PaymentError::RequestInProgress => ErrorCode::RequestInProgress,
            PaymentError::Unauthorized(_) => ErrorCode::Forbidden,
            PaymentError::Provider(_) => ErrorCode::ProviderError,
            PaymentError::Database(_) => ErrorCode::DatabaseError,
            PaymentError::PreviouslyFailed { code, .. } => *code,
        }
    }

    /// Message safe to show a client. Database detail is withheld.
    pub fn message(&self) -> String {
        match self {
            PaymentError::Database(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }

    /// Returns true if retrying with a fresh idempotency key may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::Provider(_) | PaymentError::Database(_) | PaymentError::RequestInProgress
        )
    }

    /// Payload stored on a FAILURE idempotency record.
    pub fn to_cached_response(&self) -> Value {
        json!({
            "code": self.code().to_string(),
            "message": self.message(),
        })
    }

    /// Rebuilds the replayed error from a FAILURE record's payload.
    pub fn from_cached_response(response: Option<&Value>) -> Self {
        let code = response
            .and_then(|v| v.get("code"))
            .and_then(Value::as_str)
            .and_then(ErrorCode::parse)
            .unwrap_or(ErrorCode::InternalError);
        let message = response
            .and_then(|v| v.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Previous attempt with this idempotency key failed")
            .to_string();
        PaymentError::PreviouslyFailed { code, message }
    }
}

impl From<ValidationError> for PaymentError {
    fn from(err: ValidationError) -> Self {
        PaymentError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for PaymentError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::OutOfRange
            | ErrorCode::InvalidFormat => PaymentError::Validation {
                field: err.detail("field").unwrap_or("unknown").to_string(),
                message: err.message,
            },
            ErrorCode::NotFound => PaymentError::NotFound {
                resource: "Resource",
                id: err.detail("id").unwrap_or("unknown").to_string(),
            },
            ErrorCode::Conflict => PaymentError::Conflict(err.message),
            ErrorCode::RequestInProgress => PaymentError::RequestInProgress,
            ErrorCode::Unauthorized | ErrorCode::Forbidden => {
                PaymentError::Unauthorized(err.message)
            }
            ErrorCode::ProviderError => PaymentError::Provider(err.message),
            _ => PaymentError::Database(err.to_string()),
        }
    }
}
