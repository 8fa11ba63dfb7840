//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, and error types
//! that form the vocabulary of the payments domain.

mod errors;
mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{OrderId, PaymentIntentId, PaymentTransactionId, UserId};
pub use money::{Amount, Currency};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
