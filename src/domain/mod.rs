//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `idempotency` - Keys, request fingerprints and reservation records
//! - `payment` - Payment intents, transactions and gateway callbacks
//! - `order` - The order fields this core reads and writes

pub mod foundation;
pub mod idempotency;
pub mod order;
pub mod payment;
