//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `IdempotencyStore` - Keyed reservation records with atomic create-if-absent
//! - `PaymentRepository` - Payment intents and transactions
//! - `OrderRepository` - The order collaborator's status fields and tracking steps
//! - `PaymentGateway` - Hosted-checkout provider

mod idempotency_store;
mod order_repository;
mod payment_gateway;
mod payment_repository;

pub use idempotency_store::{IdempotencyStore, ReserveOutcome};
pub use order_repository::OrderRepository;
pub use payment_gateway::{
    GatewayError, GatewayErrorCode, InitializeTransactionRequest, InitializedTransaction,
    PaymentGateway,
};
pub use payment_repository::PaymentRepository;
