//! In-memory adapters for tests and local development.

mod idempotency_store;
mod order_repository;
mod payment_repository;

pub use idempotency_store::InMemoryIdempotencyStore;
pub use order_repository::InMemoryOrderRepository;
pub use payment_repository::InMemoryPaymentRepository;
