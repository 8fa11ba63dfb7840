//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresIdempotencyStore` - Reservation records with atomic create-if-absent
//! - `PostgresPaymentRepository` - Payment intents and their transactions
//! - `PostgresOrderRepository` - Order status columns and tracking steps

mod idempotency_store;
mod order_repository;
mod payment_repository;

pub use idempotency_store::PostgresIdempotencyStore;
pub use order_repository::PostgresOrderRepository;
pub use payment_repository::PostgresPaymentRepository;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Maps an unreadable stored value to a database error naming the column.
fn corrupt_column(column: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid {} value in database: {}", column, err),
    )
}
