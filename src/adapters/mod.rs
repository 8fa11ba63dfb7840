//! Adapters - Implementations of port interfaces.
//!
//! - `postgres` - sqlx-backed stores and repositories
//! - `memory` - In-process stores for tests and local development
//! - `gateway` - Hosted-checkout HTTP gateway and its mock
//! - `http` - Axum routes, handlers and DTOs
//! - `observability` - Logging initialization

pub mod gateway;
pub mod http;
pub mod memory;
pub mod observability;
pub mod postgres;

pub use gateway::{HttpGatewayConfig, HttpPaymentGateway, MockPaymentGateway};
pub use memory::{InMemoryIdempotencyStore, InMemoryOrderRepository, InMemoryPaymentRepository};
pub use observability::{init_logging, LogFormat};
pub use postgres::{PostgresIdempotencyStore, PostgresOrderRepository, PostgresPaymentRepository};
