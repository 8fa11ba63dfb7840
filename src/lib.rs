//! Order Payments - idempotent payment intents and webhook reconciliation
//!
//! Opens hosted-checkout payments for orders with at-most-once gateway
//! calls per idempotency key, reconciles asynchronous gateway callbacks into
//! intent, transaction and order state, and purges expired records.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
