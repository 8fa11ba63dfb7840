//! IdempotencyStore port - Durable keyed record of guarded operations.
//!
//! ## Atomic Reservation
//!
//! Two concurrent requests carrying the same `(key, operation)` race on
//! `insert_if_absent`. Exactly one observes `Inserted`; the other observes
//! `AlreadyExists` with the winner's record and must not repeat the side
//! effect. Implementations must make this a single atomic step (a unique
//! constraint with conflict detection, or a lock held across check and
//! insert).

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::idempotency::{IdempotencyKey, IdempotencyRecord, IdempotencyStatus};

/// Result of attempting to reserve a key.
#[derive(Debug, Clone, PartialEq)]
pub enum ReserveOutcome {
    /// This caller now owns the key.
    Inserted(IdempotencyRecord),
    /// A live record already holds the key.
    AlreadyExists(IdempotencyRecord),
}

/// Port for idempotency record persistence.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Finds the record for `(key, operation)` unless it expired before `now`.
    async fn find_active(
        &self,
        key: &IdempotencyKey,
        operation: &str,
        now: Timestamp,
    ) -> Result<Option<IdempotencyRecord>, DomainError>;

    /// Inserts the record unless a live one exists for the same pair.
    ///
    /// An expired record occupying the pair is replaced.
    async fn insert_if_absent(&self, record: IdempotencyRecord)
        -> Result<ReserveOutcome, DomainError>;

    /// Finalizes a record in place. Returns false if no record matched.
    async fn update_status(
        &self,
        key: &IdempotencyKey,
        operation: &str,
        status: IdempotencyStatus,
        response_data: Option<Value>,
    ) -> Result<bool, DomainError>;

    /// Deletes every record with `expires_at < now`, returning the count.
    async fn delete_expired(&self, now: Timestamp) -> Result<u64, DomainError>;
}
