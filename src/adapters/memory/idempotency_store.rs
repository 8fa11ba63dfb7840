//! In-memory idempotency store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::idempotency::{IdempotencyKey, IdempotencyRecord, IdempotencyStatus};
use crate::ports::{IdempotencyStore, ReserveOutcome};

type RecordKey = (String, String);

/// Idempotency store backed by a map under one write lock.
///
/// Check-and-insert happens while holding the write lock, which gives the
/// same create-if-absent guarantee as a unique constraint.
#[derive(Default)]
pub struct InMemoryIdempotencyStore {
    records: RwLock<HashMap<RecordKey, IdempotencyRecord>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn record_key(key: &IdempotencyKey, operation: &str) -> RecordKey {
        (key.as_str().to_string(), operation.to_string())
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn find_active(
        &self,
        key: &IdempotencyKey,
        operation: &str,
        now: Timestamp,
    ) -> Result<Option<IdempotencyRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .get(&Self::record_key(key, operation))
            .filter(|record| !record.is_expired(&now))
            .cloned())
    }

    async fn insert_if_absent(
        &self,
        record: IdempotencyRecord,
    ) -> Result<ReserveOutcome, DomainError> {
        let mut records = self.records.write().await;
        let map_key = Self::record_key(&record.key, &record.operation);
        let now = Timestamp::now();

        if let Some(existing) = records.get(&map_key) {
            if !existing.is_expired(&now) {
                return Ok(ReserveOutcome::AlreadyExists(existing.clone()));
            }
        }

        records.insert(map_key, record.clone());
        Ok(ReserveOutcome::Inserted(record))
    }

    async fn update_status(
        &self,
        key: &IdempotencyKey,
        operation: &str,
        status: IdempotencyStatus,
        response_data: Option<Value>,
    ) -> Result<bool, DomainError> {
        let mut records = self.records.write().await;
        match records.get_mut(&Self::record_key(key, operation)) {
            Some(record) => {
                record.status = status;
                record.response_data = response_data;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, DomainError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(&now));
        Ok((before - records.len()) as u64)
    }
}
