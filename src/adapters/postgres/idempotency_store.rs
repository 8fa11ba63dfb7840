//! PostgreSQL implementation of IdempotencyStore.
//!
//! Reservation is a single `INSERT ... ON CONFLICT (key, operation) DO UPDATE`
//! whose update arm only fires for an expired row. A returned row means
//! this caller owns the key; no row means a live record already exists.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use super::corrupt_column;
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::domain::idempotency::{
    IdempotencyKey, IdempotencyRecord, IdempotencyStatus, RequestFingerprint,
};
use crate::ports::{IdempotencyStore, ReserveOutcome};

/// Attempts before giving up when the conflicting row vanishes between
/// the insert and the follow-up read.
const RESERVE_ATTEMPTS: usize = 3;

pub struct PostgresIdempotencyStore {
    pool: PgPool,
}

impl PostgresIdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn try_reserve(
        &self,
        record: &IdempotencyRecord,
    ) -> Result<Option<IdempotencyRecord>, DomainError> {
        let row: Option<IdempotencyRow> = sqlx::query_as(
            r#"
            INSERT INTO idempotency_records (
                key, operation, request_fingerprint, status, response_data,
                created_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (key, operation) DO UPDATE SET
                request_fingerprint = EXCLUDED.request_fingerprint,
                status = EXCLUDED.status,
                response_data = EXCLUDED.response_data,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            WHERE idempotency_records.expires_at < EXCLUDED.created_at
            RETURNING key, operation, request_fingerprint, status, response_data,
                      created_at, expires_at
            "#,
        )
        .bind(record.key.as_str())
        .bind(&record.operation)
        .bind(record.request_fingerprint.as_str())
        .bind(record.status.as_str())
        .bind(&record.response_data)
        .bind(record.created_at.as_datetime())
        .bind(record.expires_at.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to reserve idempotency key: {}", e)))?;

        row.map(IdempotencyRecord::try_from).transpose()
    }

    async fn find_any(
        &self,
        key: &IdempotencyKey,
        operation: &str,
    ) -> Result<Option<IdempotencyRecord>, DomainError> {
        let row: Option<IdempotencyRow> = sqlx::query_as(
            r#"
            SELECT key, operation, request_fingerprint, status, response_data,
                   created_at, expires_at
            FROM idempotency_records
            WHERE key = $1 AND operation = $2
            "#,
        )
        .bind(key.as_str())
        .bind(operation)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load idempotency record: {}", e)))?;

        row.map(IdempotencyRecord::try_from).transpose()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IdempotencyRow {
    key: String,
    operation: String,
    request_fingerprint: String,
    status: String,
    response_data: Option<Value>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<IdempotencyRow> for IdempotencyRecord {
    type Error = DomainError;

    fn try_from(row: IdempotencyRow) -> Result<Self, Self::Error> {
        Ok(IdempotencyRecord {
            key: IdempotencyKey::parse(row.key).map_err(|e| corrupt_column("key", e))?,
            operation: row.operation,
            request_fingerprint: RequestFingerprint::from_stored(row.request_fingerprint.trim()),
            status: row
                .status
                .parse::<IdempotencyStatus>()
                .map_err(|e| corrupt_column("status", e))?,
            response_data: row.response_data,
            created_at: Timestamp::from_datetime(row.created_at),
            expires_at: Timestamp::from_datetime(row.expires_at),
        })
    }
}

#[async_trait]
impl IdempotencyStore for PostgresIdempotencyStore {
    async fn find_active(
        &self,
        key: &IdempotencyKey,
        operation: &str,
        now: Timestamp,
    ) -> Result<Option<IdempotencyRecord>, DomainError> {
        let row: Option<IdempotencyRow> = sqlx::query_as(
            r#"
            SELECT key, operation, request_fingerprint, status, response_data,
                   created_at, expires_at
            FROM idempotency_records
            WHERE key = $1 AND operation = $2 AND expires_at >= $3
            "#,
        )
        .bind(key.as_str())
        .bind(operation)
        .bind(now.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load idempotency record: {}", e)))?;

        row.map(IdempotencyRecord::try_from).transpose()
    }

    async fn insert_if_absent(
        &self,
        record: IdempotencyRecord,
    ) -> Result<ReserveOutcome, DomainError> {
        for _ in 0..RESERVE_ATTEMPTS {
            if let Some(inserted) = self.try_reserve(&record).await? {
                return Ok(ReserveOutcome::Inserted(inserted));
            }
            if let Some(existing) = self.find_any(&record.key, &record.operation).await? {
                return Ok(ReserveOutcome::AlreadyExists(existing));
            }
            tracing::debug!(
                idempotency_key = %record.key,
                operation = %record.operation,
                "Conflicting idempotency record disappeared, retrying reservation"
            );
        }

        Err(DomainError::new(
            ErrorCode::DatabaseError,
            "Could not reserve idempotency key",
        ))
    }

    async fn update_status(
        &self,
        key: &IdempotencyKey,
        operation: &str,
        status: IdempotencyStatus,
        response_data: Option<Value>,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE idempotency_records
            SET status = $3, response_data = $4
            WHERE key = $1 AND operation = $2
            "#,
        )
        .bind(key.as_str())
        .bind(operation)
        .bind(status.as_str())
        .bind(&response_data)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update idempotency record: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM idempotency_records WHERE expires_at < $1")
            .bind(now.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::database(format!(
                    "Failed to delete expired idempotency records: {}",
                    e
                ))
            })?;

        Ok(result.rows_affected())
    }
}
