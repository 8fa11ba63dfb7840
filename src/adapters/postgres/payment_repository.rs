//! PostgreSQL implementation of PaymentRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::corrupt_column;
use crate::domain::foundation::{
    Amount, Currency, DomainError, OrderId, PaymentIntentId, Timestamp, UserId,
};
use crate::domain::payment::{
    IntentMetadata, PaymentIntent, PaymentIntentStatus, PaymentTransaction, ProviderRef,
    TransactionStatus,
};
use crate::ports::PaymentRepository;

const INTENT_COLUMNS: &str = "id, order_id, buyer_id, amount, currency, method, status, \
     provider_ref, client_secret, metadata, idempotency_key, created_at, updated_at";

pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentIntentRow {
    id: Uuid,
    order_id: Uuid,
    buyer_id: String,
    amount: i64,
    currency: String,
    method: String,
    status: String,
    provider_ref: String,
    client_secret: String,
    metadata: Value,
    idempotency_key: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentIntentRow> for PaymentIntent {
    type Error = DomainError;

    fn try_from(row: PaymentIntentRow) -> Result<Self, Self::Error> {
        Ok(PaymentIntent {
            id: PaymentIntentId::from_uuid(row.id),
            order_id: OrderId::from_uuid(row.order_id),
            buyer_id: UserId::new(row.buyer_id).map_err(|e| corrupt_column("buyer_id", e))?,
            amount: Amount::from_minor(row.amount).map_err(|e| corrupt_column("amount", e))?,
            currency: Currency::new(row.currency.trim())
                .map_err(|e| corrupt_column("currency", e))?,
            method: row.method,
            status: row
                .status
                .parse::<PaymentIntentStatus>()
                .map_err(|e| corrupt_column("status", e))?,
            provider_ref: ProviderRef::new(row.provider_ref)
                .map_err(|e| corrupt_column("provider_ref", e))?,
            client_secret: row.client_secret,
            metadata: serde_json::from_value::<IntentMetadata>(row.metadata)
                .map_err(|e| corrupt_column("metadata", e))?,
            idempotency_key: row.idempotency_key,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn create_intent_with_transaction(
        &self,
        intent: &PaymentIntent,
        transaction: &PaymentTransaction,
    ) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::database(format!("Failed to start transaction: {}", e))
        })?;

        sqlx::query(
            r#"
            INSERT INTO payment_intents (
                id, order_id, buyer_id, amount, currency, method, status, provider_ref,
                client_secret, metadata, idempotency_key, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(intent.id.as_uuid())
        .bind(intent.order_id.as_uuid())
        .bind(intent.buyer_id.as_str())
        .bind(intent.amount.minor_units())
        .bind(intent.currency.as_str())
        .bind(&intent.method)
        .bind(intent.status.as_str())
        .bind(intent.provider_ref.as_str())
        .bind(&intent.client_secret)
        .bind(intent.metadata.to_value())
        .bind(&intent.idempotency_key)
        .bind(intent.created_at.as_datetime())
        .bind(intent.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert payment intent: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO payment_transactions (
                id, order_id, payment_intent_id, provider, provider_ref, amount, status,
                transaction_type, raw_payload, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.order_id.as_uuid())
        .bind(transaction.payment_intent_id.as_uuid())
        .bind(&transaction.provider)
        .bind(transaction.provider_ref.as_str())
        .bind(transaction.amount.minor_units())
        .bind(transaction.status.as_str())
        .bind(transaction.transaction_type.as_str())
        .bind(&transaction.raw_payload)
        .bind(transaction.created_at.as_datetime())
        .bind(transaction.updated_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            DomainError::database(format!("Failed to insert payment transaction: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            DomainError::database(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(())
    }

    async fn find_intent_by_id(
        &self,
        id: &PaymentIntentId,
    ) -> Result<Option<PaymentIntent>, DomainError> {
        let row: Option<PaymentIntentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_intents WHERE id = $1",
            INTENT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load payment intent: {}", e)))?;

        row.map(PaymentIntent::try_from).transpose()
    }

    async fn find_intents_by_provider_ref(
        &self,
        provider_ref: &ProviderRef,
    ) -> Result<Vec<PaymentIntent>, DomainError> {
        let rows: Vec<PaymentIntentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_intents WHERE provider_ref = $1",
            INTENT_COLUMNS
        ))
        .bind(provider_ref.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load payment intents: {}", e)))?;

        rows.into_iter().map(PaymentIntent::try_from).collect()
    }

    async fn settle_intents(
        &self,
        provider_ref: &ProviderRef,
        status: PaymentIntentStatus,
        now: Timestamp,
    ) -> Result<Vec<PaymentIntent>, DomainError> {
        let rows: Vec<PaymentIntentRow> = sqlx::query_as(&format!(
            r#"
            UPDATE payment_intents
            SET status = $2, updated_at = $3
            WHERE provider_ref = $1 AND (status = 'pending' OR status = $2)
            RETURNING {}
            "#,
            INTENT_COLUMNS
        ))
        .bind(provider_ref.as_str())
        .bind(status.as_str())
        .bind(now.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to settle payment intents: {}", e)))?;

        rows.into_iter().map(PaymentIntent::try_from).collect()
    }

    async fn settle_transactions(
        &self,
        provider_ref: &ProviderRef,
        status: TransactionStatus,
        now: Timestamp,
    ) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_transactions
            SET status = $2, updated_at = $3
            WHERE provider_ref = $1 AND (status IN ('initiated', 'pending') OR status = $2)
            "#,
        )
        .bind(provider_ref.as_str())
        .bind(status.as_str())
        .bind(now.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::database(format!("Failed to settle payment transactions: {}", e))
        })?;

        Ok(result.rows_affected())
    }

    async fn delete_failed_intents_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query(
            "DELETE FROM payment_intents WHERE status = 'failed' AND created_at < $1",
        )
        .bind(cutoff.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to delete failed intents: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn delete_failed_transactions_before(
        &self,
        cutoff: Timestamp,
    ) -> Result<u64, DomainError> {
        let result = sqlx::query(
            "DELETE FROM payment_transactions WHERE status = 'failed' AND created_at < $1",
        )
        .bind(cutoff.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::database(format!("Failed to delete failed transactions: {}", e))
        })?;

        Ok(result.rows_affected())
    }
}

