//! PostgreSQL implementation of OrderRepository.
//!
//! Touches only the status columns and tracking steps of the order tables;
//! everything else about an order belongs to the platform.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::corrupt_column;
use crate::domain::foundation::{Amount, Currency, DomainError, ErrorCode, OrderId, UserId};
use crate::domain::order::{
    BuyerContact, DeliveryStatus, OrderPaymentUpdate, OrderSnapshot, OrderStatus, PaymentStatus,
    TrackingStep,
};
use crate::ports::OrderRepository;

pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    buyer_id: String,
    total_amount: i64,
    currency: String,
    status: String,
    payment_status: String,
    delivery_status: String,
    buyer_email: String,
    buyer_first_name: String,
    buyer_last_name: String,
}

impl TryFrom<OrderRow> for OrderSnapshot {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(OrderSnapshot {
            id: OrderId::from_uuid(row.id),
            buyer_id: UserId::new(row.buyer_id).map_err(|e| corrupt_column("buyer_id", e))?,
            total_amount: Amount::from_minor(row.total_amount)
                .map_err(|e| corrupt_column("total_amount", e))?,
            currency: Currency::new(row.currency.trim())
                .map_err(|e| corrupt_column("currency", e))?,
            status: row
                .status
                .parse::<OrderStatus>()
                .map_err(|e| corrupt_column("status", e))?,
            payment_status: row
                .payment_status
                .parse::<PaymentStatus>()
                .map_err(|e| corrupt_column("payment_status", e))?,
            delivery_status: row
                .delivery_status
                .parse::<DeliveryStatus>()
                .map_err(|e| corrupt_column("delivery_status", e))?,
            buyer: BuyerContact {
                email: row.buyer_email,
                first_name: row.buyer_first_name,
                last_name: row.buyer_last_name,
            },
        })
    }
}

async fn apply_update(
    tx: &mut Transaction<'_, Postgres>,
    id: &OrderId,
    update: OrderPaymentUpdate,
) -> Result<(), DomainError> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            status = COALESCE($2, status),
            payment_status = COALESCE($3, payment_status),
            delivery_status = COALESCE($4, delivery_status),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id.as_uuid())
    .bind(update.status.map(|s| s.as_str()))
    .bind(update.payment_status.map(|s| s.as_str()))
    .bind(update.delivery_status.map(|s| s.as_str()))
    .execute(&mut **tx)
    .await
    .map_err(|e| DomainError::database(format!("Failed to update order: {}", e)))?;

    if result.rows_affected() == 0 {
        return Err(DomainError::new(
            ErrorCode::NotFound,
            format!("Order not found: {}", id),
        ));
    }

    Ok(())
}

async fn upsert_step(
    tx: &mut Transaction<'_, Postgres>,
    step: &TrackingStep,
) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO order_tracking_steps (id, order_id, step_type, message)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (order_id, step_type) DO UPDATE SET message = EXCLUDED.message
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(step.order_id.as_uuid())
    .bind(&step.step_type)
    .bind(&step.message)
    .execute(&mut **tx)
    .await
    .map_err(|e| DomainError::database(format!("Failed to upsert tracking step: {}", e)))?;

    Ok(())
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn find_order(&self, id: &OrderId) -> Result<Option<OrderSnapshot>, DomainError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, buyer_id, total_amount, currency, status, payment_status,
                   delivery_status, buyer_email, buyer_first_name, buyer_last_name
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load order: {}", e)))?;

        row.map(OrderSnapshot::try_from).transpose()
    }

    async fn update_payment_state(
        &self,
        id: &OrderId,
        update: OrderPaymentUpdate,
    ) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::database(format!("Failed to start transaction: {}", e))
        })?;
        apply_update(&mut tx, id, update).await?;
        tx.commit().await.map_err(|e| {
            DomainError::database(format!("Failed to commit transaction: {}", e))
        })
    }

    async fn upsert_tracking_step(&self, step: &TrackingStep) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::database(format!("Failed to start transaction: {}", e))
        })?;
        upsert_step(&mut tx, step).await?;
        tx.commit().await.map_err(|e| {
            DomainError::database(format!("Failed to commit transaction: {}", e))
        })
    }

    async fn update_payment_state_with_step(
        &self,
        id: &OrderId,
        update: OrderPaymentUpdate,
        step: &TrackingStep,
    ) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::database(format!("Failed to start transaction: {}", e))
        })?;

        apply_update(&mut tx, id, update).await?;
        upsert_step(&mut tx, step).await?;

        tx.commit().await.map_err(|e| {
            DomainError::database(format!("Failed to commit transaction: {}", e))
        })
    }
}
