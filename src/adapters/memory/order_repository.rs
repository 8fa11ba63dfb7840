//! In-memory order repository standing in for the order-management platform.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, OrderId};
use crate::domain::order::{OrderPaymentUpdate, OrderSnapshot, TrackingStep};
use crate::ports::OrderRepository;

#[derive(Default)]
struct OrderTables {
    orders: HashMap<OrderId, OrderSnapshot>,
    steps: Vec<TrackingStep>,
}

impl OrderTables {
    fn apply(&mut self, id: &OrderId, update: OrderPaymentUpdate) -> Result<(), DomainError> {
        let order = self.orders.get_mut(id).ok_or_else(|| {
            DomainError::new(ErrorCode::NotFound, format!("Order not found: {}", id))
        })?;
        update.apply_to(order);
        Ok(())
    }

    fn upsert_step(&mut self, step: &TrackingStep) {
        match self
            .steps
            .iter_mut()
            .find(|s| s.order_id == step.order_id && s.step_type == step.step_type)
        {
            Some(existing) => existing.message = step.message.clone(),
            None => self.steps.push(step.clone()),
        }
    }
}

/// Order storage keyed by id; tracking steps are unique per
/// `(order_id, step_type)`.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    tables: RwLock<OrderTables>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an order.
    pub async fn insert(&self, order: OrderSnapshot) {
        self.tables.write().await.orders.insert(order.id, order);
    }

    pub async fn get(&self, id: &OrderId) -> Option<OrderSnapshot> {
        self.tables.read().await.orders.get(id).cloned()
    }

    pub async fn tracking_steps(&self, id: &OrderId) -> Vec<TrackingStep> {
        self.tables
            .read()
            .await
            .steps
            .iter()
            .filter(|step| &step.order_id == id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_order(&self, id: &OrderId) -> Result<Option<OrderSnapshot>, DomainError> {
        Ok(self.get(id).await)
    }

    async fn update_payment_state(
        &self,
        id: &OrderId,
        update: OrderPaymentUpdate,
    ) -> Result<(), DomainError> {
        self.tables.write().await.apply(id, update)
    }

    async fn upsert_tracking_step(&self, step: &TrackingStep) -> Result<(), DomainError> {
        self.tables.write().await.upsert_step(step);
        Ok(())
    }

    async fn update_payment_state_with_step(
        &self,
        id: &OrderId,
        update: OrderPaymentUpdate,
        step: &TrackingStep,
    ) -> Result<(), DomainError> {
        let mut tables = self.tables.write().await;
        tables.apply(id, update)?;
        tables.upsert_step(step);
        Ok(())
    }
}
