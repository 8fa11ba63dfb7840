//! OrderRepository port - The order collaborator this core reads and mutates.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OrderId};
use crate::domain::order::{OrderPaymentUpdate, OrderSnapshot, TrackingStep};

/// Port for the order-management platform's order storage.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_order(&self, id: &OrderId) -> Result<Option<OrderSnapshot>, DomainError>;

    /// Applies the non-empty fields of `update`.
    async fn update_payment_state(
        &self,
        id: &OrderId,
        update: OrderPaymentUpdate,
    ) -> Result<(), DomainError>;

    /// Inserts the step, or rewrites its message if the order already has a
    /// step of that type.
    async fn upsert_tracking_step(&self, step: &TrackingStep) -> Result<(), DomainError>;

    /// `update_payment_state` plus `upsert_tracking_step` in one atomic unit.
    async fn update_payment_state_with_step(
        &self,
        id: &OrderId,
        update: OrderPaymentUpdate,
        step: &TrackingStep,
    ) -> Result<(), DomainError>;
}
