//! HandlePaymentWebhookHandler - Reconciles gateway callbacks into intent,
//! transaction and order state.
//!
//! Not guarded by idempotency keys: callbacks converge on the same terminal
//! state however often they are delivered. Updates are conditional so a late
//! `failed` callback can never downgrade an intent that is already paid.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::foundation::{OrderId, Timestamp};
use crate::domain::order::{OrderPaymentUpdate, TrackingStep};
use crate::domain::payment::{
    PaymentError, PaymentIntentStatus, ProviderRef, TransactionStatus, WebhookNotification,
};
use crate::ports::{OrderRepository, PaymentRepository};

/// Command carrying a gateway callback payload.
///
/// Query-string callbacks are passed as a flat JSON object.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    pub payload: Value,
}

/// Why a callback changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    /// Payload had no transaction reference.
    MissingReference,
    /// No intent carries the reference (unknown, or already purged).
    UnknownReference,
    /// Intent already settled with a different terminal status.
    StaleStatus,
}

/// Result of webhook processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlePaymentWebhookResult {
    Reconciled {
        provider_ref: ProviderRef,
        status: PaymentIntentStatus,
        orders_updated: usize,
    },
    Ignored(IgnoredReason),
}

/// Handler for gateway callbacks.
pub struct HandlePaymentWebhookHandler {
    payments: Arc<dyn PaymentRepository>,
    orders: Arc<dyn OrderRepository>,
}

impl HandlePaymentWebhookHandler {
    pub fn new(payments: Arc<dyn PaymentRepository>, orders: Arc<dyn OrderRepository>) -> Self {
        Self { payments, orders }
    }

    /// Only storage failures are errors. Malformed or unmatched callbacks
    /// are acknowledged as no-ops.
    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<HandlePaymentWebhookResult, PaymentError> {
        let notification = WebhookNotification::from_payload(&cmd.payload);

        let Some(provider_ref) = notification.provider_ref else {
            tracing::warn!(
                raw_status = %notification.raw_status,
                "Payment webhook without transaction reference ignored"
            );
            return Ok(HandlePaymentWebhookResult::Ignored(
                IgnoredReason::MissingReference,
            ));
        };
        let status = notification.status;
        let now = Timestamp::now();

        let updated = self
            .payments
            .settle_intents(&provider_ref, status, now)
            .await
            .map_err(|e| {
                tracing::error!(
                    tx_ref = %provider_ref,
                    error = %e,
                    "Failed to update payment intents"
                );
                PaymentError::from(e)
            })?;

        if updated.is_empty() {
            return self.explain_no_match(&provider_ref, status).await;
        }

        let transactions = self
            .payments
            .settle_transactions(&provider_ref, TransactionStatus::from(status), now)
            .await
            .map_err(|e| {
                tracing::error!(
                    tx_ref = %provider_ref,
                    error = %e,
                    "Failed to update payment transactions"
                );
                PaymentError::from(e)
            })?;

        let mut seen = HashSet::new();
        let order_ids: Vec<OrderId> = updated
            .iter()
            .map(|intent| intent.order_id)
            .filter(|id| seen.insert(*id))
            .collect();

        let mut orders_updated = 0;
        for order_id in &order_ids {
            if self.apply_to_order(order_id, status).await? {
                orders_updated += 1;
            }
        }

        tracing::info!(
            tx_ref = %provider_ref,
            status = %status,
            raw_status = %notification.raw_status,
            intents = updated.len(),
            transactions,
            orders_updated,
            "Payment webhook reconciled"
        );

        Ok(HandlePaymentWebhookResult::Reconciled {
            provider_ref,
            status,
            orders_updated,
        })
    }

    /// Applies a settled status to an order. Returns true if the order changed.
    async fn apply_to_order(
        &self,
        order_id: &OrderId,
        status: PaymentIntentStatus,
    ) -> Result<bool, PaymentError> {
        let result = match status {
            PaymentIntentStatus::Paid => {
                self.orders
                    .update_payment_state_with_step(
                        order_id,
                        OrderPaymentUpdate::payment_confirmed(),
                        &TrackingStep::payment_confirmed(*order_id),
                    )
                    .await
            }
            PaymentIntentStatus::Failed => {
                self.orders
                    .update_payment_state(order_id, OrderPaymentUpdate::payment_failed())
                    .await
            }
            PaymentIntentStatus::Pending => return Ok(false),
        };

        result.map(|_| true).map_err(|e| {
            tracing::error!(
                order_id = %order_id,
                error = %e,
                "Failed to update order payment state"
            );
            PaymentError::from(e)
        })
    }

    async fn explain_no_match(
        &self,
        provider_ref: &ProviderRef,
        status: PaymentIntentStatus,
    ) -> Result<HandlePaymentWebhookResult, PaymentError> {
        let existing = self.payments.find_intents_by_provider_ref(provider_ref).await?;

        if existing.is_empty() {
            tracing::warn!(
                tx_ref = %provider_ref,
                status = %status,
                "Payment webhook for unknown transaction reference ignored"
            );
            return Ok(HandlePaymentWebhookResult::Ignored(
                IgnoredReason::UnknownReference,
            ));
        }

        for intent in &existing {
            tracing::warn!(
                tx_ref = %provider_ref,
                payment_intent_id = %intent.id,
                current = %intent.status,
                rejected = %status,
                "Payment webhook would regress a settled intent; ignored"
            );
        }
        Ok(HandlePaymentWebhookResult::Ignored(IgnoredReason::StaleStatus))
    }
}
