//! GetPaymentIntentHandler - Query handler for a single payment intent.

use std::sync::Arc;

use crate::domain::foundation::PaymentIntentId;
use crate::domain::payment::{PaymentError, PaymentIntentSummary};
use crate::ports::PaymentRepository;

/// Query for a payment intent by id.
#[derive(Debug, Clone)]
pub struct GetPaymentIntentQuery {
    pub id: PaymentIntentId,
}

/// Handler for reading payment intents. Pure read; no idempotency involved.
pub struct GetPaymentIntentHandler {
    payments: Arc<dyn PaymentRepository>,
}

impl GetPaymentIntentHandler {
    pub fn new(payments: Arc<dyn PaymentRepository>) -> Self {
        Self { payments }
    }

    pub async fn handle(
        &self,
        query: GetPaymentIntentQuery,
    ) -> Result<Option<PaymentIntentSummary>, PaymentError> {
        let intent = self.payments.find_intent_by_id(&query.id).await?;
        Ok(intent.map(|intent| intent.summary()))
    }
}
