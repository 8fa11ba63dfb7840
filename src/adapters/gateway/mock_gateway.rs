//! Mock payment gateway for tests.
//!
//! Counts calls, remembers the last request and can be told to reject or
//! to stall, which is how the concurrency tests widen the race window.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::ports::{
    GatewayError, InitializeTransactionRequest, InitializedTransaction, PaymentGateway,
};

/// Configurable in-process gateway.
#[derive(Default)]
pub struct MockPaymentGateway {
    calls: AtomicUsize,
    last_request: Mutex<Option<InitializeTransactionRequest>>,
    rejection: Option<String>,
    delay: Option<Duration>,
}

impl MockPaymentGateway {
    /// A gateway that accepts every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that answers every request with a non-success status.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            rejection: Some(message.into()),
            ..Self::default()
        }
    }

    /// Sleeps before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn last_request(&self) -> Option<InitializeTransactionRequest> {
        self.last_request.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn provider_name(&self) -> &'static str {
        "mock"
    }

    async fn initialize_transaction(
        &self,
        request: InitializeTransactionRequest,
    ) -> Result<InitializedTransaction, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().await = Some(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.rejection {
            return Err(GatewayError::rejected(message.clone()));
        }

        let checkout_url = format!("https://checkout.mock/pay/{}", request.tx_ref);
        Ok(InitializedTransaction {
            raw: json!({
                "status": "success",
                "message": "Hosted Link",
                "data": {"checkout_url": checkout_url}
            }),
            checkout_url,
        })
    }
}
