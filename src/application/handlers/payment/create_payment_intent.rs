//! CreatePaymentIntentHandler - Opens a gateway checkout for an order.
//!
//! Every invocation runs under the idempotency guard with operation name
//! `create_payment_intent`. Order preconditions are checked after replay but
//! before the key is reserved, so a rejected request leaves the key free for
//! a corrected retry.

use std::sync::Arc;

use serde_json::{json, Value};

use super::idempotency_guard::IdempotencyGuard;
use crate::domain::foundation::{Currency, OrderId, PaymentIntentId, Timestamp, UserId};
use crate::domain::idempotency::IdempotencyKey;
use crate::domain::order::OrderSnapshot;
use crate::domain::payment::{
    IntentMetadata, PaymentError, PaymentIntent, PaymentIntentStatus, PaymentIntentSummary,
    PaymentTransaction, ProviderRef,
};
use crate::ports::{
    InitializeTransactionRequest, OrderRepository, PaymentGateway, PaymentRepository,
};

/// Operation name under which intent creation is guarded.
pub const CREATE_PAYMENT_INTENT_OPERATION: &str = "create_payment_intent";

/// Command to create a payment intent.
#[derive(Debug, Clone)]
pub struct CreatePaymentIntentCommand {
    pub order_id: OrderId,
    pub buyer_id: UserId,
    /// Falls back to the configured default currency.
    pub currency: Option<Currency>,
    /// Client metadata, validated before any side effect.
    pub metadata: Option<Value>,
    /// Generated when absent.
    pub idempotency_key: Option<IdempotencyKey>,
}

impl CreatePaymentIntentCommand {
    /// The normalized request the key is bound to.
    fn fingerprint_payload(&self) -> Value {
        json!({
            "orderId": self.order_id,
            "buyerId": self.buyer_id,
            "currency": self.currency,
            "metadata": self.metadata,
        })
    }
}

/// Result of intent creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePaymentIntentResult {
    pub intent: PaymentIntentSummary,
    /// The key the request ran under (echoed to clients that sent none).
    pub idempotency_key: IdempotencyKey,
    /// True when the response came from a cached record.
    pub replayed: bool,
}

/// Static settings for intent creation.
#[derive(Debug, Clone)]
pub struct CreatePaymentIntentConfig {
    /// Where the gateway sends callbacks.
    pub callback_url: String,
    pub default_currency: Currency,
    /// Recorded on every intent.
    pub method: String,
}

impl Default for CreatePaymentIntentConfig {
    fn default() -> Self {
        Self {
            callback_url: "http://localhost:8080/api/webhooks/payment".to_string(),
            default_currency: Currency::etb(),
            method: "hosted_checkout".to_string(),
        }
    }
}

/// Handler for creating payment intents.
pub struct CreatePaymentIntentHandler {
    guard: Arc<IdempotencyGuard>,
    orders: Arc<dyn OrderRepository>,
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    config: CreatePaymentIntentConfig,
}

impl CreatePaymentIntentHandler {
    pub fn new(
        guard: Arc<IdempotencyGuard>,
        orders: Arc<dyn OrderRepository>,
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        config: CreatePaymentIntentConfig,
    ) -> Self {
        Self {
            guard,
            orders,
            payments,
            gateway,
            config,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreatePaymentIntentCommand,
    ) -> Result<CreatePaymentIntentResult, PaymentError> {
        let key = cmd
            .idempotency_key
            .clone()
            .unwrap_or_else(IdempotencyGuard::generate_key);
        let payload = cmd.fingerprint_payload();

        // 1. Replay a key seen before
        if let Some(cached) = self
            .guard
            .replay_if_present(&key, CREATE_PAYMENT_INTENT_OPERATION, &payload)
            .await?
        {
            return Ok(CreatePaymentIntentResult {
                intent: decode_summary(cached)?,
                idempotency_key: key,
                replayed: true,
            });
        }

        // 2. Preconditions, without consuming the key
        let metadata = IntentMetadata::from_value(cmd.metadata.clone())?;
        let order = self.load_payable_order(&cmd.order_id, &cmd.buyer_id).await?;
        let currency = cmd
            .currency
            .clone()
            .unwrap_or_else(|| self.config.default_currency.clone());

        // 3. Reserve, call the gateway, persist, finalize
        let creator = IntentCreator {
            payments: self.payments.clone(),
            gateway: self.gateway.clone(),
            config: self.config.clone(),
        };
        let intent_key = key.clone();
        let response = self
            .guard
            .run_reserved(&key, CREATE_PAYMENT_INTENT_OPERATION, &payload, move || async move {
                creator
                    .create_intent(&order, currency, metadata, &intent_key)
                    .await
            })
            .await?;

        Ok(CreatePaymentIntentResult {
            intent: decode_summary(response)?,
            idempotency_key: key,
            replayed: false,
        })
    }

    async fn load_payable_order(
        &self,
        order_id: &OrderId,
        buyer_id: &UserId,
    ) -> Result<OrderSnapshot, PaymentError> {
        let order = self
            .orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("Order", order_id))?;

        if !order.is_awaiting_payment() {
            return Err(PaymentError::validation(
                "order_status",
                format!("Order is {} and cannot accept a payment", order.status),
            ));
        }

        if !order.is_owned_by(buyer_id) {
            tracing::warn!(
                order_id = %order_id,
                buyer_id = %buyer_id,
                "Payment attempted for an order owned by another buyer"
            );
            return Err(PaymentError::unauthorized("Order does not belong to this buyer"));
        }

        Ok(order)
    }
}

/// Owned copy of the dependencies the reserved side effect needs, so it can
/// outlive the request that started it.
struct IntentCreator {
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    config: CreatePaymentIntentConfig,
}

impl IntentCreator {
    async fn create_intent(
        &self,
        order: &OrderSnapshot,
        currency: Currency,
        metadata: IntentMetadata,
        key: &IdempotencyKey,
    ) -> Result<Value, PaymentError> {
        let tx_ref = ProviderRef::generate();

        let checkout = self
            .gateway
            .initialize_transaction(InitializeTransactionRequest {
                amount: order.total_amount,
                currency: currency.clone(),
                email: order.buyer.email.clone(),
                first_name: order.buyer.first_name.clone(),
                last_name: order.buyer.last_name.clone(),
                tx_ref: tx_ref.clone(),
                callback_url: self.config.callback_url.clone(),
            })
            .await
            .map_err(|e| {
                tracing::error!(
                    order_id = %order.id,
                    tx_ref = %tx_ref,
                    error = %e,
                    "Gateway rejected transaction initialization"
                );
                PaymentError::from(e)
            })?;

        let now = Timestamp::now();
        let intent = PaymentIntent {
            id: PaymentIntentId::new(),
            order_id: order.id,
            buyer_id: order.buyer_id.clone(),
            amount: order.total_amount,
            currency,
            method: self.config.method.clone(),
            status: PaymentIntentStatus::Pending,
            provider_ref: tx_ref.clone(),
            client_secret: checkout.checkout_url,
            metadata: metadata.with_correlation(key.as_str(), tx_ref.as_str()),
            idempotency_key: key.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        let transaction =
            PaymentTransaction::capture_for(&intent, self.gateway.provider_name(), checkout.raw);

        self.payments
            .create_intent_with_transaction(&intent, &transaction)
            .await
            .map_err(|e| {
                tracing::error!(
                    order_id = %order.id,
                    tx_ref = %tx_ref,
                    error = %e,
                    "Failed to persist payment intent"
                );
                PaymentError::from(e)
            })?;

        tracing::info!(
            payment_intent_id = %intent.id,
            order_id = %order.id,
            tx_ref = %tx_ref,
            amount = intent.amount.minor_units(),
            currency = %intent.currency,
            "Payment intent created"
        );

        serde_json::to_value(intent.summary())
            .map_err(|e| PaymentError::database(format!("Failed to encode summary: {}", e)))
    }
}

fn decode_summary(value: Value) -> Result<PaymentIntentSummary, PaymentError> {
    serde_json::from_value(value)
        .map_err(|e| PaymentError::database(format!("Cached response is unreadable: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::gateway::MockPaymentGateway;
    use crate::adapters::memory::{
        InMemoryIdempotencyStore, InMemoryOrderRepository, InMemoryPaymentRepository,
    };
    use crate::application::handlers::payment::IdempotencyGuardConfig;
    use crate::domain::foundation::{Amount, ErrorCode};
    use crate::domain::idempotency::IdempotencyStatus;
    use crate::domain::order::{BuyerContact, DeliveryStatus, OrderStatus, PaymentStatus};
    use crate::domain::payment::{TransactionStatus, TransactionType};
    use crate::ports::IdempotencyStore;
    use std::time::Duration;

    struct Fixture {
        handler: CreatePaymentIntentHandler,
        store: Arc<InMemoryIdempotencyStore>,
        orders: Arc<InMemoryOrderRepository>,
        payments: Arc<InMemoryPaymentRepository>,
        gateway: Arc<MockPaymentGateway>,
    }

    fn fixture_with(gateway: MockPaymentGateway, payments: InMemoryPaymentRepository) -> Fixture {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let orders = Arc::new(InMemoryOrderRepository::new());
        let payments = Arc::new(payments);
        let gateway = Arc::new(gateway);
        let guard = Arc::new(IdempotencyGuard::new(
            store.clone(),
            IdempotencyGuardConfig {
                ttl_hours: 24,
                in_flight_wait: Duration::from_millis(50),
                in_flight_poll: Duration::from_millis(5),
            },
        ));
        let handler = CreatePaymentIntentHandler::new(
            guard,
            orders.clone(),
            payments.clone(),
            gateway.clone(),
            CreatePaymentIntentConfig::default(),
        );
        Fixture {
            handler,
            store,
            orders,
            payments,
            gateway,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockPaymentGateway::new(), InMemoryPaymentRepository::new())
    }

    fn buyer() -> UserId {
        UserId::new("buyer-1").unwrap()
    }

    fn order(status: OrderStatus) -> OrderSnapshot {
        OrderSnapshot {
            id: OrderId::new(),
            buyer_id: buyer(),
            total_amount: Amount::from_minor(50_000).unwrap(),
            currency: Currency::etb(),
            status,
            payment_status: PaymentStatus::Unpaid,
            delivery_status: DeliveryStatus::NotScheduled,
            buyer: BuyerContact {
                email: "buyer@example.com".to_string(),
                first_name: "Abebe".to_string(),
                last_name: "Bikila".to_string(),
            },
        }
    }

    async fn seeded(f: &Fixture, status: OrderStatus) -> OrderSnapshot {
        let order = order(status);
        f.orders.insert(order.clone()).await;
        order
    }

    fn command(order_id: OrderId, key: &str) -> CreatePaymentIntentCommand {
        CreatePaymentIntentCommand {
            order_id,
            buyer_id: buyer(),
            currency: None,
            metadata: Some(json!({"note": "gift"})),
            idempotency_key: Some(IdempotencyKey::parse(key).unwrap()),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success Path
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn creates_pending_intent_with_capture_transaction() {
        let f = fixture();
        let order = seeded(&f, OrderStatus::AwaitingPayment).await;

        let result = f.handler.handle(command(order.id, "K1")).await.unwrap();

        assert!(!result.replayed);
        assert_eq!(result.intent.status, PaymentIntentStatus::Pending);
        assert_eq!(result.intent.amount.minor_units(), 50_000);
        assert_eq!(result.intent.currency.as_str(), "ETB");
        assert!(result.intent.client_secret.starts_with("https://"));

        let intents = f.payments.intents().await;
        assert_eq!(intents.len(), 1);
        let intent = &intents[0];
        assert_eq!(intent.metadata.get("note"), Some(&json!("gift")));
        assert_eq!(intent.metadata.get("idempotencyKey"), Some(&json!("K1")));
        assert_eq!(
            intent.metadata.get("txRef"),
            Some(&json!(intent.provider_ref.as_str()))
        );

        let transactions = f.payments.transactions().await;
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].status, TransactionStatus::Initiated);
        assert_eq!(transactions[0].transaction_type, TransactionType::Capture);
        assert_eq!(transactions[0].payment_intent_id, intent.id);
    }

    #[tokio::test]
    async fn gateway_receives_order_amount_and_buyer_contact() {
        let f = fixture();
        let order = seeded(&f, OrderStatus::AwaitingPayment).await;

        f.handler.handle(command(order.id, "K1")).await.unwrap();

        let request = f.gateway.last_request().await.unwrap();
        assert_eq!(request.amount, order.total_amount);
        assert_eq!(request.email, "buyer@example.com");
        assert!(request.tx_ref.as_str().starts_with("tx-"));
        assert_eq!(
            request.callback_url,
            CreatePaymentIntentConfig::default().callback_url
        );
    }

    #[tokio::test]
    async fn record_is_finalized_as_success_with_summary() {
        let f = fixture();
        let order = seeded(&f, OrderStatus::AwaitingPayment).await;

        let result = f.handler.handle(command(order.id, "K1")).await.unwrap();

        let record = f
            .store
            .find_active(
                &result.idempotency_key,
                CREATE_PAYMENT_INTENT_OPERATION,
                Timestamp::now(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, IdempotencyStatus::Success);
        assert_eq!(
            record.response_data,
            Some(serde_json::to_value(&result.intent).unwrap())
        );
    }

    #[tokio::test]
    async fn generates_key_when_none_supplied() {
        let f = fixture();
        let order = seeded(&f, OrderStatus::AwaitingPayment).await;
        let mut cmd = command(order.id, "unused");
        cmd.idempotency_key = None;

        let result = f.handler.handle(cmd).await.unwrap();
        assert_eq!(result.idempotency_key.as_str().len(), 64);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Idempotency
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn replay_returns_identical_summary_without_second_gateway_call() {
        let f = fixture();
        let order = seeded(&f, OrderStatus::AwaitingPayment).await;

        let first = f.handler.handle(command(order.id, "K1")).await.unwrap();
        let second = f.handler.handle(command(order.id, "K1")).await.unwrap();

        assert!(second.replayed);
        assert_eq!(first.intent, second.intent);
        assert_eq!(
            serde_json::to_vec(&first.intent).unwrap(),
            serde_json::to_vec(&second.intent).unwrap()
        );
        assert_eq!(f.gateway.call_count(), 1);
        assert_eq!(f.payments.intents().await.len(), 1);
    }

    #[tokio::test]
    async fn same_key_different_payload_is_conflict() {
        let f = fixture();
        let order = seeded(&f, OrderStatus::AwaitingPayment).await;
        f.handler.handle(command(order.id, "K1")).await.unwrap();

        let mut changed = command(order.id, "K1");
        changed.currency = Some(Currency::new("USD").unwrap());
        let result = f.handler.handle(changed).await;

        assert!(matches!(result, Err(PaymentError::Conflict(_))));
        assert_eq!(f.payments.intents().await.len(), 1);
        assert_eq!(f.gateway.call_count(), 1);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Preconditions
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let f = fixture();
        let result = f.handler.handle(command(OrderId::new(), "K1")).await;
        assert!(matches!(result, Err(PaymentError::NotFound { .. })));
        assert_eq!(f.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn order_not_awaiting_payment_fails_validation_without_gateway_call() {
        let f = fixture();
        let order = seeded(&f, OrderStatus::AwaitingDelivery).await;

        let result = f.handler.handle(command(order.id, "K1")).await;

        let err = result.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        assert_eq!(f.gateway.call_count(), 0);
        assert!(f.payments.intents().await.is_empty());
    }

    #[tokio::test]
    async fn precondition_failure_does_not_consume_key() {
        let f = fixture();
        let order = seeded(&f, OrderStatus::Cancelled).await;

        assert!(f.handler.handle(command(order.id, "K1")).await.is_err());
        assert_eq!(f.store.len().await, 0);

        let mut fixed = order.clone();
        fixed.status = OrderStatus::AwaitingPayment;
        f.orders.insert(fixed).await;

        let result = f.handler.handle(command(order.id, "K1")).await.unwrap();
        assert!(!result.replayed);
        assert_eq!(f.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn other_buyer_is_unauthorized() {
        let f = fixture();
        let order = seeded(&f, OrderStatus::AwaitingPayment).await;
        let mut cmd = command(order.id, "K1");
        cmd.buyer_id = UserId::new("intruder").unwrap();

        let result = f.handler.handle(cmd).await;
        assert!(matches!(result, Err(PaymentError::Unauthorized(_))));
        assert_eq!(f.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn invalid_metadata_is_rejected_before_reservation() {
        let f = fixture();
        let order = seeded(&f, OrderStatus::AwaitingPayment).await;
        let mut cmd = command(order.id, "K1");
        cmd.metadata = Some(json!("not an object"));

        let result = f.handler.handle(cmd).await;
        assert!(matches!(result, Err(PaymentError::Validation { .. })));
        assert_eq!(f.store.len().await, 0);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failures after reservation
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn gateway_rejection_is_provider_error_and_cached_as_failure() {
        let f = fixture_with(
            MockPaymentGateway::rejecting("Invalid currency"),
            InMemoryPaymentRepository::new(),
        );
        let order = seeded(&f, OrderStatus::AwaitingPayment).await;

        let err = f.handler.handle(command(order.id, "K1")).await.unwrap_err();
        assert_eq!(err, PaymentError::provider("Invalid currency"));
        assert!(f.payments.intents().await.is_empty());

        let replayed = f.handler.handle(command(order.id, "K1")).await.unwrap_err();
        assert!(matches!(replayed, PaymentError::PreviouslyFailed { .. }));
        assert_eq!(replayed.code(), ErrorCode::ProviderError);
        assert_eq!(f.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn abandoned_request_still_finalizes_its_key() {
        let f = fixture_with(
            MockPaymentGateway::new().with_delay(Duration::from_millis(200)),
            InMemoryPaymentRepository::new(),
        );
        let order = seeded(&f, OrderStatus::AwaitingPayment).await;

        let dropped = tokio::time::timeout(
            Duration::from_millis(50),
            f.handler.handle(command(order.id, "K1")),
        )
        .await;
        assert!(dropped.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;

        let record = f
            .store
            .find_active(
                &IdempotencyKey::parse("K1").unwrap(),
                CREATE_PAYMENT_INTENT_OPERATION,
                Timestamp::now(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, IdempotencyStatus::Success);

        let retried = f.handler.handle(command(order.id, "K1")).await.unwrap();
        assert!(retried.replayed);
        assert_eq!(f.gateway.call_count(), 1);
        assert_eq!(f.payments.intents().await.len(), 1);
        assert_eq!(f.payments.intents().await[0].id, retried.intent.id);
    }

    #[tokio::test]
    async fn persistence_failure_leaves_no_partial_rows() {
        let f = fixture_with(
            MockPaymentGateway::new(),
            InMemoryPaymentRepository::with_failing_writes(),
        );
        let order = seeded(&f, OrderStatus::AwaitingPayment).await;

        let err = f.handler.handle(command(order.id, "K1")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert!(f.payments.intents().await.is_empty());
        assert!(f.payments.transactions().await.is_empty());

        let record = f
            .store
            .find_active(
                &IdempotencyKey::parse("K1").unwrap(),
                CREATE_PAYMENT_INTENT_OPERATION,
                Timestamp::now(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, IdempotencyStatus::Failure);
        assert_eq!(
            record.response_data.unwrap()["code"],
            json!("DATABASE_ERROR")
        );
    }
}
