//! Shared wiring for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use order_payments::adapters::http::PaymentAppState;
use order_payments::adapters::{
    InMemoryIdempotencyStore, InMemoryOrderRepository, InMemoryPaymentRepository,
    MockPaymentGateway,
};
use order_payments::application::handlers::{
    CreatePaymentIntentConfig, CreatePaymentIntentHandler, ExpiryReaper, ExpiryReaperConfig,
    HandlePaymentWebhookHandler, IdempotencyGuard, IdempotencyGuardConfig,
};
use order_payments::domain::foundation::{Amount, Currency, OrderId, UserId};
use order_payments::domain::order::{
    BuyerContact, DeliveryStatus, OrderSnapshot, OrderStatus, PaymentStatus,
};
use order_payments::domain::payment::RsaSignatureVerifier;

pub const BUYER: &str = "buyer-1";

pub struct Harness {
    pub store: Arc<InMemoryIdempotencyStore>,
    pub orders: Arc<InMemoryOrderRepository>,
    pub payments: Arc<InMemoryPaymentRepository>,
    pub gateway: Arc<MockPaymentGateway>,
    pub guard: Arc<IdempotencyGuard>,
    pub reaper: Arc<ExpiryReaper>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_gateway(MockPaymentGateway::new())
    }

    pub fn with_gateway(gateway: MockPaymentGateway) -> Self {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let guard = Arc::new(IdempotencyGuard::new(
            store.clone(),
            IdempotencyGuardConfig {
                ttl_hours: 24,
                in_flight_wait: Duration::from_secs(2),
                in_flight_poll: Duration::from_millis(5),
            },
        ));
        let reaper = Arc::new(ExpiryReaper::new(
            store.clone(),
            payments.clone(),
            ExpiryReaperConfig::default(),
        ));
        Self {
            store,
            orders: Arc::new(InMemoryOrderRepository::new()),
            payments,
            gateway: Arc::new(gateway),
            guard,
            reaper,
        }
    }

    pub fn create_handler(&self) -> CreatePaymentIntentHandler {
        CreatePaymentIntentHandler::new(
            self.guard.clone(),
            self.orders.clone(),
            self.payments.clone(),
            self.gateway.clone(),
            CreatePaymentIntentConfig::default(),
        )
    }

    pub fn webhook_handler(&self) -> HandlePaymentWebhookHandler {
        HandlePaymentWebhookHandler::new(self.payments.clone(), self.orders.clone())
    }

    pub fn app_state(&self, verifier: Option<RsaSignatureVerifier>) -> PaymentAppState {
        PaymentAppState {
            idempotency_guard: self.guard.clone(),
            order_repository: self.orders.clone(),
            payment_repository: self.payments.clone(),
            payment_gateway: self.gateway.clone(),
            intent_config: CreatePaymentIntentConfig::default(),
            webhook_verifier: verifier.map(Arc::new),
            reaper: self.reaper.clone(),
        }
    }

    /// Seeds an order awaiting payment of 500.00 ETB.
    pub async fn seed_order(&self) -> OrderSnapshot {
        let order = OrderSnapshot {
            id: OrderId::new(),
            buyer_id: UserId::new(BUYER).unwrap(),
            total_amount: Amount::from_minor(50_000).unwrap(),
            currency: Currency::etb(),
            status: OrderStatus::AwaitingPayment,
            payment_status: PaymentStatus::Unpaid,
            delivery_status: DeliveryStatus::NotScheduled,
            buyer: BuyerContact {
                email: "buyer@example.com".to_string(),
                first_name: "Abebe".to_string(),
                last_name: "Kebede".to_string(),
            },
        };
        self.orders.insert(order.clone()).await;
        order
    }
}
