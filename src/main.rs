//! Order Payments server binary.

use std::sync::Arc;

use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;

use order_payments::adapters::http::{app_router, PaymentAppState};
use order_payments::adapters::{
    init_logging, HttpPaymentGateway, LogFormat, PostgresIdempotencyStore,
    PostgresOrderRepository, PostgresPaymentRepository,
};
use order_payments::application::handlers::{ExpiryReaper, IdempotencyGuard};
use order_payments::config::AppConfig;
use order_payments::ports::{IdempotencyStore, OrderRepository, PaymentRepository};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    let log_format = if config.is_production() {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_logging(log_format, &config.server.log_level);

    let pool = config.database.connect().await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    let idempotency_store: Arc<dyn IdempotencyStore> =
        Arc::new(PostgresIdempotencyStore::new(pool.clone()));
    let payment_repository: Arc<dyn PaymentRepository> =
        Arc::new(PostgresPaymentRepository::new(pool.clone()));
    let order_repository: Arc<dyn OrderRepository> =
        Arc::new(PostgresOrderRepository::new(pool.clone()));
    let gateway = Arc::new(HttpPaymentGateway::new(config.payment.gateway_config())?);

    let webhook_verifier = config.payment.webhook_verifier()?.map(Arc::new);
    if webhook_verifier.is_none() {
        tracing::warn!("No webhook public key configured; signed webhook route is disabled");
    }

    let reaper = Arc::new(ExpiryReaper::new(
        idempotency_store.clone(),
        payment_repository.clone(),
        config.reaper.to_reaper_config(),
    ));

    let state = PaymentAppState {
        idempotency_guard: Arc::new(IdempotencyGuard::new(
            idempotency_store,
            config.payment.guard_config(),
        )),
        order_repository,
        payment_repository,
        payment_gateway: gateway,
        intent_config: config.payment.intent_config()?,
        webhook_verifier,
        reaper: reaper.clone(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper_task = config.reaper.enabled.then(|| {
        let reaper = reaper.clone();
        tokio::spawn(async move { reaper.run(shutdown_rx).await })
    });

    let app = app_router(state).layer(TimeoutLayer::new(config.server.request_timeout()));
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Order payments server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = reaper_task {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Expiry reaper task ended abnormally");
        }
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
