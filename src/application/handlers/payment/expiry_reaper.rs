//! Expiry reaper - periodic purge of expired and stale payment records.
//!
//! ## Sweeps
//!
//! | Sweep | Deletes |
//! |-------|---------|
//! | idempotency | records with `expires_at < now` |
//! | failed intents | intents in `failed` created before the retention window |
//! | failed transactions | transactions in `failed` created before the retention window |
//!
//! Sweeps are independent: one failing is logged and the others still run.
//! Paid and pending rows are never touched, whatever their age.
//!
//! ## Graceful Shutdown
//!
//! The loop listens on a watch channel and exits when it flips to `true`.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time;

use crate::domain::foundation::Timestamp;
use crate::ports::{IdempotencyStore, PaymentRepository};

/// Configuration for the reaper.
#[derive(Debug, Clone)]
pub struct ExpiryReaperConfig {
    pub interval: Duration,
    pub failed_intent_retention_days: i64,
    pub failed_transaction_retention_days: i64,
}

impl Default for ExpiryReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3_600),
            failed_intent_retention_days: 7,
            failed_transaction_retention_days: 30,
        }
    }
}

impl ExpiryReaperConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Counts from one reaper run. `None` marks a sweep that failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReaperReport {
    pub idempotency_records: Option<u64>,
    pub failed_intents: Option<u64>,
    pub failed_transactions: Option<u64>,
}

impl ReaperReport {
    pub fn is_complete(&self) -> bool {
        self.idempotency_records.is_some()
            && self.failed_intents.is_some()
            && self.failed_transactions.is_some()
    }
}

/// Background sweeper over the idempotency and payment stores.
pub struct ExpiryReaper {
    idempotency: Arc<dyn IdempotencyStore>,
    payments: Arc<dyn PaymentRepository>,
    config: ExpiryReaperConfig,
}

impl ExpiryReaper {
    pub fn new(
        idempotency: Arc<dyn IdempotencyStore>,
        payments: Arc<dyn PaymentRepository>,
        config: ExpiryReaperConfig,
    ) -> Self {
        Self {
            idempotency,
            payments,
            config,
        }
    }

    /// Runs every sweep once. Also the manual trigger.
    pub async fn run_once(&self) -> ReaperReport {
        self.run_at(Timestamp::now()).await
    }

    /// Runs every sweep against a fixed clock.
    pub async fn run_at(&self, now: Timestamp) -> ReaperReport {
        let idempotency_records = match self.idempotency.delete_expired(now).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(error = %e, "Idempotency record sweep failed");
                None
            }
        };

        let intent_cutoff = now.minus_days(self.config.failed_intent_retention_days);
        let failed_intents = match self.payments.delete_failed_intents_before(intent_cutoff).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(error = %e, "Failed intent sweep failed");
                None
            }
        };

        let transaction_cutoff = now.minus_days(self.config.failed_transaction_retention_days);
        let failed_transactions = match self
            .payments
            .delete_failed_transactions_before(transaction_cutoff)
            .await
        {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(error = %e, "Failed transaction sweep failed");
                None
            }
        };

        let report = ReaperReport {
            idempotency_records,
            failed_intents,
            failed_transactions,
        };
        tracing::info!(
            idempotency_records = ?report.idempotency_records,
            failed_intents = ?report.failed_intents,
            failed_transactions = ?report.failed_transactions,
            "Expiry reaper run finished"
        );
        report
    }

    /// Runs on the configured interval until shutdown is signalled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            "Expiry reaper started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Expiry reaper stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    self.run_once().await;
                }
            }
        }
    }
}
