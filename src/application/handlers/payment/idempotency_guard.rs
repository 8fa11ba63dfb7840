//! IdempotencyGuard - check/reserve/finalize protocol around side effects.
//!
//! Callers follow one protocol:
//!
//! 1. `replay_if_present` - a live record for the key short-circuits with
//!    its cached outcome.
//! 2. Caller-specific preconditions that must not consume the key.
//! 3. `run_reserved` - atomically reserves the key as PENDING, runs the side
//!    effect, and finalizes the record as SUCCESS or FAILURE.
//!
//! A caller that loses the reservation race never runs the side effect; it
//! replays the winner's outcome instead, waiting a bounded time if the
//! winner is still in flight.
//!
//! Step 3 runs on its own task. Dropping the caller's future (timeout,
//! client disconnect) does not stop it, so a reserved key always reaches
//! SUCCESS or FAILURE.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::domain::foundation::Timestamp;
use crate::domain::idempotency::{
    IdempotencyKey, IdempotencyRecord, IdempotencyStatus, RequestFingerprint,
};
use crate::domain::payment::PaymentError;
use crate::ports::{IdempotencyStore, ReserveOutcome};

/// Configuration for the guard.
#[derive(Debug, Clone)]
pub struct IdempotencyGuardConfig {
    /// Lifetime of a record after creation.
    pub ttl_hours: i64,
    /// How long a request waits on another in-flight request with its key.
    pub in_flight_wait: Duration,
    /// Poll period while waiting.
    pub in_flight_poll: Duration,
}

impl Default for IdempotencyGuardConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            in_flight_wait: Duration::from_millis(5_000),
            in_flight_poll: Duration::from_millis(100),
        }
    }
}

/// Attempts at writing the terminal status before giving up.
const FINALIZE_ATTEMPTS: u32 = 3;

/// Wraps side-effecting operations with at-most-once semantics per key.
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn IdempotencyStore>,
    config: IdempotencyGuardConfig,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn IdempotencyStore>, config: IdempotencyGuardConfig) -> Self {
        Self { store, config }
    }

    /// Produces a fresh high-entropy key for callers that supplied none.
    pub fn generate_key() -> IdempotencyKey {
        IdempotencyKey::generate()
    }

    /// Looks up the live record for `(key, operation)`.
    ///
    /// Returns the record whatever its status. Fails with `Conflict` when the
    /// record was written for a different payload.
    pub async fn check_idempotency(
        &self,
        key: &IdempotencyKey,
        operation: &str,
        payload: &Value,
    ) -> Result<Option<IdempotencyRecord>, PaymentError> {
        let fingerprint = RequestFingerprint::of(payload);
        let record = self
            .store
            .find_active(key, operation, Timestamp::now())
            .await?;

        match record {
            Some(record) if !record.matches(&fingerprint) => {
                tracing::warn!(
                    idempotency_key = %key,
                    operation,
                    "Idempotency key reused with a different payload"
                );
                Err(PaymentError::conflict())
            }
            other => Ok(other),
        }
    }

    /// Writes a record for `(key, operation)` unless a live one exists.
    pub async fn store_idempotency(
        &self,
        key: &IdempotencyKey,
        operation: &str,
        payload: &Value,
        response_data: Option<Value>,
        status: IdempotencyStatus,
    ) -> Result<ReserveOutcome, PaymentError> {
        let record = IdempotencyRecord::new(
            key.clone(),
            operation,
            RequestFingerprint::of(payload),
            status,
            response_data,
            Timestamp::now(),
            self.config.ttl_hours,
        );
        Ok(self.store.insert_if_absent(record).await?)
    }

    /// Finalizes a record in place.
    pub async fn update_idempotency_status(
        &self,
        key: &IdempotencyKey,
        operation: &str,
        status: IdempotencyStatus,
        response_data: Option<Value>,
    ) -> Result<(), PaymentError> {
        let updated = self
            .store
            .update_status(key, operation, status, response_data)
            .await?;
        if !updated {
            tracing::warn!(
                idempotency_key = %key,
                operation,
                status = %status,
                "No idempotency record to finalize"
            );
        }
        Ok(())
    }

    /// Deletes every expired record, returning the count.
    pub async fn cleanup_expired(&self) -> Result<u64, PaymentError> {
        Ok(self.store.delete_expired(Timestamp::now()).await?)
    }

    /// Step 1 of the protocol: cached outcome for a key seen before.
    ///
    /// `Ok(None)` means the key is unused and the caller should proceed.
    pub async fn replay_if_present(
        &self,
        key: &IdempotencyKey,
        operation: &str,
        payload: &Value,
    ) -> Result<Option<Value>, PaymentError> {
        match self.check_idempotency(key, operation, payload).await? {
            Some(record) => {
                tracing::info!(
                    idempotency_key = %key,
                    operation,
                    status = %record.status,
                    "Replaying idempotent request"
                );
                self.replay(record).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// Step 3 of the protocol: reserve, run `side_effect`, finalize.
    ///
    /// The whole sequence runs on a spawned task that the caller awaits.
    pub async fn run_reserved<F, Fut>(
        &self,
        key: &IdempotencyKey,
        operation: &str,
        payload: &Value,
        side_effect: F,
    ) -> Result<Value, PaymentError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, PaymentError>> + Send + 'static,
    {
        let guard = self.clone();
        let key = key.clone();
        let operation = operation.to_string();
        let payload = payload.clone();

        let task = tokio::spawn(async move {
            guard
                .reserve_and_run(&key, &operation, &payload, side_effect)
                .await
        });

        task.await.map_err(|e| {
            tracing::error!(error = %e, "Reserved operation task did not complete");
            PaymentError::database(format!("Reserved operation aborted: {}", e))
        })?
    }

    async fn reserve_and_run<F, Fut>(
        &self,
        key: &IdempotencyKey,
        operation: &str,
        payload: &Value,
        side_effect: F,
    ) -> Result<Value, PaymentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, PaymentError>>,
    {
        let outcome = self
            .store_idempotency(key, operation, payload, None, IdempotencyStatus::Pending)
            .await?;

        if let ReserveOutcome::AlreadyExists(record) = outcome {
            if !record.matches(&RequestFingerprint::of(payload)) {
                return Err(PaymentError::conflict());
            }
            tracing::info!(
                idempotency_key = %key,
                operation,
                "Lost reservation race, replaying winner"
            );
            return self.replay(record).await;
        }

        match side_effect().await {
            Ok(response) => {
                self.finalize(key, operation, IdempotencyStatus::Success, response.clone())
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            idempotency_key = %key,
                            operation,
                            error = %e,
                            "Side effect succeeded but its idempotency record stayed PENDING"
                        );
                        PaymentError::database(format!(
                            "Outcome could not be recorded for idempotency key: {}",
                            e
                        ))
                    })?;
                Ok(response)
            }
            Err(err) => {
                if let Err(e) = self
                    .finalize(key, operation, IdempotencyStatus::Failure, err.to_cached_response())
                    .await
                {
                    tracing::error!(
                        idempotency_key = %key,
                        operation,
                        error = %e,
                        "Failed to finalize idempotency record as FAILURE"
                    );
                }
                Err(err)
            }
        }
    }

    /// Writes a terminal status, retrying transient store failures.
    async fn finalize(
        &self,
        key: &IdempotencyKey,
        operation: &str,
        status: IdempotencyStatus,
        response_data: Value,
    ) -> Result<(), PaymentError> {
        let mut attempt = 1;
        loop {
            match self
                .update_idempotency_status(key, operation, status, Some(response_data.clone()))
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if attempt < FINALIZE_ATTEMPTS => {
                    tracing::warn!(
                        idempotency_key = %key,
                        operation,
                        status = %status,
                        attempt,
                        error = %e,
                        "Retrying idempotency record finalization"
                    );
                    tokio::time::sleep(self.config.in_flight_poll * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Turns a record into the caller-visible outcome.
    async fn replay(&self, record: IdempotencyRecord) -> Result<Value, PaymentError> {
        match record.status {
            IdempotencyStatus::Success => Ok(record.response_data.unwrap_or(Value::Null)),
            IdempotencyStatus::Failure => Err(PaymentError::from_cached_response(
                record.response_data.as_ref(),
            )),
            IdempotencyStatus::Pending => self.await_completion(&record).await,
        }
    }

    /// Polls a PENDING record until it turns terminal or the wait budget runs out.
    async fn await_completion(&self, pending: &IdempotencyRecord) -> Result<Value, PaymentError> {
        let deadline = tokio::time::Instant::now() + self.config.in_flight_wait;

        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(PaymentError::RequestInProgress);
            }
            tokio::time::sleep(self.config.in_flight_poll).await;

            let current = self
                .store
                .find_active(&pending.key, &pending.operation, Timestamp::now())
                .await?;

            match current {
                Some(record) if record.status == IdempotencyStatus::Success => {
                    return Ok(record.response_data.unwrap_or(Value::Null));
                }
                Some(record) if record.status == IdempotencyStatus::Failure => {
                    return Err(PaymentError::from_cached_response(
                        record.response_data.as_ref(),
                    ));
                }
                Some(_) => continue,
                None => return Err(PaymentError::RequestInProgress),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryIdempotencyStore;
    use crate::domain::foundation::{DomainError, ErrorCode};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const OP: &str = "create_payment_intent";

    /// In-memory store whose `update_status` fails a set number of times.
    struct FlakyFinalizeStore {
        inner: InMemoryIdempotencyStore,
        failures_left: AtomicUsize,
    }

    impl FlakyFinalizeStore {
        fn failing(times: usize) -> Self {
            Self {
                inner: InMemoryIdempotencyStore::new(),
                failures_left: AtomicUsize::new(times),
            }
        }
    }

    #[async_trait]
    impl IdempotencyStore for FlakyFinalizeStore {
        async fn find_active(
            &self,
            key: &IdempotencyKey,
            operation: &str,
            now: Timestamp,
        ) -> Result<Option<IdempotencyRecord>, DomainError> {
            self.inner.find_active(key, operation, now).await
        }

        async fn insert_if_absent(
            &self,
            record: IdempotencyRecord,
        ) -> Result<ReserveOutcome, DomainError> {
            self.inner.insert_if_absent(record).await
        }

        async fn update_status(
            &self,
            key: &IdempotencyKey,
            operation: &str,
            status: IdempotencyStatus,
            response_data: Option<Value>,
        ) -> Result<bool, DomainError> {
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(DomainError::database("Simulated finalize failure"));
            }
            self.inner
                .update_status(key, operation, status, response_data)
                .await
        }

        async fn delete_expired(&self, now: Timestamp) -> Result<u64, DomainError> {
            self.inner.delete_expired(now).await
        }
    }

    fn guard_with(store: Arc<InMemoryIdempotencyStore>, wait_ms: u64) -> IdempotencyGuard {
        IdempotencyGuard::new(
            store,
            IdempotencyGuardConfig {
                ttl_hours: 24,
                in_flight_wait: Duration::from_millis(wait_ms),
                in_flight_poll: Duration::from_millis(5),
            },
        )
    }

    fn key(raw: &str) -> IdempotencyKey {
        IdempotencyKey::parse(raw).unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // check / store / update
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn check_returns_none_for_unused_key() {
        let guard = guard_with(Arc::new(InMemoryIdempotencyStore::new()), 50);
        let found = guard
            .check_idempotency(&key("K1"), OP, &json!({"orderId": "O1"}))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn check_returns_pending_record_as_is() {
        let guard = guard_with(Arc::new(InMemoryIdempotencyStore::new()), 50);
        let payload = json!({"orderId": "O1"});
        guard
            .store_idempotency(&key("K1"), OP, &payload, None, IdempotencyStatus::Pending)
            .await
            .unwrap();

        let found = guard
            .check_idempotency(&key("K1"), OP, &payload)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.status, IdempotencyStatus::Pending);
        assert!(found.response_data.is_none());
    }

    #[tokio::test]
    async fn check_ignores_key_order_and_volatile_fields() {
        let guard = guard_with(Arc::new(InMemoryIdempotencyStore::new()), 50);
        guard
            .store_idempotency(
                &key("K1"),
                OP,
                &json!({"orderId": "O1", "currency": "ETB", "timestamp": 1}),
                Some(json!({"ok": true})),
                IdempotencyStatus::Success,
            )
            .await
            .unwrap();

        let found = guard
            .check_idempotency(
                &key("K1"),
                OP,
                &json!({"currency": "ETB", "orderId": "O1", "nonce": "x"}),
            )
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn check_fails_with_conflict_on_different_payload() {
        let guard = guard_with(Arc::new(InMemoryIdempotencyStore::new()), 50);
        guard
            .store_idempotency(
                &key("K1"),
                OP,
                &json!({"orderId": "O1"}),
                None,
                IdempotencyStatus::Pending,
            )
            .await
            .unwrap();

        let result = guard
            .check_idempotency(&key("K1"), OP, &json!({"orderId": "O2"}))
            .await;
        assert!(matches!(result, Err(PaymentError::Conflict(_))));
    }

    #[tokio::test]
    async fn same_key_different_operation_is_independent() {
        let guard = guard_with(Arc::new(InMemoryIdempotencyStore::new()), 50);
        guard
            .store_idempotency(
                &key("K1"),
                OP,
                &json!({"orderId": "O1"}),
                None,
                IdempotencyStatus::Pending,
            )
            .await
            .unwrap();

        let found = guard
            .check_idempotency(&key("K1"), "refund", &json!({"orderId": "O2"}))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn update_finalizes_record() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let guard = guard_with(store.clone(), 50);
        let payload = json!({"orderId": "O1"});
        guard
            .store_idempotency(&key("K1"), OP, &payload, None, IdempotencyStatus::Pending)
            .await
            .unwrap();

        guard
            .update_idempotency_status(
                &key("K1"),
                OP,
                IdempotencyStatus::Success,
                Some(json!({"id": "I1"})),
            )
            .await
            .unwrap();

        let record = guard
            .check_idempotency(&key("K1"), OP, &payload)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, IdempotencyStatus::Success);
        assert_eq!(record.response_data, Some(json!({"id": "I1"})));
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_an_error() {
        let guard = guard_with(Arc::new(InMemoryIdempotencyStore::new()), 50);
        let result = guard
            .update_idempotency_status(&key("nope"), OP, IdempotencyStatus::Failure, None)
            .await;
        assert!(result.is_ok());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // run_reserved / replay
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn side_effect_runs_once_and_success_is_replayed() {
        let guard = guard_with(Arc::new(InMemoryIdempotencyStore::new()), 50);
        let payload = json!({"orderId": "O1"});
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let first = guard
            .run_reserved(&key("K1"), OP, &payload, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"id": "I1"}))
            })
            .await
            .unwrap();

        let replayed = guard
            .replay_if_present(&key("K1"), OP, &payload)
            .await
            .unwrap();

        assert_eq!(Some(first), replayed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_finalize_failure_is_retried() {
        let store = Arc::new(FlakyFinalizeStore::failing(FINALIZE_ATTEMPTS as usize - 1));
        let guard = IdempotencyGuard::new(store, IdempotencyGuardConfig::default());
        let payload = json!({"orderId": "O1"});

        let first = guard
            .run_reserved(&key("K1"), OP, &payload, || async { Ok(json!({"id": "I1"})) })
            .await
            .unwrap();

        let replayed = guard
            .replay_if_present(&key("K1"), OP, &payload)
            .await
            .unwrap();
        assert_eq!(replayed, Some(first));
    }

    #[tokio::test]
    async fn persistent_finalize_failure_is_surfaced() {
        let store = Arc::new(FlakyFinalizeStore::failing(usize::MAX));
        let guard = IdempotencyGuard::new(
            store,
            IdempotencyGuardConfig {
                ttl_hours: 24,
                in_flight_wait: Duration::from_millis(20),
                in_flight_poll: Duration::from_millis(1),
            },
        );
        let payload = json!({"orderId": "O1"});

        let result = guard
            .run_reserved(&key("K1"), OP, &payload, || async { Ok(json!({"id": "I1"})) })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DatabaseError);
    }

    #[tokio::test]
    async fn side_effect_completes_after_caller_is_dropped() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let guard = guard_with(store.clone(), 50);
        let payload = json!({"orderId": "O1"});

        let dropped = tokio::time::timeout(
            Duration::from_millis(10),
            guard.run_reserved(&key("K1"), OP, &payload, || async {
                tokio::time::sleep(Duration::from_millis(60)).await;
                Ok(json!({"id": "I1"}))
            }),
        )
        .await;
        assert!(dropped.is_err());

        tokio::time::sleep(Duration::from_millis(120)).await;

        let record = store
            .find_active(&key("K1"), OP, Timestamp::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, IdempotencyStatus::Success);
        assert_eq!(record.response_data, Some(json!({"id": "I1"})));
    }

    #[tokio::test]
    async fn failure_is_recorded_and_replayed_without_rerunning() {
        let guard = guard_with(Arc::new(InMemoryIdempotencyStore::new()), 50);
        let payload = json!({"orderId": "O1"});

        let err = guard
            .run_reserved(&key("K1"), OP, &payload, || async {
                Err(PaymentError::provider("Gateway down"))
            })
            .await
            .unwrap_err();
        assert_eq!(err, PaymentError::provider("Gateway down"));

        let replayed = guard
            .replay_if_present(&key("K1"), OP, &payload)
            .await
            .unwrap_err();
        assert_eq!(replayed.code(), ErrorCode::ProviderError);
        assert!(matches!(replayed, PaymentError::PreviouslyFailed { .. }));
    }

    #[tokio::test]
    async fn pending_record_times_out_as_in_progress() {
        let guard = guard_with(Arc::new(InMemoryIdempotencyStore::new()), 20);
        let payload = json!({"orderId": "O1"});
        guard
            .store_idempotency(&key("K1"), OP, &payload, None, IdempotencyStatus::Pending)
            .await
            .unwrap();

        let result = guard.replay_if_present(&key("K1"), OP, &payload).await;
        assert_eq!(result, Err(PaymentError::RequestInProgress));
    }

    #[tokio::test]
    async fn pending_record_resolves_when_winner_finishes() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let guard = Arc::new(guard_with(store.clone(), 2_000));
        let payload = json!({"orderId": "O1"});
        guard
            .store_idempotency(&key("K1"), OP, &payload, None, IdempotencyStatus::Pending)
            .await
            .unwrap();

        let finisher = {
            let guard = guard.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                guard
                    .update_idempotency_status(
                        &key("K1"),
                        OP,
                        IdempotencyStatus::Success,
                        Some(json!({"id": "I1"})),
                    )
                    .await
                    .unwrap();
            })
        };

        let replayed = guard.replay_if_present(&key("K1"), OP, &payload).await.unwrap();
        finisher.await.unwrap();
        assert_eq!(replayed, Some(json!({"id": "I1"})));
    }

    #[tokio::test]
    async fn reservation_loser_with_different_payload_gets_conflict() {
        let guard = guard_with(Arc::new(InMemoryIdempotencyStore::new()), 50);
        guard
            .store_idempotency(
                &key("K1"),
                OP,
                &json!({"orderId": "O1"}),
                None,
                IdempotencyStatus::Pending,
            )
            .await
            .unwrap();

        let result = guard
            .run_reserved(&key("K1"), OP, &json!({"orderId": "O2"}), || async {
                Err::<Value, _>(PaymentError::provider("side effect must not run"))
            })
            .await;
        assert!(matches!(result, Err(PaymentError::Conflict(_))));
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired_records() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let guard = guard_with(store.clone(), 50);
        let now = Timestamp::now();
        store
            .insert_if_absent(IdempotencyRecord::reservation(
                key("old"),
                OP,
                RequestFingerprint::of(&json!({})),
                now.minus_days(2),
                24,
            ))
            .await
            .unwrap();
        guard
            .store_idempotency(&key("fresh"), OP, &json!({}), None, IdempotencyStatus::Pending)
            .await
            .unwrap();

        assert_eq!(guard.cleanup_expired().await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn generated_keys_are_unique() {
        assert_ne!(IdempotencyGuard::generate_key(), IdempotencyGuard::generate_key());
    }
}
