//! In-memory payment repository.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, PaymentIntentId, StateMachine, Timestamp};
use crate::domain::payment::{
    PaymentIntent, PaymentIntentStatus, PaymentTransaction, ProviderRef, TransactionStatus,
};
use crate::ports::PaymentRepository;

#[derive(Default)]
struct Tables {
    intents: Vec<PaymentIntent>,
    transactions: Vec<PaymentTransaction>,
}

/// Payment repository keeping both tables under a single lock, so the
/// paired insert is atomic.
#[derive(Default)]
pub struct InMemoryPaymentRepository {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
}

impl InMemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository whose `create_intent_with_transaction` always fails.
    pub fn with_failing_writes() -> Self {
        let repo = Self::default();
        repo.fail_writes.store(true, Ordering::SeqCst);
        repo
    }

    pub fn set_failing_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    // === Test Helpers ===

    pub async fn intents(&self) -> Vec<PaymentIntent> {
        self.tables.read().await.intents.clone()
    }

    pub async fn transactions(&self) -> Vec<PaymentTransaction> {
        self.tables.read().await.transactions.clone()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn create_intent_with_transaction(
        &self,
        intent: &PaymentIntent,
        transaction: &PaymentTransaction,
    ) -> Result<(), DomainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "Simulated write failure",
            ));
        }

        let mut tables = self.tables.write().await;
        if tables
            .intents
            .iter()
            .any(|existing| existing.provider_ref == intent.provider_ref)
        {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Duplicate provider_ref {}", intent.provider_ref),
            ));
        }
        tables.intents.push(intent.clone());
        tables.transactions.push(transaction.clone());
        Ok(())
    }

    async fn find_intent_by_id(
        &self,
        id: &PaymentIntentId,
    ) -> Result<Option<PaymentIntent>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.intents.iter().find(|intent| &intent.id == id).cloned())
    }

    async fn find_intents_by_provider_ref(
        &self,
        provider_ref: &ProviderRef,
    ) -> Result<Vec<PaymentIntent>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables
            .intents
            .iter()
            .filter(|intent| &intent.provider_ref == provider_ref)
            .cloned()
            .collect())
    }

    async fn settle_intents(
        &self,
        provider_ref: &ProviderRef,
        status: PaymentIntentStatus,
        now: Timestamp,
    ) -> Result<Vec<PaymentIntent>, DomainError> {
        let mut tables = self.tables.write().await;
        let mut updated = Vec::new();
        for intent in tables
            .intents
            .iter_mut()
            .filter(|intent| &intent.provider_ref == provider_ref)
        {
            if intent.status.accepts(&status) {
                intent.status = status;
                intent.updated_at = now;
                updated.push(intent.clone());
            }
        }
        Ok(updated)
    }

    async fn settle_transactions(
        &self,
        provider_ref: &ProviderRef,
        status: TransactionStatus,
        now: Timestamp,
    ) -> Result<u64, DomainError> {
        let mut tables = self.tables.write().await;
        let mut count = 0;
        for tx in tables
            .transactions
            .iter_mut()
            .filter(|tx| &tx.provider_ref == provider_ref)
        {
            if tx.status.accepts(&status) {
                tx.status = status;
                tx.updated_at = now;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_failed_intents_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let mut tables = self.tables.write().await;
        let before = tables.intents.len();
        tables.intents.retain(|intent| {
            !(intent.status == PaymentIntentStatus::Failed && intent.created_at.is_before(&cutoff))
        });
        Ok((before - tables.intents.len()) as u64)
    }

    async fn delete_failed_transactions_before(
        &self,
        cutoff: Timestamp,
    ) -> Result<u64, DomainError> {
        let mut tables = self.tables.write().await;
        let before = tables.transactions.len();
        tables.transactions.retain(|tx| {
            !(tx.status == TransactionStatus::Failed && tx.created_at.is_before(&cutoff))
        });
        Ok((before - tables.transactions.len()) as u64)
    }
}
