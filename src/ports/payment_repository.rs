//! PaymentRepository port - Persistence for payment intents and transactions.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PaymentIntentId, Timestamp};
use crate::domain::payment::{
    PaymentIntent, PaymentIntentStatus, PaymentTransaction, ProviderRef, TransactionStatus,
};

/// Port for payment intent and transaction storage.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Persists an intent and its capture transaction in one atomic unit.
    ///
    /// Either both rows exist afterwards or neither does.
    async fn create_intent_with_transaction(
        &self,
        intent: &PaymentIntent,
        transaction: &PaymentTransaction,
    ) -> Result<(), DomainError>;

    async fn find_intent_by_id(
        &self,
        id: &PaymentIntentId,
    ) -> Result<Option<PaymentIntent>, DomainError>;

    async fn find_intents_by_provider_ref(
        &self,
        provider_ref: &ProviderRef,
    ) -> Result<Vec<PaymentIntent>, DomainError>;

    /// Sets `status` on every intent with this reference that is still
    /// pending or already holds `status`. Returns the matched intents after
    /// the update.
    ///
    /// Terminal intents holding a different status are left untouched.
    async fn settle_intents(
        &self,
        provider_ref: &ProviderRef,
        status: PaymentIntentStatus,
        now: Timestamp,
    ) -> Result<Vec<PaymentIntent>, DomainError>;

    /// Mirrors a status onto the reference's transactions, with the same
    /// no-regression rule as `settle_intents`. Returns rows matched.
    async fn settle_transactions(
        &self,
        provider_ref: &ProviderRef,
        status: TransactionStatus,
        now: Timestamp,
    ) -> Result<u64, DomainError>;

    /// Deletes failed intents created before `cutoff`.
    async fn delete_failed_intents_before(&self, cutoff: Timestamp) -> Result<u64, DomainError>;

    /// Deletes failed transactions created before `cutoff`.
    async fn delete_failed_transactions_before(
        &self,
        cutoff: Timestamp,
    ) -> Result<u64, DomainError>;
}
