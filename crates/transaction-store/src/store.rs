use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::TransactionId;
use domain::{Transaction, TransactionStatus};
use tokio::sync::{RwLock, watch};

use crate::{Result, StoreError};

/// Prefix used when a transaction id is shown to operators as an order reference.
pub const ORDER_REF_PREFIX: &str = "OBP-";

struct Slot {
    transaction: Transaction,
    status: watch::Sender<TransactionStatus>,
}

/// In-memory registry of transactions, shared by the orchestrator, the
/// callback handlers and read-only audit queries.
///
/// Every access goes through one `RwLock`: a mutation runs entirely under the
/// write lock, so readers never observe a half-applied update. Each
/// transaction also owns a status channel that waiters subscribe to, so a
/// waiter never holds the lock while suspended.
#[derive(Clone, Default)]
pub struct TransactionStore {
    slots: Arc<RwLock<HashMap<TransactionId, Slot>>>,
}

impl TransactionStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new transaction.
    pub async fn put(&self, transaction: Transaction) -> Result<()> {
        let mut slots = self.slots.write().await;
        let id = transaction.transaction_id().clone();
        if slots.contains_key(&id) {
            return Err(StoreError::DuplicateTransaction(id));
        }
        let (status, _) = watch::channel(transaction.status());
        slots.insert(id, Slot { transaction, status });
        metrics::gauge!("transactions_stored").set(slots.len() as f64);
        Ok(())
    }

    /// Returns a copy of the transaction, or `None` if it is not (yet) known.
    pub async fn get(&self, id: &TransactionId) -> Option<Transaction> {
        let slots = self.slots.read().await;
        slots.get(id).map(|slot| slot.transaction.clone())
    }

    /// Applies `mutator` to the transaction under exclusive access.
    ///
    /// Returns `None` without calling `mutator` if the id is unknown. Waiters
    /// are notified when the mutation changed the status.
    pub async fn update<F, R>(&self, id: &TransactionId, mutator: F) -> Option<R>
    where
        F: FnOnce(&mut Transaction) -> R,
    {
        let mut slots = self.slots.write().await;
        let slot = slots.get_mut(id)?;
        let result = mutator(&mut slot.transaction);

        let status = slot.transaction.status();
        slot.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
        Some(result)
    }

    /// Returns every stored transaction, newest first.
    pub async fn snapshot(&self) -> Vec<Transaction> {
        let slots = self.slots.read().await;
        let mut all: Vec<_> = slots.values().map(|s| s.transaction.clone()).collect();
        all.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        all
    }

    /// Resolves an operator-facing reference to a transaction.
    ///
    /// The reference is first matched against external order ids, then
    /// (with any `OBP-` prefix stripped) against transaction ids.
    pub async fn find_by_order_ref(&self, reference: &str) -> Option<Transaction> {
        let slots = self.slots.read().await;
        if let Some(slot) = slots
            .values()
            .find(|s| s.transaction.order_id() == Some(reference))
        {
            return Some(slot.transaction.clone());
        }

        let bare = reference.strip_prefix(ORDER_REF_PREFIX).unwrap_or(reference);
        slots
            .get(&TransactionId::from(bare))
            .map(|slot| slot.transaction.clone())
    }

    /// Suspends until the transaction has reached `expected` or `timeout`
    /// elapses.
    ///
    /// Resolves immediately if the status was already reached. A timeout
    /// leaves the transaction untouched and reports the last status seen.
    #[tracing::instrument(skip(self))]
    pub async fn wait_for_status(
        &self,
        id: &TransactionId,
        expected: TransactionStatus,
        timeout: Duration,
    ) -> Result<TransactionStatus> {
        let mut rx = {
            let slots = self.slots.read().await;
            slots
                .get(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?
                .status
                .subscribe()
        };

        let reached = tokio::time::timeout(timeout, rx.wait_for(|s| s.has_reached(expected)))
            .await
            .map(|r| r.map(|status| *status));

        match reached {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(_)) => Err(StoreError::Closed(id.clone())),
            Err(_) => {
                let last = *rx.borrow();
                tracing::warn!(%last, ?timeout, "timed out waiting for status");
                Err(StoreError::WaitTimedOut {
                    transaction_id: id.clone(),
                    expected,
                    last,
                    timeout,
                })
            }
        }
    }

    /// Returns the number of stored transactions.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Returns true if no transaction has been stored.
    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}
