//! Inbound callback processing.
//!
//! Every callback is acknowledged, whatever its content. Correlated
//! callbacks advance their transaction by exactly one step; anything that
//! would repeat or reorder a step is ignored.

use chrono::{DateTime, Utc};
use domain::protocol::payload;
use domain::{CallbackAction, Transaction, TransactionStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use transaction_store::TransactionStore;

/// Synchronous acknowledgment returned for every callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Ack {
    pub fn now() -> Self {
        Self {
            message: "ACK".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// What a callback did to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// The transaction moved to the given status.
    Applied(TransactionStatus),
    /// The transaction had already reached this step.
    Duplicate { status: TransactionStatus },
    /// The callback was correlated but could not be applied.
    Rejected(String),
    /// No transaction matches the callback.
    Uncorrelated,
    /// Accepted without touching the transaction.
    Acknowledged,
}

/// Applies inbound callbacks to the transactions they belong to.
#[derive(Clone)]
pub struct CallbackHandler {
    store: TransactionStore,
}

impl CallbackHandler {
    pub fn new(store: TransactionStore) -> Self {
        Self { store }
    }

    /// Processes a callback and acknowledges it.
    pub async fn handle(&self, action: CallbackAction, payload: Value) -> Ack {
        match self.apply(action, payload).await {
            CallbackOutcome::Applied(status) => {
                tracing::info!(%action, %status, "callback applied");
            }
            CallbackOutcome::Duplicate { status } => {
                tracing::debug!(%action, %status, "duplicate callback ignored");
            }
            CallbackOutcome::Rejected(reason) => {
                tracing::warn!(%action, %reason, "callback rejected");
            }
            CallbackOutcome::Uncorrelated => {}
            CallbackOutcome::Acknowledged => {
                tracing::info!(%action, "callback acknowledged");
            }
        }
        Ack::now()
    }

    /// Correlates `payload` and applies it under the store's write lock.
    #[tracing::instrument(skip_all, fields(%action, transaction_id, message_id))]
    pub async fn apply(&self, action: CallbackAction, payload: Value) -> CallbackOutcome {
        metrics::counter!("callbacks_received_total", "action" => action.as_str()).increment(1);

        let Some(transaction_id) = payload::transaction_id(&payload) else {
            metrics::counter!("callbacks_uncorrelated_total").increment(1);
            tracing::warn!("callback without transaction id");
            return CallbackOutcome::Uncorrelated;
        };
        let span = tracing::Span::current();
        span.record("transaction_id", tracing::field::display(&transaction_id));
        if let Some(message_id) = payload::message_id(&payload) {
            span.record("message_id", message_id);
        }

        let missing = payload::missing_context_fields(&payload);
        if !missing.is_empty() {
            tracing::debug!(?missing, "callback context is incomplete");
        }

        match self
            .store
            .update(&transaction_id, |t| apply_to(t, action, payload))
            .await
        {
            Some(outcome) => outcome,
            None => {
                metrics::counter!("callbacks_uncorrelated_total").increment(1);
                tracing::warn!("callback for unknown transaction");
                CallbackOutcome::Uncorrelated
            }
        }
    }

    pub async fn on_discover(&self, payload: Value) -> Ack {
        self.handle(CallbackAction::OnDiscover, payload).await
    }

    pub async fn on_select(&self, payload: Value) -> Ack {
        self.handle(CallbackAction::OnSelect, payload).await
    }

    pub async fn on_init(&self, payload: Value) -> Ack {
        self.handle(CallbackAction::OnInit, payload).await
    }

    pub async fn on_confirm(&self, payload: Value) -> Ack {
        self.handle(CallbackAction::OnConfirm, payload).await
    }

    pub async fn on_status(&self, payload: Value) -> Ack {
        self.handle(CallbackAction::OnStatus, payload).await
    }

    pub async fn on_update(&self, payload: Value) -> Ack {
        self.handle(CallbackAction::OnUpdate, payload).await
    }

    pub async fn on_cancel(&self, payload: Value) -> Ack {
        self.handle(CallbackAction::OnCancel, payload).await
    }
}

fn apply_to(txn: &mut Transaction, action: CallbackAction, payload: Value) -> CallbackOutcome {
    let Some(target) = action.target_status() else {
        return CallbackOutcome::Acknowledged;
    };

    let current = txn.status();
    if current.has_reached(target) {
        return CallbackOutcome::Duplicate { status: current };
    }
    if !current.can_transition_to(target) {
        return CallbackOutcome::Rejected(format!("{action} cannot move {current} to {target}"));
    }

    let applied = match action {
        CallbackAction::OnDiscover => {
            let found = payload::catalog_providers(&payload).len();
            txn.set_response_payload(payload);
            txn.advance(target, format!("ON_DISCOVER -> Found {found} DER providers"))
        }
        CallbackAction::OnSelect => {
            let price = payload::quoted_price(&payload);
            let provider = payload::provider_id(&payload)
                .or(txn.provider_id())
                .unwrap_or("unknown")
                .to_string();
            txn.set_quoted_price(price);
            txn.set_response_payload(payload);
            txn.advance(
                target,
                format!("ON_SELECT -> Quote received from {provider}: {price}"),
            )
        }
        CallbackAction::OnInit => {
            txn.set_response_payload(payload);
            txn.advance(target, "ON_INIT -> Order initialized")
        }
        CallbackAction::OnConfirm => {
            let Some(order_id) = payload::order_id(&payload) else {
                return CallbackOutcome::Rejected("on_confirm carries no order id".to_string());
            };
            let note = format!("ON_CONFIRM -> Order confirmed. OBP ID: {order_id}");
            txn.set_response_payload(payload);
            txn.confirm(order_id, note)
        }
        CallbackAction::OnStatus | CallbackAction::OnUpdate | CallbackAction::OnCancel => {
            return CallbackOutcome::Acknowledged;
        }
    };

    match applied {
        Ok(()) => CallbackOutcome::Applied(txn.status()),
        Err(err) => CallbackOutcome::Rejected(err.to_string()),
    }
}
