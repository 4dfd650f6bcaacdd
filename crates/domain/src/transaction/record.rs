//! The transaction record: one correlated negotiation.

use chrono::{DateTime, Utc};
use common::{MessageId, TransactionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FlexibilityRequest, TransactionStatus};
use crate::error::DomainError;
use crate::protocol::Action;

/// A timestamped, human-readable audit line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Delivery metrics captured when a send fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetrics {
    /// Time spent on the failed attempt, in milliseconds.
    pub latency_ms: Option<f64>,
    /// Last delivery error.
    pub error: Option<String>,
}

/// One end-to-end negotiation, from DISCOVER to CONFIRM.
///
/// Status, order id and history are only reachable through methods that
/// enforce the state machine: status never moves backward, the order id is
/// written once, and history is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    transaction_id: TransactionId,
    message_id: MessageId,
    order_id: Option<String>,
    action: Action,
    status: TransactionStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    request_payload: Option<Value>,
    response_payload: Option<Value>,
    request: FlexibilityRequest,
    provider_id: Option<String>,
    quoted_price: Option<f64>,
    history: Vec<HistoryEntry>,
    metrics: TransactionMetrics,
}

impl Transaction {
    /// Creates a pending transaction for a DISCOVER about to be sent.
    pub fn new(
        transaction_id: TransactionId,
        message_id: MessageId,
        request: FlexibilityRequest,
        request_payload: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            transaction_id,
            message_id,
            order_id: None,
            action: Action::Discover,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
            request_payload: Some(request_payload),
            response_payload: None,
            request,
            provider_id: None,
            quoted_price: None,
            history: Vec::new(),
            metrics: TransactionMetrics::default(),
        }
    }

    /// Records an outbound step: new message id, action and request snapshot.
    pub fn record_outbound(&mut self, action: Action, message_id: MessageId, payload: Value) {
        self.action = action;
        self.message_id = message_id;
        self.request_payload = Some(payload);
        self.touch();
    }

    /// Records the counterparty chosen for SELECT.
    pub fn select_provider(&mut self, provider_id: impl Into<String>) {
        self.provider_id = Some(provider_id.into());
        self.touch();
    }

    /// Moves to `to`, appending `note` to the history.
    ///
    /// Fails without touching anything if the move is not the next step of
    /// the state machine.
    pub fn advance(
        &mut self,
        to: TransactionStatus,
        note: impl Into<String>,
    ) -> Result<(), DomainError> {
        if !self.status.can_transition_to(to) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.push_history(note.into());
        Ok(())
    }

    /// Moves to `CONFIRMED` and commits the external order id.
    ///
    /// The order id is write-once: an already-confirmed transaction keeps
    /// its original id.
    pub fn confirm(
        &mut self,
        order_id: impl Into<String>,
        note: impl Into<String>,
    ) -> Result<(), DomainError> {
        if let Some(existing) = &self.order_id {
            return Err(DomainError::OrderIdAlreadySet {
                existing: existing.clone(),
            });
        }
        self.advance(TransactionStatus::Confirmed, note)?;
        self.order_id = Some(order_id.into());
        Ok(())
    }

    /// Marks a DISCOVER that could not be delivered.
    pub fn fail_external(
        &mut self,
        latency_ms: f64,
        error: impl Into<String>,
    ) -> Result<(), DomainError> {
        let error = error.into();
        self.advance(
            TransactionStatus::FailureExternal,
            format!("DISCOVER -> delivery failed after {latency_ms:.2}ms: {error}"),
        )?;
        self.metrics.latency_ms = Some(latency_ms);
        self.metrics.error = Some(error);
        Ok(())
    }

    /// Stores the latest inbound payload.
    pub fn set_response_payload(&mut self, payload: Value) {
        self.response_payload = Some(payload);
        self.touch();
    }

    /// Stores the price quoted in ON_SELECT.
    pub fn set_quoted_price(&mut self, price: f64) {
        self.quoted_price = Some(price);
        self.touch();
    }

    fn push_history(&mut self, message: String) {
        let now = Utc::now();
        self.history.push(HistoryEntry {
            timestamp: now,
            message,
        });
        self.updated_at = now;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// Query methods
impl Transaction {
    pub fn transaction_id(&self) -> &TransactionId {
        &self.transaction_id
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// Returns the external order id, set once ON_CONFIRM arrives.
    pub fn order_id(&self) -> Option<&str> {
        self.order_id.as_deref()
    }

    /// Returns the last outbound action.
    pub fn action(&self) -> Action {
        self.action
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn request_payload(&self) -> Option<&Value> {
        self.request_payload.as_ref()
    }

    pub fn response_payload(&self) -> Option<&Value> {
        self.response_payload.as_ref()
    }

    /// Returns the business parameters the negotiation was opened with.
    pub fn request(&self) -> &FlexibilityRequest {
        &self.request
    }

    pub fn provider_id(&self) -> Option<&str> {
        self.provider_id.as_deref()
    }

    pub fn quoted_price(&self) -> Option<f64> {
        self.quoted_price
    }

    /// Returns the audit trail in insertion order.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn metrics(&self) -> &TransactionMetrics {
        &self.metrics
    }

    /// Total latency: the measured send latency when one was recorded,
    /// otherwise the time elapsed since creation.
    pub fn latency_ms(&self, now: DateTime<Utc>) -> f64 {
        match self.metrics.latency_ms {
            Some(ms) if ms > 0.0 => ms,
            _ => (now - self.created_at).num_microseconds().unwrap_or(0) as f64 / 1000.0,
        }
    }
}
