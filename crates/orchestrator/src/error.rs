//! Orchestrator error types.

use std::time::Duration;

use common::TransactionId;
use domain::{Action, CallbackAction, TransactionStatus};
use thiserror::Error;
use transaction_store::StoreError;

/// Failure to hand an envelope to the counterparty.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// No connection or no response within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The counterparty answered with a non-2xx status.
    #[error("counterparty responded with HTTP {0}")]
    Status(u16),

    /// Any other transport-level failure.
    #[error("request failed: {0}")]
    Request(String),
}

/// Errors raised by the outbound client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The envelope could not be delivered.
    #[error("{action} delivery failed: {source}")]
    Transport {
        action: Action,
        #[source]
        source: TransportError,
    },

    /// The step refers to a transaction that does not exist.
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(TransactionId),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a negotiation flow stopped before confirmation.
#[derive(Debug, Error)]
pub enum FlowError {
    /// DISCOVER could not be delivered; the transaction is `FAILURE_EXTERNAL`.
    #[error("Sandbox unreachable after {latency_ms:.2}ms: {reason}")]
    TransportFailure {
        transaction_id: TransactionId,
        latency_ms: f64,
        reason: String,
    },

    /// The expected callback did not arrive in time.
    #[error("{step} timeout after {timeout:?} (transaction left in {last_status})")]
    WaitTimeout {
        step: CallbackAction,
        transaction_id: TransactionId,
        last_status: TransactionStatus,
        timeout: Duration,
    },

    /// The catalog held no usable offer.
    #[error("No suitable providers found")]
    NoOffer { transaction_id: TransactionId },

    /// A step after DISCOVER could not be sent.
    #[error("{step} failed: {source}")]
    StepFailed {
        step: Action,
        transaction_id: TransactionId,
        #[source]
        source: ClientError,
    },

    /// CONFIRMED was reached without an order id.
    #[error("Transaction {transaction_id} confirmed without an order id")]
    MissingOrderId { transaction_id: TransactionId },

    /// The transaction vanished from the store or its channel closed.
    #[error("Store error: {source}")]
    Store {
        transaction_id: TransactionId,
        #[source]
        source: StoreError,
    },

    /// DISCOVER could not be prepared; no transaction exists.
    #[error("Could not start negotiation: {0}")]
    Setup(#[from] ClientError),
}

impl FlowError {
    /// Returns the transaction the failure belongs to, when one was created.
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        match self {
            FlowError::TransportFailure { transaction_id, .. }
            | FlowError::WaitTimeout { transaction_id, .. }
            | FlowError::NoOffer { transaction_id }
            | FlowError::StepFailed { transaction_id, .. }
            | FlowError::MissingOrderId { transaction_id }
            | FlowError::Store { transaction_id, .. } => Some(transaction_id),
            FlowError::Setup(_) => None,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FlowError::TransportFailure { .. } => "transport_failure",
            FlowError::WaitTimeout { .. } => "wait_timeout",
            FlowError::NoOffer { .. } => "no_offer",
            FlowError::StepFailed { .. } => "step_failed",
            FlowError::MissingOrderId { .. } => "missing_order_id",
            FlowError::Store { .. } => "store",
            FlowError::Setup(_) => "setup",
        }
    }

    /// Returns the measured send latency for a failed DISCOVER.
    pub fn latency_ms(&self) -> Option<f64> {
        match self {
            FlowError::TransportFailure { latency_ms, .. } => Some(*latency_ms),
            _ => None,
        }
    }
}

/// Convenience type alias for flow results.
pub type Result<T> = std::result::Result<T, FlowError>;
