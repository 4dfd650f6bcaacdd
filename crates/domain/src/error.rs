//! Domain error types.

use thiserror::Error;

use crate::transaction::TransactionStatus;

/// Errors raised when a change would break a transaction invariant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// The status change is not the next step of the state machine.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// The order id has already been committed.
    #[error("Order id already set to {existing}")]
    OrderIdAlreadySet { existing: String },
}
