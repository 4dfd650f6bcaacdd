use std::time::Duration;

use common::TransactionId;
use domain::TransactionStatus;
use thiserror::Error;

/// Errors that can occur when interacting with the transaction store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A transaction with this id already exists. Ids are never reused.
    #[error("Transaction already exists: {0}")]
    DuplicateTransaction(TransactionId),

    /// No transaction with this id is stored.
    #[error("Transaction not found: {0}")]
    NotFound(TransactionId),

    /// The expected status was not reached before the deadline.
    #[error(
        "Timed out after {timeout:?} waiting for transaction {transaction_id} to reach {expected} (last status {last})"
    )]
    WaitTimedOut {
        transaction_id: TransactionId,
        expected: TransactionStatus,
        last: TransactionStatus,
        timeout: Duration,
    },

    /// The store was dropped while a waiter was suspended.
    #[error("Status channel closed for transaction {0}")]
    Closed(TransactionId),
}

/// Result type for transaction store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
