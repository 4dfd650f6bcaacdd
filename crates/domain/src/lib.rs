//! Domain layer of the flexibility negotiation service.
//!
//! This crate provides:
//! - the `Transaction` record and its status state machine
//! - the protocol envelope (context block and per-step messages)
//! - lenient extraction helpers for inbound callback payloads

pub mod error;
pub mod protocol;
pub mod transaction;

pub use error::DomainError;
pub use protocol::{Action, CallbackAction, Context, Envelope, ProtocolConfig};
pub use transaction::{
    FlexibilityRequest, HistoryEntry, Transaction, TransactionMetrics, TransactionStatus,
};
