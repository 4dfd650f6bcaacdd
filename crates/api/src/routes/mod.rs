//! Route handlers.

pub mod audit;
pub mod callbacks;
pub mod flows;
pub mod health;
pub mod metrics;
pub mod transactions;

use orchestrator::{CallbackHandler, Orchestrator, Transport};
use transaction_store::TransactionStore;

/// Shared application state accessible from all handlers.
pub struct AppState<T: Transport> {
    pub store: TransactionStore,
    pub callbacks: CallbackHandler,
    pub orchestrator: Orchestrator<T>,
}
