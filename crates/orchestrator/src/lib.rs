//! Flexibility negotiation engine.
//!
//! This crate provides:
//! - `OutboundClient`: builds and sends each protocol step through a `Transport`
//! - `CallbackHandler`: correlates inbound callbacks and advances transactions
//! - `select_best`: ranks the offers found by discovery
//! - `Orchestrator`: drives DISCOVER, SELECT, INIT and CONFIRM in order

pub mod callbacks;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod selector;
pub mod transport;

pub use callbacks::{Ack, CallbackHandler, CallbackOutcome};
pub use client::{DiscoverOutcome, OutboundClient, SendFailure};
pub use config::{ClientConfig, OrchestratorConfig};
pub use coordinator::{FlowReport, FlowSuccess, Orchestrator};
pub use error::{ClientError, FlowError, Result, TransportError};
pub use selector::{Offer, OfferItem, SelectedOffer, offers_from_catalog, select_best};
pub use transport::{HttpTransport, InMemoryTransport, OutboundRequest, Transport};
