//! Wire format of the negotiation protocol.

pub mod action;
pub mod context;
pub mod message;
pub mod payload;

pub use action::{Action, CallbackAction};
pub use context::{Context, DEFAULT_TTL, ProtocolConfig};
pub use message::Envelope;
