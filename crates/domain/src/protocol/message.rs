//! Outbound envelopes, one builder per protocol step.

use chrono::{DateTime, SecondsFormat, Utc};
use common::{MessageId, TransactionId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Action, Context, ProtocolConfig};
use crate::transaction::FlexibilityRequest;

/// Descriptor code announcing a demand-response event.
pub const DR_EVENT_CODE: &str = "DR_EVENT";

/// Flexibility requested from providers is always a load reduction.
pub const FLEXIBILITY_DIRECTION: &str = "reduction";

/// A `{"context": ..., "message": ...}` protocol envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub context: Context,
    pub message: Value,
}

impl Envelope {
    /// DISCOVER: broadcast the flexibility intent for a feeder and window.
    pub fn discover(
        config: &ProtocolConfig,
        transaction_id: TransactionId,
        message_id: MessageId,
        request: &FlexibilityRequest,
    ) -> Self {
        let message = json!({
            "intent": {
                "item": {
                    "descriptor": { "code": DR_EVENT_CODE },
                    "tags": {
                        "flexibility_kw": request.flexibility_kw,
                        "feeder_id": request.feeder_id,
                        "flexibility_direction": FLEXIBILITY_DIRECTION,
                    }
                },
                "fulfillment": {
                    "start": { "time": { "timestamp": iso(request.window_start) } },
                    "end": { "time": { "timestamp": iso(request.window_end) } },
                }
            }
        });
        Self::build(config, Action::Discover, transaction_id, message_id, message)
    }

    /// SELECT: ask a provider to quote one of its items for the requested quantity.
    pub fn select(
        config: &ProtocolConfig,
        transaction_id: TransactionId,
        message_id: MessageId,
        provider_id: &str,
        item_id: &str,
        flexibility_kw: f64,
    ) -> Self {
        let message = json!({
            "order": {
                "provider": { "id": provider_id },
                "items": [{
                    "id": item_id,
                    "quantity": { "selected": { "count": flexibility_kw } },
                    "tags": { "flexibility_kw": flexibility_kw },
                }]
            }
        });
        Self::build(config, Action::Select, transaction_id, message_id, message)
    }

    /// INIT: initialise the order with the quoted provider.
    pub fn init(
        config: &ProtocolConfig,
        transaction_id: TransactionId,
        message_id: MessageId,
        provider_id: &str,
        item_id: &str,
    ) -> Self {
        Self::build(
            config,
            Action::Init,
            transaction_id,
            message_id,
            order_body(provider_id, item_id),
        )
    }

    /// CONFIRM: commit the order.
    pub fn confirm(
        config: &ProtocolConfig,
        transaction_id: TransactionId,
        message_id: MessageId,
        provider_id: &str,
        item_id: &str,
    ) -> Self {
        Self::build(
            config,
            Action::Confirm,
            transaction_id,
            message_id,
            order_body(provider_id, item_id),
        )
    }

    /// STATUS: query a confirmed order. Must reuse the DISCOVER transaction id.
    pub fn status(
        config: &ProtocolConfig,
        transaction_id: TransactionId,
        message_id: MessageId,
        order_id: &str,
    ) -> Self {
        let message = json!({ "order_id": order_id });
        Self::build(config, Action::Status, transaction_id, message_id, message)
    }

    fn build(
        config: &ProtocolConfig,
        action: Action,
        transaction_id: TransactionId,
        message_id: MessageId,
        message: Value,
    ) -> Self {
        Self {
            context: Context::new(config, action, transaction_id, message_id),
            message,
        }
    }

    /// Returns the step this envelope carries.
    pub fn action(&self) -> Action {
        self.context.action
    }
}

fn order_body(provider_id: &str, item_id: &str) -> Value {
    json!({
        "order": {
            "provider": { "id": provider_id },
            "items": [{ "id": item_id }]
        }
    })
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
