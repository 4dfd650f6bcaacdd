//! Lenient field extraction from inbound payloads.
//!
//! Callbacks come from a remote party and may be incomplete or loosely
//! typed. Nothing in here fails: missing fields are `None`, and numeric
//! fields accept JSON numbers as well as numeric strings.

use common::TransactionId;
use serde_json::Value;

/// Context fields every well-formed envelope carries.
pub const REQUIRED_CONTEXT_FIELDS: [&str; 10] = [
    "domain",
    "country",
    "city",
    "action",
    "core_version",
    "bap_id",
    "bap_uri",
    "transaction_id",
    "message_id",
    "timestamp",
];

/// Returns the correlation id from `context.transaction_id`.
pub fn transaction_id(payload: &Value) -> Option<TransactionId> {
    non_empty_str(payload.pointer("/context/transaction_id")?).map(TransactionId::from)
}

/// Returns `context.message_id` verbatim.
pub fn message_id(payload: &Value) -> Option<&str> {
    payload.pointer("/context/message_id")?.as_str()
}

/// Returns the externally assigned order id from `message.order.id`.
pub fn order_id(payload: &Value) -> Option<String> {
    match payload.pointer("/message/order/id")? {
        Value::Number(n) => Some(n.to_string()),
        other => non_empty_str(other).map(str::to_string),
    }
}

/// Returns the provider a callback came from, if it names one.
pub fn provider_id(payload: &Value) -> Option<&str> {
    payload
        .pointer("/message/order/provider/id")
        .or_else(|| payload.pointer("/context/bpp_id"))
        .and_then(Value::as_str)
}

/// Returns the quoted price from `message.order.quote.price.value`,
/// coerced to zero when missing or malformed.
pub fn quoted_price(payload: &Value) -> f64 {
    payload
        .pointer("/message/order/quote/price/value")
        .and_then(coerce_f64)
        .unwrap_or(0.0)
}

/// Returns the providers listed in `message.catalog.providers`.
pub fn catalog_providers(payload: &Value) -> &[Value] {
    payload
        .pointer("/message/catalog/providers")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Returns the names of required context fields the payload lacks.
pub fn missing_context_fields(payload: &Value) -> Vec<&'static str> {
    let context = payload.get("context");
    REQUIRED_CONTEXT_FIELDS
        .iter()
        .copied()
        .filter(|field| context.and_then(|c| c.get(field)).is_none())
        .collect()
}

/// Reads a JSON number or numeric string as `f64`.
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}
