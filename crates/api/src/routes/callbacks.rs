//! Inbound protocol callbacks.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use domain::CallbackAction;
use orchestrator::{Ack, Transport};
use serde_json::Value;

use super::AppState;
use crate::error::ApiError;

/// POST /beckn/callbacks/:action — apply a callback and acknowledge it.
///
/// The body is parsed leniently: anything that is not JSON is treated as an
/// empty payload, which the handler acknowledges without a state change.
#[tracing::instrument(skip(state, body), fields(bytes = body.len()))]
pub async fn receive<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path(action): Path<String>,
    body: Bytes,
) -> Result<Json<Ack>, ApiError> {
    let action = CallbackAction::from_name(&action)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown callback {action}")))?;

    let payload = serde_json::from_slice::<Value>(&body).unwrap_or_else(|err| {
        tracing::warn!(%action, error = %err, "callback body is not JSON");
        Value::Null
    });

    Ok(Json(state.callbacks.handle(action, payload).await))
}
