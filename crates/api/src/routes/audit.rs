//! Compliance audit trail lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::TransactionId;
use domain::TransactionStatus;
use orchestrator::Transport;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub message: String,
}

#[derive(Serialize)]
pub struct AuditResponse {
    pub obp_id: String,
    pub transaction_id: Option<TransactionId>,
    pub status: Option<TransactionStatus>,
    pub entries: Vec<AuditEntry>,
}

/// GET /audit/:reference — history of the transaction behind an order reference.
///
/// An unknown reference is not an error: the trail is simply empty.
#[tracing::instrument(skip(state))]
pub async fn get<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path(reference): Path<String>,
) -> Json<AuditResponse> {
    let Some(txn) = state.store.find_by_order_ref(&reference).await else {
        return Json(AuditResponse {
            obp_id: reference,
            transaction_id: None,
            status: None,
            entries: Vec::new(),
        });
    };

    Json(AuditResponse {
        obp_id: reference,
        transaction_id: Some(txn.transaction_id().clone()),
        status: Some(txn.status()),
        entries: txn
            .history()
            .iter()
            .map(|entry| AuditEntry {
                ts: entry.timestamp,
                message: entry.message.clone(),
            })
            .collect(),
    })
}
