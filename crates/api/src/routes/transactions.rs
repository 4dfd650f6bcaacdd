//! Transaction inspection and status queries.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::{MessageId, TransactionId};
use domain::{Action, HistoryEntry, Transaction, TransactionStatus};
use orchestrator::Transport;
use serde::Serialize;

use super::AppState;
use crate::error::ApiError;

// -- Response types --

#[derive(Serialize)]
pub struct TransactionResponse {
    pub transaction_id: TransactionId,
    pub obp_id: Option<String>,
    pub status: TransactionStatus,
    pub action: Action,
    pub feeder_id: String,
    pub flexibility_kw: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub provider_id: Option<String>,
    pub quoted_price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub latency_ms: Option<f64>,
    pub error: Option<String>,
    pub history: Vec<HistoryEntry>,
}

impl From<Transaction> for TransactionResponse {
    fn from(txn: Transaction) -> Self {
        let request = txn.request();
        Self {
            transaction_id: txn.transaction_id().clone(),
            obp_id: txn.order_id().map(String::from),
            status: txn.status(),
            action: txn.action(),
            feeder_id: request.feeder_id.clone(),
            flexibility_kw: request.flexibility_kw,
            window_start: request.window_start,
            window_end: request.window_end,
            provider_id: txn.provider_id().map(String::from),
            quoted_price: txn.quoted_price(),
            created_at: txn.created_at(),
            updated_at: txn.updated_at(),
            latency_ms: txn.metrics().latency_ms,
            error: txn.metrics().error.clone(),
            history: txn.history().to_vec(),
        }
    }
}

#[derive(Serialize)]
pub struct StatusQueryResponse {
    pub transaction_id: TransactionId,
    pub obp_id: String,
    pub message_id: MessageId,
}

// -- Handlers --

/// GET /transactions — every known transaction, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
) -> Json<Vec<TransactionResponse>> {
    let all = state.store.snapshot().await;
    Json(all.into_iter().map(TransactionResponse::from).collect())
}

/// GET /transactions/:id — one transaction by id.
#[tracing::instrument(skip(state))]
pub async fn get<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path(id): Path<String>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let txn = state
        .store
        .get(&TransactionId::from(id.as_str()))
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Transaction {id} not found")))?;
    Ok(Json(txn.into()))
}

/// POST /transactions/:id/status — ask the counterparty for the execution
/// status of a confirmed order.
#[tracing::instrument(skip(state))]
pub async fn query_status<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path(id): Path<String>,
) -> Result<Json<StatusQueryResponse>, ApiError> {
    let transaction_id = TransactionId::from(id.as_str());
    let txn = state
        .store
        .get(&transaction_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Transaction {id} not found")))?;
    let order_id = txn
        .order_id()
        .ok_or_else(|| {
            ApiError::Conflict(format!(
                "Transaction {id} is {} and has no order to query",
                txn.status()
            ))
        })?
        .to_string();

    let message_id = state
        .orchestrator
        .client()
        .send_status(&transaction_id, &order_id)
        .await?;

    Ok(Json(StatusQueryResponse {
        transaction_id,
        obp_id: order_id,
        message_id,
    }))
}
