//! Flow coordinator driving one negotiation from DISCOVER to CONFIRM.

use std::time::Instant;

use chrono::{DateTime, Utc};
use common::TransactionId;
use domain::{Action, FlexibilityRequest, Transaction, TransactionStatus};
use serde::Serialize;
use serde_json::Value;
use transaction_store::{StoreError, TransactionStore};

use crate::client::{DiscoverOutcome, OutboundClient};
use crate::config::OrchestratorConfig;
use crate::error::{ClientError, FlowError, Result};
use crate::selector::{offers_from_catalog, select_best};
use crate::transport::Transport;

/// A negotiation that ended with a confirmed order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowSuccess {
    pub transaction_id: TransactionId,
    /// External order id assigned by the counterparty.
    pub order_id: String,
    pub provider_id: String,
    pub flexibility_kw: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub latency_ms: f64,
}

/// Serializable outcome of a flow, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obp_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flexibility_kw: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<FlowSuccess> for FlowReport {
    fn from(success: FlowSuccess) -> Self {
        Self {
            success: true,
            transaction_id: Some(success.transaction_id),
            obp_id: Some(success.order_id),
            provider_id: Some(success.provider_id),
            flexibility_kw: Some(success.flexibility_kw),
            window_start: Some(success.window_start),
            window_end: Some(success.window_end),
            latency_ms: Some(success.latency_ms),
            error: None,
        }
    }
}

impl From<&FlowError> for FlowReport {
    fn from(err: &FlowError) -> Self {
        Self {
            success: false,
            transaction_id: err.transaction_id().cloned(),
            obp_id: None,
            provider_id: None,
            flexibility_kw: None,
            window_start: None,
            window_end: None,
            latency_ms: err.latency_ms(),
            error: Some(err.to_string()),
        }
    }
}

impl From<Result<FlowSuccess>> for FlowReport {
    fn from(result: Result<FlowSuccess>) -> Self {
        match result {
            Ok(success) => success.into(),
            Err(err) => FlowReport::from(&err),
        }
    }
}

/// Runs negotiations: DISCOVER, then SELECT, INIT and CONFIRM, each step
/// waiting for its callback before the next one is sent.
///
/// A failed or timed-out step ends the run; the transaction keeps whatever
/// state the callbacks left it in.
pub struct Orchestrator<T: Transport> {
    client: OutboundClient<T>,
    store: TransactionStore,
    config: OrchestratorConfig,
}

impl<T: Transport> Orchestrator<T> {
    /// Creates an orchestrator sharing the client's store.
    pub fn new(client: OutboundClient<T>, config: OrchestratorConfig) -> Self {
        let store = client.store().clone();
        Self {
            client,
            store,
            config,
        }
    }

    pub fn client(&self) -> &OutboundClient<T> {
        &self.client
    }

    /// Negotiates `request` end to end.
    #[tracing::instrument(
        skip_all,
        fields(feeder_id = %request.feeder_id, flexibility_kw = request.flexibility_kw)
    )]
    pub async fn run(&self, request: FlexibilityRequest) -> Result<FlowSuccess> {
        metrics::counter!("flow_runs_total").increment(1);
        let started = Instant::now();

        let result = self.negotiate(request).await;

        metrics::histogram!("flow_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(success) => {
                metrics::counter!("flow_completed_total").increment(1);
                tracing::info!(
                    transaction_id = %success.transaction_id,
                    order_id = %success.order_id,
                    provider_id = %success.provider_id,
                    "order confirmed"
                );
            }
            Err(err) => {
                metrics::counter!("flow_failed_total", "reason" => err.kind()).increment(1);
                tracing::warn!(error = %err, transaction_id = ?err.transaction_id(), "flow failed");
            }
        }
        result
    }

    async fn negotiate(&self, request: FlexibilityRequest) -> Result<FlowSuccess> {
        let flexibility_kw = request.flexibility_kw;

        let transaction_id = match self.client.send_discover(request).await? {
            DiscoverOutcome::Sent(transaction) => transaction.transaction_id().clone(),
            DiscoverOutcome::Failed {
                transaction,
                failure,
            } => {
                return Err(FlowError::TransportFailure {
                    transaction_id: transaction.transaction_id().clone(),
                    latency_ms: failure.latency_ms,
                    reason: failure.reason,
                });
            }
        };
        let id = &transaction_id;

        tracing::info!(transaction_id = %id, "waiting for provider catalog");
        self.await_callback(id, Action::Discover).await?;

        let catalog = self
            .fetch(id)
            .await?
            .response_payload()
            .cloned()
            .unwrap_or(Value::Null);
        let offers = offers_from_catalog(&catalog);
        let selected = select_best(&offers).ok_or_else(|| FlowError::NoOffer {
            transaction_id: id.clone(),
        })?;
        tracing::info!(
            provider_id = %selected.provider_id,
            item_id = %selected.item_id,
            price = selected.price,
            capacity = selected.capacity,
            score = selected.score,
            offers = offers.len(),
            "offer selected"
        );

        self.client
            .send_select(id, &selected.provider_id, &selected.item_id, flexibility_kw)
            .await
            .map_err(step_failed(Action::Select, id))?;
        self.await_callback(id, Action::Select).await?;

        self.client
            .send_init(id, &selected.provider_id, &selected.item_id)
            .await
            .map_err(step_failed(Action::Init, id))?;
        self.await_callback(id, Action::Init).await?;

        self.client
            .send_confirm(id, &selected.provider_id, &selected.item_id)
            .await
            .map_err(step_failed(Action::Confirm, id))?;
        self.await_callback(id, Action::Confirm).await?;

        let transaction = self.fetch(id).await?;
        let order_id = transaction
            .order_id()
            .ok_or_else(|| FlowError::MissingOrderId {
                transaction_id: id.clone(),
            })?
            .to_string();

        Ok(FlowSuccess {
            order_id,
            provider_id: selected.provider_id,
            flexibility_kw,
            window_start: transaction.request().window_start,
            window_end: transaction.request().window_end,
            latency_ms: transaction.latency_ms(Utc::now()),
            transaction_id,
        })
    }

    async fn await_callback(&self, id: &TransactionId, sent: Action) -> Result<()> {
        let step = sent.callback();
        let expected = step
            .target_status()
            .unwrap_or(TransactionStatus::Confirmed);
        self.store
            .wait_for_status(id, expected, self.config.callback_timeout)
            .await
            .map(|_| ())
            .map_err(|err| match err {
                StoreError::WaitTimedOut { last, timeout, .. } => FlowError::WaitTimeout {
                    step,
                    transaction_id: id.clone(),
                    last_status: last,
                    timeout,
                },
                other => FlowError::Store {
                    transaction_id: id.clone(),
                    source: other,
                },
            })
    }

    async fn fetch(&self, id: &TransactionId) -> Result<Transaction> {
        self.store.get(id).await.ok_or_else(|| FlowError::Store {
            transaction_id: id.clone(),
            source: StoreError::NotFound(id.clone()),
        })
    }
}

fn step_failed(step: Action, id: &TransactionId) -> impl FnOnce(ClientError) -> FlowError + '_ {
    move |source| FlowError::StepFailed {
        step,
        transaction_id: id.clone(),
        source,
    }
}
