//! Outbound protocol client.

use std::time::Instant;

use common::{MessageId, TransactionId};
use domain::{Action, Envelope, FlexibilityRequest, ProtocolConfig, Transaction};
use transaction_store::TransactionStore;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::Transport;

/// A DISCOVER send that could not be delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct SendFailure {
    /// Time spent on the failed attempt, in milliseconds.
    pub latency_ms: f64,
    pub reason: String,
}

/// Result of starting a negotiation.
#[derive(Debug, Clone)]
pub enum DiscoverOutcome {
    /// The counterparty accepted the request; a callback is expected.
    Sent(Transaction),
    /// Delivery failed; the transaction is already `FAILURE_EXTERNAL`.
    Failed {
        transaction: Transaction,
        failure: SendFailure,
    },
}

impl DiscoverOutcome {
    /// Returns the transaction in its state right after the send.
    pub fn transaction(&self) -> &Transaction {
        match self {
            DiscoverOutcome::Sent(transaction) => transaction,
            DiscoverOutcome::Failed { transaction, .. } => transaction,
        }
    }
}

/// Builds envelopes for each step, keeps the transaction's outbound
/// bookkeeping current and hands the envelope to a [`Transport`].
pub struct OutboundClient<T: Transport> {
    transport: T,
    store: TransactionStore,
    protocol: ProtocolConfig,
    config: ClientConfig,
}

impl<T: Transport> OutboundClient<T> {
    pub fn new(
        transport: T,
        store: TransactionStore,
        protocol: ProtocolConfig,
        config: ClientConfig,
    ) -> Self {
        Self {
            transport,
            store,
            protocol,
            config,
        }
    }

    /// Returns a reference to the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the store transactions are recorded in.
    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    /// Opens a new transaction and broadcasts the flexibility intent.
    ///
    /// The transaction is stored before the send so that a callback racing
    /// the acknowledgment always finds it. A delivery failure is not an
    /// error here: it is recorded on the transaction and returned as
    /// [`DiscoverOutcome::Failed`].
    #[tracing::instrument(skip_all, fields(feeder_id = %request.feeder_id, transaction_id))]
    pub async fn send_discover(
        &self,
        request: FlexibilityRequest,
    ) -> Result<DiscoverOutcome, ClientError> {
        let transaction_id = TransactionId::new();
        tracing::Span::current().record(
            "transaction_id",
            tracing::field::display(&transaction_id),
        );

        let message_id = MessageId::new();
        let envelope = Envelope::discover(
            &self.protocol,
            transaction_id.clone(),
            message_id,
            &request,
        );
        let payload = serde_json::to_value(&envelope)?;
        self.store
            .put(Transaction::new(
                transaction_id.clone(),
                message_id,
                request,
                payload,
            ))
            .await?;

        let started = Instant::now();
        let sent = self.deliver(Action::Discover, &envelope).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let Err(source) = sent else {
            tracing::info!(latency_ms, "DISCOVER accepted");
            return Ok(DiscoverOutcome::Sent(self.fetch(&transaction_id).await?));
        };

        let reason = source.to_string();
        let marked = self
            .store
            .update(&transaction_id, |t| t.fail_external(latency_ms, reason.clone()))
            .await
            .ok_or_else(|| ClientError::UnknownTransaction(transaction_id.clone()))?;
        let transaction = self.fetch(&transaction_id).await?;

        match marked {
            Ok(()) => Ok(DiscoverOutcome::Failed {
                transaction,
                failure: SendFailure { latency_ms, reason },
            }),
            Err(err) => {
                // A callback already moved the transaction on.
                tracing::warn!(error = %err, "send failed after the counterparty answered");
                Ok(DiscoverOutcome::Sent(transaction))
            }
        }
    }

    /// Asks `provider_id` to quote `item_id` for `flexibility_kw`.
    #[tracing::instrument(skip_all, fields(transaction_id = %transaction_id, provider_id = %provider_id))]
    pub async fn send_select(
        &self,
        transaction_id: &TransactionId,
        provider_id: &str,
        item_id: &str,
        flexibility_kw: f64,
    ) -> Result<MessageId, ClientError> {
        let message_id = MessageId::new();
        let envelope = Envelope::select(
            &self.protocol,
            transaction_id.clone(),
            message_id,
            provider_id,
            item_id,
            flexibility_kw,
        );
        self.send_step(transaction_id, envelope, Some(provider_id))
            .await?;
        Ok(message_id)
    }

    #[tracing::instrument(skip_all, fields(transaction_id = %transaction_id))]
    pub async fn send_init(
        &self,
        transaction_id: &TransactionId,
        provider_id: &str,
        item_id: &str,
    ) -> Result<MessageId, ClientError> {
        let message_id = MessageId::new();
        let envelope = Envelope::init(
            &self.protocol,
            transaction_id.clone(),
            message_id,
            provider_id,
            item_id,
        );
        self.send_step(transaction_id, envelope, None).await?;
        Ok(message_id)
    }

    #[tracing::instrument(skip_all, fields(transaction_id = %transaction_id))]
    pub async fn send_confirm(
        &self,
        transaction_id: &TransactionId,
        provider_id: &str,
        item_id: &str,
    ) -> Result<MessageId, ClientError> {
        let message_id = MessageId::new();
        let envelope = Envelope::confirm(
            &self.protocol,
            transaction_id.clone(),
            message_id,
            provider_id,
            item_id,
        );
        self.send_step(transaction_id, envelope, None).await?;
        Ok(message_id)
    }

    /// Queries the execution status of a confirmed order.
    ///
    /// Reuses the DISCOVER transaction id, so the transaction must exist.
    /// The stored outbound snapshot keeps describing the CONFIRM request.
    #[tracing::instrument(skip_all, fields(transaction_id = %transaction_id))]
    pub async fn send_status(
        &self,
        transaction_id: &TransactionId,
        order_id: &str,
    ) -> Result<MessageId, ClientError> {
        let message_id = MessageId::new();
        let envelope = Envelope::status(
            &self.protocol,
            transaction_id.clone(),
            message_id,
            order_id,
        );
        self.send_step(transaction_id, envelope, None).await?;
        Ok(message_id)
    }

    async fn send_step(
        &self,
        transaction_id: &TransactionId,
        envelope: Envelope,
        provider_id: Option<&str>,
    ) -> Result<(), ClientError> {
        let action = envelope.action();
        let message_id = envelope.context.message_id;
        let payload = serde_json::to_value(&envelope)?;

        // STATUS is a query and leaves the confirmed order's snapshot intact.
        self.store
            .update(transaction_id, |t| {
                if action != Action::Status {
                    t.record_outbound(action, message_id, payload);
                }
                if let Some(provider_id) = provider_id {
                    t.select_provider(provider_id);
                }
            })
            .await
            .ok_or_else(|| ClientError::UnknownTransaction(transaction_id.clone()))?;

        self.deliver(action, &envelope)
            .await
            .map_err(|source| ClientError::Transport { action, source })?;
        tracing::info!(%action, "step accepted");
        Ok(())
    }

    async fn deliver(
        &self,
        action: Action,
        envelope: &Envelope,
    ) -> Result<(), crate::error::TransportError> {
        let url = self.config.endpoint(action);
        metrics::counter!("outbound_requests_total", "action" => action.as_str()).increment(1);

        let result = self.transport.send(&url, envelope).await;
        if let Err(err) = &result {
            metrics::counter!("outbound_failures_total", "action" => action.as_str())
                .increment(1);
            tracing::warn!(%action, %url, error = %err, "outbound delivery failed");
        }
        result
    }

    async fn fetch(&self, transaction_id: &TransactionId) -> Result<Transaction, ClientError> {
        self.store
            .get(transaction_id)
            .await
            .ok_or_else(|| ClientError::UnknownTransaction(transaction_id.clone()))
    }
}
