//! Delivery of envelopes to the counterparty.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use domain::{Action, Envelope};
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::error::TransportError;

/// An envelope as it was handed to the transport.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub envelope: Envelope,
}

/// Sends one envelope and waits for the synchronous acknowledgment only.
///
/// The business answer arrives later as a callback; a successful return
/// only means the counterparty accepted the request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, url: &str, envelope: &Envelope) -> Result<(), TransportError>;
}

/// HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Builds a client with the configured connect and overall timeouts.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            client,
            connect_timeout: config.connect_timeout,
            request_timeout: config.request_timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_connect() {
            if err.is_timeout() {
                TransportError::Timeout(self.connect_timeout)
            } else {
                TransportError::Connect(error_chain(&err))
            }
        } else if err.is_timeout() {
            TransportError::Timeout(self.request_timeout)
        } else if let Some(status) = err.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Request(error_chain(&err))
        }
    }
}

/// Renders `err` followed by each distinct cause in its source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &str, envelope: &Envelope) -> Result<(), TransportError> {
        let response = self
            .client
            .post(url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        response.error_for_status().map_err(|e| self.classify(e))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryTransportState {
    requests: Vec<OutboundRequest>,
    failing: HashSet<Action>,
    listener: Option<mpsc::UnboundedSender<OutboundRequest>>,
}

/// In-memory transport for testing.
///
/// Records every delivered request and can forward it to a listener, which
/// lets a test play the counterparty.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<Mutex<InMemoryTransportState>>,
}

impl InMemoryTransport {
    /// Creates a new in-memory transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the transport to refuse (or accept again) a step.
    pub fn set_fail_on(&self, action: Action, fail: bool) {
        let mut state = self.lock();
        if fail {
            state.failing.insert(action);
        } else {
            state.failing.remove(&action);
        }
    }

    /// Returns a receiver that gets every request delivered from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<OutboundRequest> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().listener = Some(tx);
        rx
    }

    /// Returns all delivered requests in order.
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.lock().requests.clone()
    }

    /// Returns the actions of all delivered requests in order.
    pub fn actions(&self) -> Vec<Action> {
        self.lock()
            .requests
            .iter()
            .map(|r| r.envelope.action())
            .collect()
    }

    /// Returns the number of delivered requests.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryTransportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, url: &str, envelope: &Envelope) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.failing.contains(&envelope.action()) {
            return Err(TransportError::Connect(format!(
                "connection refused by {url}"
            )));
        }

        let request = OutboundRequest {
            url: url.to_string(),
            envelope: envelope.clone(),
        };
        let closed = state
            .listener
            .as_ref()
            .is_some_and(|listener| listener.send(request.clone()).is_err());
        if closed {
            state.listener = None;
        }
        state.requests.push(request);
        Ok(())
    }
}
