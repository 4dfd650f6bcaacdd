//! Integration tests for the negotiation flow, with a scripted counterparty.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domain::{Action, CallbackAction, FlexibilityRequest, ProtocolConfig, TransactionStatus};
use orchestrator::{
    CallbackHandler, ClientConfig, FlowError, FlowReport, InMemoryTransport, Orchestrator,
    OrchestratorConfig, OutboundClient, OutboundRequest,
};
use serde_json::{Value, json};
use transaction_store::TransactionStore;

type Script = dyn Fn(&OutboundRequest) -> Vec<(CallbackAction, Value)> + Send + Sync;

struct TestHarness {
    orchestrator: Arc<Orchestrator<InMemoryTransport>>,
    transport: InMemoryTransport,
    store: TransactionStore,
    handler: CallbackHandler,
}

impl TestHarness {
    fn new(callback_timeout: Duration) -> Self {
        let store = TransactionStore::new();
        let transport = InMemoryTransport::new();
        let client = OutboundClient::new(
            transport.clone(),
            store.clone(),
            ProtocolConfig::default(),
            ClientConfig::default(),
        );
        let orchestrator = Orchestrator::new(client, OrchestratorConfig { callback_timeout });

        Self {
            orchestrator: Arc::new(orchestrator),
            transport,
            handler: CallbackHandler::new(store.clone()),
            store,
        }
    }

    /// Plays the counterparty: every delivered request is answered with the
    /// callbacks the script returns for it.
    fn spawn_counterparty(&self, script: Arc<Script>) {
        let mut requests = self.transport.subscribe();
        let handler = self.handler.clone();
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                for (action, payload) in script(&request) {
                    handler.handle(action, payload).await;
                }
            }
        });
    }
}

fn request() -> FlexibilityRequest {
    let start = Utc::now();
    FlexibilityRequest {
        feeder_id: "F1".to_string(),
        flexibility_kw: 50.0,
        window_start: start,
        window_end: start + chrono::Duration::hours(2),
    }
}

fn envelope(request: &OutboundRequest, message: Value) -> Value {
    json!({
        "context": {
            "transaction_id": request.envelope.context.transaction_id,
            "message_id": request.envelope.context.message_id,
            "action": format!("on_{}", request.envelope.context.action),
            "bpp_id": "der-cheap",
        },
        "message": message,
    })
}

fn catalog() -> Value {
    json!({ "catalog": { "providers": [
        { "id": "der-expensive", "items": [{
            "id": "battery-1",
            "price": { "value": "1000" },
            "quantity": { "available": { "count": 50 } }
        }]},
        { "id": "der-cheap", "items": [{
            "id": "battery-2",
            "price": { "value": "500" },
            "quantity": { "available": { "count": 50 } }
        }]}
    ]}})
}

/// Answers every step; the order id is produced per transaction.
fn cooperative(
    order_id: impl Fn(&OutboundRequest) -> String + Send + Sync + 'static,
) -> Arc<Script> {
    Arc::new(move |request: &OutboundRequest| match request.envelope.action() {
        Action::Discover => vec![(CallbackAction::OnDiscover, envelope(request, catalog()))],
        Action::Select => vec![(
            CallbackAction::OnSelect,
            envelope(
                request,
                json!({ "order": {
                    "provider": { "id": "der-cheap" },
                    "quote": { "price": { "value": "500" } }
                }}),
            ),
        )],
        Action::Init => vec![(
            CallbackAction::OnInit,
            envelope(request, json!({ "order": { "provider": { "id": "der-cheap" } } })),
        )],
        Action::Confirm => vec![(
            CallbackAction::OnConfirm,
            envelope(request, json!({ "order": { "id": order_id(request) } })),
        )],
        Action::Status => vec![],
    })
}

fn fixed_order_id(id: &'static str) -> Arc<Script> {
    cooperative(move |_| id.to_string())
}

#[tokio::test]
async fn test_end_to_end_negotiation_confirms_order() {
    let h = TestHarness::new(Duration::from_secs(5));
    h.spawn_counterparty(fixed_order_id("OBP-2025-001"));

    let success = h.orchestrator.run(request()).await.unwrap();

    assert_eq!(success.order_id, "OBP-2025-001");
    assert_eq!(success.provider_id, "der-cheap");
    assert_eq!(success.flexibility_kw, 50.0);
    assert!(success.latency_ms >= 0.0);

    let txn = h.store.get(&success.transaction_id).await.unwrap();
    assert_eq!(txn.status(), TransactionStatus::Confirmed);
    assert_eq!(txn.order_id(), Some("OBP-2025-001"));
    assert_eq!(txn.quoted_price(), Some(500.0));
    assert_eq!(txn.history().len(), 4);
    assert_eq!(txn.history()[0].message, "ON_DISCOVER -> Found 2 DER providers");
    assert_eq!(
        txn.history()[3].message,
        "ON_CONFIRM -> Order confirmed. OBP ID: OBP-2025-001"
    );

    assert_eq!(
        h.transport.actions(),
        vec![Action::Discover, Action::Select, Action::Init, Action::Confirm]
    );
    let requests = h.transport.requests();
    assert!(
        requests
            .iter()
            .all(|r| r.envelope.context.transaction_id == success.transaction_id)
    );
    assert_eq!(
        requests[1].envelope.message["order"]["items"][0]["id"],
        "battery-2"
    );
}

#[tokio::test]
async fn test_confirmed_order_is_found_by_reference() {
    let h = TestHarness::new(Duration::from_secs(5));
    h.spawn_counterparty(fixed_order_id("OBP-2025-001"));
    let success = h.orchestrator.run(request()).await.unwrap();

    let by_order = h.store.find_by_order_ref("OBP-2025-001").await.unwrap();
    let by_prefixed = h
        .store
        .find_by_order_ref(&format!("OBP-{}", success.transaction_id))
        .await
        .unwrap();
    assert_eq!(by_order.transaction_id(), &success.transaction_id);
    assert_eq!(by_prefixed.transaction_id(), &success.transaction_id);
}

#[tokio::test]
async fn test_silent_counterparty_times_out_and_leaves_pending() {
    let h = TestHarness::new(Duration::from_millis(100));
    h.spawn_counterparty(Arc::new(|_: &OutboundRequest| Vec::<(CallbackAction, Value)>::new()));

    let err = h.orchestrator.run(request()).await.unwrap_err();

    let FlowError::WaitTimeout {
        step,
        transaction_id,
        last_status,
        ..
    } = &err
    else {
        panic!("expected timeout, got {err}");
    };
    assert_eq!(*step, CallbackAction::OnDiscover);
    assert_eq!(*last_status, TransactionStatus::Pending);

    let txn = h.store.get(transaction_id).await.unwrap();
    assert_eq!(txn.status(), TransactionStatus::Pending);
    assert!(txn.history().is_empty());
    assert_eq!(h.transport.actions(), vec![Action::Discover]);

    let report = FlowReport::from(&err);
    assert!(!report.success);
    assert_eq!(report.transaction_id.as_ref(), Some(transaction_id));
}

#[tokio::test]
async fn test_unreachable_counterparty_fails_external() {
    let h = TestHarness::new(Duration::from_secs(5));
    h.transport.set_fail_on(Action::Discover, true);

    let err = h.orchestrator.run(request()).await.unwrap_err();

    let FlowError::TransportFailure {
        transaction_id,
        latency_ms,
        ..
    } = &err
    else {
        panic!("expected transport failure, got {err}");
    };
    let txn = h.store.get(transaction_id).await.unwrap();
    assert_eq!(txn.status(), TransactionStatus::FailureExternal);
    assert_eq!(txn.metrics().latency_ms, Some(*latency_ms));
    assert_eq!(FlowReport::from(&err).latency_ms, Some(*latency_ms));
}

#[tokio::test]
async fn test_empty_catalog_stops_before_select() {
    let h = TestHarness::new(Duration::from_secs(5));
    h.spawn_counterparty(Arc::new(|request: &OutboundRequest| {
        vec![(
            CallbackAction::OnDiscover,
            envelope(request, json!({ "catalog": { "providers": [] } })),
        )]
    }));

    let err = h.orchestrator.run(request()).await.unwrap_err();

    let FlowError::NoOffer { transaction_id } = &err else {
        panic!("expected no offer, got {err}");
    };
    let txn = h.store.get(transaction_id).await.unwrap();
    assert_eq!(txn.status(), TransactionStatus::SearchReceived);
    assert_eq!(h.transport.request_count(), 1);
}

#[tokio::test]
async fn test_init_delivery_failure_stops_the_flow() {
    let h = TestHarness::new(Duration::from_secs(5));
    h.transport.set_fail_on(Action::Init, true);
    h.spawn_counterparty(fixed_order_id("OBP-unused"));

    let err = h.orchestrator.run(request()).await.unwrap_err();

    let FlowError::StepFailed {
        step,
        transaction_id,
        ..
    } = &err
    else {
        panic!("expected step failure, got {err}");
    };
    assert_eq!(*step, Action::Init);
    let txn = h.store.get(transaction_id).await.unwrap();
    assert_eq!(txn.status(), TransactionStatus::SelectReceived);
    assert!(txn.order_id().is_none());
}

#[tokio::test]
async fn test_repeated_confirm_callback_is_applied_once() {
    let h = TestHarness::new(Duration::from_secs(5));
    let answer = fixed_order_id("OBP-2025-001");
    h.spawn_counterparty(Arc::new(move |request: &OutboundRequest| {
        let mut callbacks = answer(request);
        if request.envelope.action() == Action::Confirm {
            callbacks.extend(answer(request));
        }
        callbacks
    }));

    let success = h.orchestrator.run(request()).await.unwrap();

    let txn = h.store.get(&success.transaction_id).await.unwrap();
    assert_eq!(txn.order_id(), Some("OBP-2025-001"));
    assert_eq!(txn.history().len(), 4);
}

#[tokio::test]
async fn test_late_callback_after_timeout_is_still_recorded() {
    let h = TestHarness::new(Duration::from_millis(100));
    let answer = fixed_order_id("OBP-late");
    h.spawn_counterparty(Arc::new(move |request: &OutboundRequest| {
        if request.envelope.action() == Action::Init {
            return vec![];
        }
        answer(request)
    }));

    let err = h.orchestrator.run(request()).await.unwrap_err();
    let transaction_id = err.transaction_id().unwrap().clone();
    assert!(matches!(
        err,
        FlowError::WaitTimeout {
            step: CallbackAction::OnInit,
            last_status: TransactionStatus::SelectReceived,
            ..
        }
    ));

    let late = json!({ "context": { "transaction_id": transaction_id }, "message": {} });
    h.handler.on_init(late).await;

    let txn = h.store.get(&transaction_id).await.unwrap();
    assert_eq!(txn.status(), TransactionStatus::InitReceived);
    assert_eq!(txn.history().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_flows_stay_isolated() {
    let h = TestHarness::new(Duration::from_secs(5));
    h.spawn_counterparty(cooperative(|request| {
        format!("OBP-{}", request.envelope.context.transaction_id)
    }));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orchestrator = Arc::clone(&h.orchestrator);
        handles.push(tokio::spawn(async move { orchestrator.run(request()).await }));
    }

    for handle in handles {
        let success = handle.await.unwrap().unwrap();
        assert_eq!(success.order_id, format!("OBP-{}", success.transaction_id));
        let txn = h.store.get(&success.transaction_id).await.unwrap();
        assert_eq!(txn.history().len(), 4);
    }
    assert_eq!(h.store.len().await, 8);
    assert_eq!(h.transport.request_count(), 32);
}

#[tokio::test]
async fn test_status_query_reuses_transaction_id() {
    let h = TestHarness::new(Duration::from_secs(5));
    h.spawn_counterparty(fixed_order_id("OBP-2025-001"));
    let success = h.orchestrator.run(request()).await.unwrap();

    h.orchestrator
        .client()
        .send_status(&success.transaction_id, &success.order_id)
        .await
        .unwrap();

    let last = h.transport.requests().pop().unwrap();
    assert_eq!(last.envelope.action(), Action::Status);
    assert_eq!(last.envelope.context.transaction_id, success.transaction_id);
    assert_eq!(last.envelope.message["order_id"], "OBP-2025-001");
    assert!(last.url.ends_with("/api/status"));

    let txn = h.store.get(&success.transaction_id).await.unwrap();
    assert_eq!(txn.action(), Action::Confirm);
    assert_ne!(txn.message_id(), last.envelope.context.message_id);
    assert_eq!(txn.request_payload().unwrap()["context"]["action"], "confirm");
    assert_eq!(txn.status(), TransactionStatus::Confirmed);
}
