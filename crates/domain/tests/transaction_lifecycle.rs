//! Integration tests for a transaction driven through a full negotiation.

use chrono::{Duration, Utc};
use common::{MessageId, TransactionId};
use domain::{
    Action, DomainError, Envelope, FlexibilityRequest, ProtocolConfig, Transaction,
    TransactionStatus,
};

fn request() -> FlexibilityRequest {
    let start = Utc::now();
    FlexibilityRequest {
        feeder_id: "F2".to_string(),
        flexibility_kw: 50.0,
        window_start: start,
        window_end: start + Duration::hours(2),
    }
}

fn new_transaction(config: &ProtocolConfig) -> Transaction {
    let id = TransactionId::new();
    let message_id = MessageId::new();
    let req = request();
    let discover = Envelope::discover(config, id.clone(), message_id, &req);
    Transaction::new(id, message_id, req, serde_json::to_value(&discover).unwrap())
}

#[test]
fn test_full_negotiation_lifecycle() {
    let config = ProtocolConfig::default();
    let mut txn = new_transaction(&config);
    let id = txn.transaction_id().clone();

    txn.advance(TransactionStatus::SearchReceived, "ON_DISCOVER -> Found 2 DER providers")
        .unwrap();

    let select = Envelope::select(&config, id.clone(), MessageId::new(), "der-1", "b-1", 50.0);
    txn.record_outbound(
        Action::Select,
        select.context.message_id,
        serde_json::to_value(&select).unwrap(),
    );
    txn.select_provider("der-1");
    txn.set_quoted_price(1500.0);
    txn.advance(TransactionStatus::SelectReceived, "ON_SELECT -> Quote received from der-1: 1500")
        .unwrap();
    txn.advance(TransactionStatus::InitReceived, "ON_INIT -> Order initialized")
        .unwrap();
    txn.confirm("OBP-2025-001", "ON_CONFIRM -> Order confirmed. OBP ID: OBP-2025-001")
        .unwrap();

    assert_eq!(txn.status(), TransactionStatus::Confirmed);
    assert!(txn.status().is_terminal());
    assert_eq!(txn.order_id(), Some("OBP-2025-001"));
    assert_eq!(txn.provider_id(), Some("der-1"));
    assert_eq!(txn.action(), Action::Select);
    assert_eq!(txn.history().len(), 4);
    assert!(
        txn.history()
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    );

    let late = txn.advance(TransactionStatus::InitReceived, "late ON_INIT");
    assert!(matches!(late, Err(DomainError::InvalidTransition { .. })));
    assert_eq!(txn.history().len(), 4);
}

#[test]
fn test_failed_discover_is_terminal() {
    let mut txn = new_transaction(&ProtocolConfig::default());

    txn.fail_external(12.5, "connection refused").unwrap();

    assert!(txn.status().is_terminal());
    assert!(
        txn.advance(TransactionStatus::SearchReceived, "late catalog")
            .is_err()
    );
    assert_eq!(txn.latency_ms(Utc::now()), 12.5);
}

#[test]
fn test_confirmed_transaction_serializes_wire_names() {
    let mut txn = new_transaction(&ProtocolConfig::default());
    for status in [
        TransactionStatus::SearchReceived,
        TransactionStatus::SelectReceived,
        TransactionStatus::InitReceived,
    ] {
        txn.advance(status, status.as_str()).unwrap();
    }
    txn.confirm("OBP-7", "confirmed").unwrap();

    let json = serde_json::to_value(&txn).unwrap();
    assert_eq!(json["status"], "CONFIRMED");
    assert_eq!(json["order_id"], "OBP-7");
    assert_eq!(json["request_payload"]["context"]["action"], "discover");
    assert_eq!(json["history"].as_array().unwrap().len(), 4);
}
