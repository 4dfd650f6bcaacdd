//! Transaction status state machine.

use serde::{Deserialize, Serialize};

/// The status of a negotiation in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► SearchReceived ──► SelectReceived ──► InitReceived ──► Confirmed
///    │
///    └──► FailureExternal
/// ```
///
/// A wait that expires is not a status: the transaction keeps the last
/// status it reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// DISCOVER issued, waiting for the catalog.
    #[default]
    Pending,

    /// ON_DISCOVER arrived with the counterparty catalog.
    SearchReceived,

    /// ON_SELECT arrived with a quote.
    SelectReceived,

    /// ON_INIT arrived.
    InitReceived,

    /// ON_CONFIRM arrived with the order identifier (terminal state).
    Confirmed,

    /// DISCOVER could not be delivered (terminal state).
    FailureExternal,
}

impl TransactionStatus {
    /// Position along the happy path; `None` for the failure branch.
    fn rank(&self) -> Option<u8> {
        match self {
            TransactionStatus::Pending => Some(0),
            TransactionStatus::SearchReceived => Some(1),
            TransactionStatus::SelectReceived => Some(2),
            TransactionStatus::InitReceived => Some(3),
            TransactionStatus::Confirmed => Some(4),
            TransactionStatus::FailureExternal => None,
        }
    }

    /// Returns the status that directly follows this one on the happy path.
    pub fn next(&self) -> Option<TransactionStatus> {
        match self {
            TransactionStatus::Pending => Some(TransactionStatus::SearchReceived),
            TransactionStatus::SearchReceived => Some(TransactionStatus::SelectReceived),
            TransactionStatus::SelectReceived => Some(TransactionStatus::InitReceived),
            TransactionStatus::InitReceived => Some(TransactionStatus::Confirmed),
            TransactionStatus::Confirmed | TransactionStatus::FailureExternal => None,
        }
    }

    /// Returns true if moving from this status to `to` is a legal transition.
    pub fn can_transition_to(&self, to: TransactionStatus) -> bool {
        if to == TransactionStatus::FailureExternal {
            return matches!(self, TransactionStatus::Pending);
        }
        self.next() == Some(to)
    }

    /// Returns true if this status is `expected` or lies beyond it on the
    /// happy path.
    pub fn has_reached(&self, expected: TransactionStatus) -> bool {
        match (self.rank(), expected.rank()) {
            (Some(current), Some(target)) => current >= target,
            _ => *self == expected,
        }
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Confirmed | TransactionStatus::FailureExternal
        )
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::SearchReceived => "SEARCH_RECEIVED",
            TransactionStatus::SelectReceived => "SELECT_RECEIVED",
            TransactionStatus::InitReceived => "INIT_RECEIVED",
            TransactionStatus::Confirmed => "CONFIRMED",
            TransactionStatus::FailureExternal => "FAILURE_EXTERNAL",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TransactionStatus; 6] = [
        TransactionStatus::Pending,
        TransactionStatus::SearchReceived,
        TransactionStatus::SelectReceived,
        TransactionStatus::InitReceived,
        TransactionStatus::Confirmed,
        TransactionStatus::FailureExternal,
    ];

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(TransactionStatus::default(), TransactionStatus::Pending);
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(TransactionStatus::Pending.can_transition_to(TransactionStatus::SearchReceived));
        assert!(
            TransactionStatus::SearchReceived.can_transition_to(TransactionStatus::SelectReceived)
        );
        assert!(
            TransactionStatus::SelectReceived.can_transition_to(TransactionStatus::InitReceived)
        );
        assert!(TransactionStatus::InitReceived.can_transition_to(TransactionStatus::Confirmed));
    }

    #[test]
    fn test_no_backward_or_skipping_transitions() {
        for (i, from) in ALL.iter().enumerate().take(5) {
            for (j, to) in ALL.iter().enumerate().take(5) {
                let allowed = from.can_transition_to(*to);
                assert_eq!(allowed, j == i + 1, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_failure_only_from_pending() {
        for from in ALL {
            let allowed = from.can_transition_to(TransactionStatus::FailureExternal);
            assert_eq!(allowed, from == TransactionStatus::Pending, "{from}");
        }
    }

    #[test]
    fn test_terminal_states_have_no_successor() {
        for status in ALL {
            if status.is_terminal() {
                assert!(ALL.iter().all(|to| !status.can_transition_to(*to)));
            }
        }
    }

    #[test]
    fn test_has_reached() {
        assert!(TransactionStatus::Confirmed.has_reached(TransactionStatus::SearchReceived));
        assert!(TransactionStatus::SearchReceived.has_reached(TransactionStatus::SearchReceived));
        assert!(!TransactionStatus::Pending.has_reached(TransactionStatus::SearchReceived));
        assert!(!TransactionStatus::FailureExternal.has_reached(TransactionStatus::SearchReceived));
        assert!(TransactionStatus::FailureExternal.has_reached(TransactionStatus::FailureExternal));
    }

    #[test]
    fn test_serialization_uses_wire_names() {
        let json = serde_json::to_string(&TransactionStatus::SearchReceived).unwrap();
        assert_eq!(json, "\"SEARCH_RECEIVED\"");
        let back: TransactionStatus = serde_json::from_str("\"FAILURE_EXTERNAL\"").unwrap();
        assert_eq!(back, TransactionStatus::FailureExternal);
    }

    #[test]
    fn test_display_matches_wire_name() {
        for status in ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json.trim_matches('"'), status.to_string());
        }
    }
}
