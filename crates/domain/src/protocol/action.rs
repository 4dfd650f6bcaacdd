//! Protocol actions, outbound and inbound.

use serde::{Deserialize, Serialize};

use crate::transaction::TransactionStatus;

/// An outbound protocol step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Discover,
    Select,
    Init,
    Confirm,
    Status,
}

impl Action {
    /// Returns the wire name used in `context.action`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Discover => "discover",
            Action::Select => "select",
            Action::Init => "init",
            Action::Confirm => "confirm",
            Action::Status => "status",
        }
    }

    /// Returns the callback the counterparty answers this step with.
    pub fn callback(&self) -> CallbackAction {
        match self {
            Action::Discover => CallbackAction::OnDiscover,
            Action::Select => CallbackAction::OnSelect,
            Action::Init => CallbackAction::OnInit,
            Action::Confirm => CallbackAction::OnConfirm,
            Action::Status => CallbackAction::OnStatus,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An inbound callback delivered by the counterparty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackAction {
    OnDiscover,
    OnSelect,
    OnInit,
    OnConfirm,
    OnStatus,
    OnUpdate,
    OnCancel,
}

impl CallbackAction {
    /// Every callback the service accepts.
    pub const ALL: [CallbackAction; 7] = [
        CallbackAction::OnDiscover,
        CallbackAction::OnSelect,
        CallbackAction::OnInit,
        CallbackAction::OnConfirm,
        CallbackAction::OnStatus,
        CallbackAction::OnUpdate,
        CallbackAction::OnCancel,
    ];

    /// Parses a callback endpoint name. `on_search` is the legacy name of
    /// `on_discover` still used by older network adapters.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "on_discover" | "on_search" => Some(CallbackAction::OnDiscover),
            "on_select" => Some(CallbackAction::OnSelect),
            "on_init" => Some(CallbackAction::OnInit),
            "on_confirm" => Some(CallbackAction::OnConfirm),
            "on_status" => Some(CallbackAction::OnStatus),
            "on_update" => Some(CallbackAction::OnUpdate),
            "on_cancel" => Some(CallbackAction::OnCancel),
            _ => None,
        }
    }

    /// Returns the endpoint name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackAction::OnDiscover => "on_discover",
            CallbackAction::OnSelect => "on_select",
            CallbackAction::OnInit => "on_init",
            CallbackAction::OnConfirm => "on_confirm",
            CallbackAction::OnStatus => "on_status",
            CallbackAction::OnUpdate => "on_update",
            CallbackAction::OnCancel => "on_cancel",
        }
    }

    /// The status a correlated callback of this kind moves a transaction to.
    /// `None` for callbacks that are acknowledged without a state change.
    pub fn target_status(&self) -> Option<TransactionStatus> {
        match self {
            CallbackAction::OnDiscover => Some(TransactionStatus::SearchReceived),
            CallbackAction::OnSelect => Some(TransactionStatus::SelectReceived),
            CallbackAction::OnInit => Some(TransactionStatus::InitReceived),
            CallbackAction::OnConfirm => Some(TransactionStatus::Confirmed),
            CallbackAction::OnStatus | CallbackAction::OnUpdate | CallbackAction::OnCancel => None,
        }
    }
}

impl std::fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
