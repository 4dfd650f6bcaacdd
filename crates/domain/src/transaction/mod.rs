//! Transaction model and status state machine.

mod record;
mod status;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use record::{HistoryEntry, Transaction, TransactionMetrics};
pub use status::TransactionStatus;

/// Business parameters of a flexibility request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlexibilityRequest {
    /// Grid feeder the flexibility is requested for.
    pub feeder_id: String,
    /// Requested load reduction, in kW.
    pub flexibility_kw: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}
