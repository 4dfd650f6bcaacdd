//! The `context` block carried by every protocol envelope.

use chrono::{SecondsFormat, Utc};
use common::{MessageId, TransactionId};
use serde::{Deserialize, Serialize};

use super::Action;

/// Default validity of an outbound envelope (ISO-8601 duration).
pub const DEFAULT_TTL: &str = "PT10M";

/// Identity and network settings stamped into every context block.
///
/// Reads from environment variables:
/// - `BAP_ID` — requester id (default: `"fluxeon-dso-bap-dev"`)
/// - `BAP_URI` — callback base URI the counterparty answers to
/// - `BECKN_CORE_VERSION` — protocol core version (default: `"2.0.0"`)
/// - `BECKN_DOMAIN_COMPUTE_ENERGY` — domain used for discovery
/// - `BECKN_DOMAIN_DEMAND_FLEXIBILITY` — domain used for every later step
/// - `BECKN_COUNTRY` / `BECKN_CITY` — location codes
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    pub bap_id: String,
    pub bap_uri: String,
    pub core_version: String,
    pub compute_energy_domain: String,
    pub demand_flexibility_domain: String,
    pub country: String,
    pub city: String,
    pub ttl: String,
}

impl ProtocolConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |key: &str, default: String| std::env::var(key).unwrap_or(default);
        Self {
            bap_id: var("BAP_ID", defaults.bap_id),
            bap_uri: var("BAP_URI", defaults.bap_uri),
            core_version: var("BECKN_CORE_VERSION", defaults.core_version),
            compute_energy_domain: var(
                "BECKN_DOMAIN_COMPUTE_ENERGY",
                defaults.compute_energy_domain,
            ),
            demand_flexibility_domain: var(
                "BECKN_DOMAIN_DEMAND_FLEXIBILITY",
                defaults.demand_flexibility_domain,
            ),
            country: var("BECKN_COUNTRY", defaults.country),
            city: var("BECKN_CITY", defaults.city),
            ttl: defaults.ttl,
        }
    }

    /// Returns the domain a given step is sent under.
    pub fn domain_for(&self, action: Action) -> &str {
        match action {
            Action::Discover => &self.compute_energy_domain,
            _ => &self.demand_flexibility_domain,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            bap_id: "fluxeon-dso-bap-dev".to_string(),
            bap_uri: "http://localhost:3000/beckn/callbacks".to_string(),
            core_version: "2.0.0".to_string(),
            compute_energy_domain: "beckn.one.DEG:compute-energy:1.0".to_string(),
            demand_flexibility_domain: "beckn.one.DEG:demand-flexibility:1.0".to_string(),
            country: "ARG".to_string(),
            city: "Buenos Aires".to_string(),
            ttl: DEFAULT_TTL.to_string(),
        }
    }
}

/// Context block of a protocol envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub domain: String,
    pub country: String,
    pub city: String,
    pub action: Action,
    pub core_version: String,
    pub bap_id: String,
    pub bap_uri: String,
    pub transaction_id: TransactionId,
    pub message_id: MessageId,
    pub timestamp: String,
    pub ttl: String,
}

impl Context {
    /// Builds the context for one outbound step, stamped with the current time.
    pub fn new(
        config: &ProtocolConfig,
        action: Action,
        transaction_id: TransactionId,
        message_id: MessageId,
    ) -> Self {
        Self {
            domain: config.domain_for(action).to_string(),
            country: config.country.clone(),
            city: config.city.clone(),
            action,
            core_version: config.core_version.clone(),
            bap_id: config.bap_id.clone(),
            bap_uri: config.bap_uri.clone(),
            transaction_id,
            message_id,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            ttl: config.ttl.clone(),
        }
    }
}
