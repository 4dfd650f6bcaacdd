//! Client and orchestrator settings.

use std::time::Duration;

use domain::Action;

/// Where and how outbound steps are delivered.
///
/// Reads from environment variables:
/// - `BECKN_BAP_SANDBOX_URL` — endpoint for discover, confirm and status
/// - `ONIX_URL` — network adapter endpoint for select and init
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub sandbox_url: String,
    pub adapter_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sandbox_url: std::env::var("BECKN_BAP_SANDBOX_URL").unwrap_or(defaults.sandbox_url),
            adapter_url: std::env::var("ONIX_URL").unwrap_or(defaults.adapter_url),
            ..defaults
        }
    }

    /// Returns the URL a step is posted to.
    pub fn endpoint(&self, action: Action) -> String {
        match action {
            Action::Select | Action::Init => format!(
                "{}/bap/caller/{}",
                self.adapter_url.trim_end_matches('/'),
                action
            ),
            Action::Discover | Action::Confirm | Action::Status => {
                format!("{}/api/{}", self.sandbox_url.trim_end_matches('/'), action)
            }
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            sandbox_url: "https://deg-hackathon-bap-sandbox.becknprotocol.io".to_string(),
            adapter_url: "http://localhost:8081".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Flow-level settings.
///
/// Reads `CALLBACK_TIMEOUT_SECS` (default: `60`).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long each step waits for its callback.
    pub callback_timeout: Duration,
}

impl OrchestratorConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let callback_timeout = std::env::var("CALLBACK_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Self::default().callback_timeout);
        Self { callback_timeout }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            callback_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(
            OrchestratorConfig::default().callback_timeout,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_endpoint_routing() {
        let config = ClientConfig {
            sandbox_url: "https://sandbox.example/".to_string(),
            adapter_url: "http://adapter:8081".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(
            config.endpoint(Action::Discover),
            "https://sandbox.example/api/discover"
        );
        assert_eq!(
            config.endpoint(Action::Select),
            "http://adapter:8081/bap/caller/select"
        );
        assert_eq!(
            config.endpoint(Action::Init),
            "http://adapter:8081/bap/caller/init"
        );
        assert_eq!(
            config.endpoint(Action::Confirm),
            "https://sandbox.example/api/confirm"
        );
        assert_eq!(
            config.endpoint(Action::Status),
            "https://sandbox.example/api/status"
        );
    }
}
