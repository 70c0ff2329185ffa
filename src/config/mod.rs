use std::time::Duration;

use garde::Validate;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ClientConfig {
    /// Analysis service base URL (e.g., "http://127.0.0.1:5002")
    #[serde(default = "default_api_base_url")]
    #[garde(url)]
    pub api_base_url: String,

    /// Delay between status polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    #[garde(range(min = 100))]
    pub poll_interval_ms: u64,

    /// Overall budget for the polling phase, in seconds
    #[serde(default = "default_poll_timeout_secs")]
    #[garde(range(min = 1))]
    pub poll_timeout_secs: u64,

    /// Per-request HTTP timeout, in seconds
    #[serde(default = "default_request_timeout_secs")]
    #[garde(range(min = 1))]
    pub request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:5002".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_poll_timeout_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_secs: default_poll_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validated()
    }

    /// Check field ranges, then that a poll fits inside the polling budget.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        if self.poll_timeout_secs.saturating_mul(1000) <= self.poll_interval_ms {
            return Err(ConfigError::Timing {
                interval_ms: self.poll_interval_ms,
                timeout_secs: self.poll_timeout_secs,
            });
        }
        Ok(self)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.poll_timeout_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// How often to poll for analysis status, and for how long in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        ClientConfig::default().poll_policy()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),

    #[error("Poll interval {interval_ms}ms must be shorter than the {timeout_secs}s poll timeout")]
    Timing { interval_ms: u64, timeout_secs: u64 },
}
