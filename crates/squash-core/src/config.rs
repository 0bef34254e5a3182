//! Notifier configuration.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PUSH_URL: &str = "http://localhost:5006";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid value for {var}: {value:?} (expected milliseconds)")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

/// Change notifier settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    /// How long a pending refresh waits after its first event
    pub debounce: Duration,
    /// Upper bound on a single push
    pub push_timeout: Duration,
    /// Base URL of the viewer push endpoint
    pub push_url: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            push_timeout: DEFAULT_PUSH_TIMEOUT,
            push_url: DEFAULT_PUSH_URL.to_string(),
        }
    }
}

impl NotifierConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }

    pub fn with_push_url(mut self, url: impl Into<String>) -> Self {
        self.push_url = url.into();
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SQUASH_DEBOUNCE_MS (optional, default: 250)
    /// - SQUASH_PUSH_TIMEOUT_MS (optional, default: 5000)
    /// - SQUASH_PUSH_URL (optional, default: "http://localhost:5006")
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let millis = |var: &'static str, default: Duration| match lookup(var) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError { var, value }),
        };

        Ok(Self {
            debounce: millis("SQUASH_DEBOUNCE_MS", DEFAULT_DEBOUNCE)?,
            push_timeout: millis("SQUASH_PUSH_TIMEOUT_MS", DEFAULT_PUSH_TIMEOUT)?,
            push_url: lookup("SQUASH_PUSH_URL").unwrap_or_else(|| DEFAULT_PUSH_URL.to_string()),
        })
    }
}
