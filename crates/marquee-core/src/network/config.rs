use serde::{Deserialize, Serialize};

/// Timeouts and retry policy shared by every outbound HTTP call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Connection timeout in seconds
    pub connect_timeout_seconds: u32,
    /// Whole-request timeout in seconds
    pub request_timeout_seconds: u32,
    /// Extra attempts after the first one for transient failures
    pub max_retries: u32,
    /// Base delay for exponential backoff, doubled on every retry
    pub retry_backoff_ms: u64,
    /// User agent override
    pub user_agent: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 10,
            request_timeout_seconds: 10,
            max_retries: 2,
            retry_backoff_ms: 500,
            user_agent: None,
        }
    }
}

impl NetworkConfig {
    /// Same policy with a different request timeout, as used by `crawl --timeout`.
    #[must_use]
    pub fn with_request_timeout(mut self, seconds: u32) -> Self {
        self.request_timeout_seconds = seconds;
        self
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("marquee/{}", env!("CARGO_PKG_VERSION")))
    }

    pub fn validate(&self) -> Result<(), NetworkConfigError> {
        if self.request_timeout_seconds == 0 {
            return Err(NetworkConfigError::ZeroTimeout("request_timeout_seconds"));
        }
        if self.connect_timeout_seconds == 0 {
            return Err(NetworkConfigError::ZeroTimeout("connect_timeout_seconds"));
        }
        if self.max_retries > 10 {
            return Err(NetworkConfigError::TooManyRetries(self.max_retries));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkConfigError {
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("Retry count {0} is too high (max 10)")]
    TooManyRetries(u32),
}
