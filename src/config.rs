use std::time::Duration;

use crate::error::{AppError, Result};

pub const ENV_API_KEY: &str = "DOCUMENT_AI_API_KEY";
pub const ENV_ENDPOINT: &str = "DOCUMENT_AI_ENDPOINT";
pub const ENV_POLL_INTERVAL: &str = "DOCUMENT_AI_POLL_INTERVAL_SECS";
pub const ENV_MAX_POLL_ATTEMPTS: &str = "DOCUMENT_AI_MAX_POLL_ATTEMPTS";
pub const ENV_REQUEST_TIMEOUT: &str = "DOCUMENT_AI_REQUEST_TIMEOUT_SECS";

pub const DEFAULT_ENDPOINT: &str = "https://api.abbyy.com";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Load `.env` from the working directory, if present.
pub fn load_env() {
    let _ = dotenvy::dotenv();
}

/// How the processing loop waits for a job to reach `Processed`.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until the service reports a terminal status.
    pub max_attempts: Option<u32>,
    /// Multiplier applied to the interval after each attempt; 1.0 keeps it fixed.
    pub backoff_factor: f64,
    pub max_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_attempts: None,
            backoff_factor: 1.0,
            max_interval: Duration::from_secs(60),
        }
    }
}

impl PollPolicy {
    /// No sleeping between polls. Used by tests and mock services.
    pub fn immediate() -> Self {
        Self {
            interval: Duration::ZERO,
            max_attempts: None,
            backoff_factor: 1.0,
            max_interval: Duration::ZERO,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts.filter(|n| *n > 0);
        self
    }

    /// Delay before the given 1-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.backoff_factor <= 1.0 || attempt <= 1 {
            return self.interval;
        }
        let factor = self.backoff_factor.powi(attempt as i32 - 1);
        let secs = (self.interval.as_secs_f64() * factor)
            .min(self.max_interval.as_secs_f64())
            .max(self.interval.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_interval.max(self.interval))
    }

    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

/// Connection settings for the remote extraction service.
#[derive(Clone)]
pub struct ServiceConfig {
    pub api_key: String,
    pub endpoint: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ServiceConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.endpoint = endpoint.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(AppError::Config(format!(
                "API key not set. Pass --api-key or set {} in .env",
                ENV_API_KEY
            )));
        }
        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(AppError::Config(format!(
                "Invalid endpoint '{}'. Expected an http(s) URL.",
                self.endpoint
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_polls_every_three_seconds_without_limit() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(3));
        assert_eq!(policy.delay_for(1), Duration::from_secs(3));
        assert_eq!(policy.delay_for(50), Duration::from_secs(3));
        assert!(policy.allows(10_000));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = PollPolicy {
            interval: Duration::from_secs(2),
            max_attempts: Some(5),
            backoff_factor: 2.0,
            max_interval: Duration::from_secs(10),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert!(policy.allows(5));
        assert!(!policy.allows(6));
    }

    #[test]
    fn huge_interval_with_backoff_does_not_overflow() {
        let policy = PollPolicy {
            interval: Duration::from_secs(u64::MAX),
            backoff_factor: 2.0,
            ..PollPolicy::default()
        };
        assert_eq!(policy.delay_for(3), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn zero_max_attempts_means_unbounded() {
        let policy = PollPolicy::default().with_max_attempts(Some(0));
        assert_eq!(policy.max_attempts, None);
    }

    #[test]
    fn config_requires_key_and_redacts_it() {
        let empty = ServiceConfig::new("  ");
        assert!(matches!(empty.validate(), Err(AppError::Config(_))));

        let cfg = ServiceConfig::new("secret-key").with_endpoint("https://example.test/");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.endpoint, "https://example.test");
        assert!(!format!("{:?}", cfg).contains("secret-key"));
    }
}
