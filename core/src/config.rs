//! Client configuration.
//!
//! # Design
//! Everything the transport and orchestrator need (endpoint, bearer token,
//! device identity, retry tuning) travels in one explicit struct passed at
//! construction. Nothing here is ambient or global.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Backoff tuning for transient-failure retries.
///
/// The delay starts at `base_delay` and multiplies by `factor` on each
/// consecutive transient failure, never exceeding `max_delay`. A symmetric
/// random `jitter` fraction of the current delay is applied on top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            factor: 1.5,
            jitter: 0.05,
        }
    }
}

impl RetryPolicy {
    /// Same schedule with jitter disabled. Deterministic delays for tests.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }
}

/// Configuration for the sync core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the list API, e.g. `https://example.com/api`.
    pub base_url: String,
    /// Bearer token sent on every request.
    pub token: String,
    /// Opaque identifier stamped into `last_updated_by` on outgoing DTOs.
    pub device_id: String,
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Build a config with a freshly generated device id and default retry
    /// tuning.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            device_id: Uuid::new_v4().to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = device_id.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_matches_documented_schedule() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.base_delay, Duration::from_secs(2));
        assert_eq!(retry.max_delay, Duration::from_secs(120));
        assert_eq!(retry.factor, 1.5);
        assert_eq!(retry.jitter, 0.05);
    }

    #[test]
    fn new_config_generates_a_device_id() {
        let a = SyncConfig::new("http://localhost:1", "t");
        let b = SyncConfig::new("http://localhost:1", "t");
        assert!(!a.device_id.is_empty());
        assert_ne!(a.device_id, b.device_id);
    }

    #[test]
    fn builders_override_fields() {
        let config = SyncConfig::new("http://localhost:1", "t")
            .with_device_id("device-7")
            .with_retry(RetryPolicy::default().without_jitter());
        assert_eq!(config.device_id, "device-7");
        assert_eq!(config.retry.jitter, 0.0);
    }
}
