//! Exponential backoff schedule for transient failures.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::RetryPolicy;

/// Tracks consecutive transient failures and yields the delay to wait
/// before the next attempt.
///
/// Delays grow as `base * factor^n`, capped at the policy maximum, with
/// symmetric jitter applied after capping. Call [`Backoff::reset`] after a
/// successful attempt so the next failure starts from the base delay again.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Delay before the next retry. Advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = i32::try_from(self.attempt).unwrap_or(i32::MAX);
        self.attempt = self.attempt.saturating_add(1);

        let raw = self.policy.base_delay.as_secs_f64() * self.policy.factor.powi(exponent);
        let capped = raw.min(self.policy.max_delay.as_secs_f64());
        let jittered = capped * (1.0 + jitter_unit() * self.policy.jitter);

        Duration::from_secs_f64(jittered.max(0.0))
    }

    /// Number of delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Pseudo-random value in `[-1.0, 1.0]` derived from the subsecond clock.
/// Retry spacing needs decorrelation, not cryptographic quality.
fn jitter_unit() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (f64::from(nanos) / f64::from(1_000_000_000u32)) * 2.0 - 1.0
}
