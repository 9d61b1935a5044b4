use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reconnect policy applied after an unsolicited close.
///
/// The default reconnects immediately and without limit. Setting a non-zero
/// `initial_delay_ms` enables exponential backoff capped at `max_delay_ms`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    /// 0 means unlimited.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 0,
            initial_delay_ms: 0,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn backoff(initial: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            enabled: true,
            max_attempts,
            initial_delay_ms: u64::try_from(initial.as_millis()).unwrap_or(u64::MAX),
            max_delay_ms: u64::try_from(max.as_millis()).unwrap_or(u64::MAX),
            backoff_multiplier: 2.0,
        }
    }

    #[must_use]
    pub const fn is_immediate(&self) -> bool {
        self.initial_delay_ms == 0
    }

    #[must_use]
    pub const fn should_retry(&self, attempt: u32) -> bool {
        self.enabled && (self.max_attempts == 0 || attempt < self.max_attempts)
    }

    /// Delay before the given attempt (1-based): `initial * multiplier^(attempt-1)`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.is_immediate() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay = (self.initial_delay_ms as f64) * self.backoff_multiplier.max(1.0).powi(exponent);
        let delay = delay.min(self.max_delay_ms as f64);
        Duration::from_millis(delay as u64)
    }
}

/// Tracks reconnect attempts for one API key across unsolicited closes.
#[derive(Debug, Clone, Default)]
pub struct ReconnectSupervisor {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl ReconnectSupervisor {
    #[must_use]
    pub const fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Called once a connection reaches `Open`.
    pub const fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Record a close and return the delay before the next attempt, or `None`
    /// when the policy forbids another one.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.policy.should_retry(self.attempts) {
            tracing::warn!(attempts = self.attempts, "Reconnect attempts exhausted");
            return None;
        }
        self.attempts += 1;
        let delay = self.policy.delay_for(self.attempts);
        tracing::debug!(attempt = self.attempts, delay_ms = delay.as_millis(), "Scheduling reconnect");
        Some(delay)
    }
}
