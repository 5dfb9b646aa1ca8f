//! Reconnection Policy
//!
//! Delay schedule between connection attempts. The default is exponential
//! backoff with jitter; [`ReconnectConfig::flat`] gives a fixed delay.
//! The policy is reset after every successful handshake, so a connection
//! that later drops starts again from the initial delay.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::ReconnectSettings;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Backoff multiplier (1.0 = flat).
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Consecutive failed attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// Fixed delay between attempts, retried forever.
    #[must_use]
    pub const fn flat(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        }
    }

    /// Build from loaded settings.
    #[must_use]
    pub const fn from_settings(settings: &ReconnectSettings) -> Self {
        Self {
            initial_delay: settings.delay_initial,
            max_delay: settings.delay_max,
            multiplier: settings.multiplier,
            jitter_factor: settings.jitter,
            max_attempts: settings.max_attempts,
        }
    }

    /// Same config with a different attempt limit.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Stateful delay generator for one connection manager.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a policy at its initial state.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// Delay before the next attempt, or `None` once the attempt limit is hit.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        self.attempt_count = self.attempt_count.saturating_add(1);
        let delay = self.apply_jitter(self.current_delay);

        let multiplier = if self.config.multiplier.is_finite() && self.config.multiplier >= 1.0 {
            self.config.multiplier
        } else {
            1.0
        };
        let max_millis = self.config.max_delay.max(self.config.initial_delay).as_millis();
        #[allow(clippy::cast_precision_loss)]
        let scaled = (self.current_delay.as_millis() as f64 * multiplier).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let next_millis = if scaled.is_finite() { scaled as u128 } else { max_millis };
        let capped = u64::try_from(next_millis.min(max_millis)).unwrap_or(u64::MAX);
        self.current_delay = Duration::from_millis(capped);

        Some(delay)
    }

    /// Return to the initial delay after a successful connection.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Attempts since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Whether another attempt is allowed.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 || duration.is_zero() {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor.min(1.0);
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted = adjusted_millis as u64;
        Duration::from_millis(adjusted)
    }
}
