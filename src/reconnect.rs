//! Reconnect supervisor: rate-limited attempts with multiplicative backoff
//! and a hard attempt cap.

use std::time::{Duration, Instant};

use crate::config::MAX_RECONNECT_DELAY;

/// Growth factor applied to the delay after each failed attempt.
pub const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Backoff parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap: MAX_RECONNECT_DELAY,
            max_attempts,
        }
    }
}

/// Supervisor phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectPhase {
    /// Waiting for the backoff delay to elapse.
    Idle,
    /// An attempt has been granted and not yet reported.
    Attempting,
    Connected,
    /// The attempt cap was reached; no further attempts are granted.
    GivenUp,
}

/// Tracks consecutive failed connection attempts.
///
/// The first attempt, and the first one after an established connection
/// breaks, is granted immediately. After the `k`-th consecutive failure the
/// next attempt waits `base * 1.5^(k-1)`, capped at [`BackoffPolicy::cap`]. A
/// success resets the delay to `base`.
#[derive(Debug)]
pub struct ReconnectSupervisor {
    policy: BackoffPolicy,
    attempts: u32,
    delay: Duration,
    last_attempt: Option<Instant>,
    phase: ReconnectPhase,
}

impl ReconnectSupervisor {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            delay: policy.base.min(policy.cap),
            last_attempt: None,
            phase: ReconnectPhase::Idle,
        }
    }

    pub fn phase(&self) -> ReconnectPhase {
        self.phase
    }

    /// Consecutive attempts since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay that must elapse after the last attempt before the next one.
    pub fn current_delay(&self) -> Duration {
        self.delay
    }

    /// Whether an attempt may be started at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        match self.phase {
            ReconnectPhase::Idle => self
                .last_attempt
                .is_none_or(|last| now.saturating_duration_since(last) >= self.delay),
            ReconnectPhase::Attempting | ReconnectPhase::Connected | ReconnectPhase::GivenUp => {
                false
            }
        }
    }

    /// Start an attempt if one is allowed at `now`, returning its 1-based
    /// number.
    pub fn begin_attempt(&mut self, now: Instant) -> Option<u32> {
        if !self.ready(now) {
            return None;
        }
        if self.attempts >= self.policy.max_attempts {
            self.phase = ReconnectPhase::GivenUp;
            return None;
        }
        self.attempts += 1;
        self.last_attempt = Some(now);
        self.phase = ReconnectPhase::Attempting;
        Some(self.attempts)
    }

    /// Record that the granted attempt connected.
    pub fn record_success(&mut self) {
        self.attempts = 0;
        self.delay = self.policy.base.min(self.policy.cap);
        self.phase = ReconnectPhase::Connected;
    }

    /// Record that the granted attempt failed.
    pub fn record_failure(&mut self) {
        self.delay = if self.attempts <= 1 {
            self.policy.base
        } else {
            self.delay.mul_f64(BACKOFF_MULTIPLIER)
        }
        .min(self.policy.cap);
        self.phase = if self.attempts >= self.policy.max_attempts {
            ReconnectPhase::GivenUp
        } else {
            ReconnectPhase::Idle
        };
    }

    /// Record that an established connection broke. The next attempt is
    /// granted immediately.
    pub fn record_disconnect(&mut self) {
        if self.phase == ReconnectPhase::Connected {
            self.phase = ReconnectPhase::Idle;
            self.last_attempt = None;
        }
    }
}
