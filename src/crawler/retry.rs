//! Retry policy shared by the fetcher, the browser provisioning loop and
//! the table sink.
//!
//! The production policy never gives up: a fixed delay after each failure
//! and an unconditional retry. Tests and operators may bound it by attempt
//! count or elapsed time.

use crate::config::RetryConfig;
use std::time::{Duration, Instant};

/// Why the previous attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The server answered with a retryable status (429, 5xx, ...)
    Status,
    /// The request never produced a response (timeout, reset, DNS, ...)
    Network,
}

/// Fixed-interval retry policy with optional ceilings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub status_delay: Duration,
    pub error_delay: Duration,
    pub max_attempts: Option<u32>,
    pub max_elapsed: Option<Duration>,
}

impl RetryPolicy {
    /// Retry forever with the given delays
    pub fn unbounded(status_delay: Duration, error_delay: Duration) -> Self {
        Self {
            status_delay,
            error_delay,
            max_attempts: None,
            max_elapsed: None,
        }
    }

    /// One delay for every kind of failure
    pub fn fixed(delay: Duration) -> Self {
        Self::unbounded(delay, delay)
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_max_elapsed(mut self, elapsed: Duration) -> Self {
        self.max_elapsed = Some(elapsed);
        self
    }

    pub fn delay_for(&self, kind: FailureKind) -> Duration {
        match kind {
            FailureKind::Status => self.status_delay,
            FailureKind::Network => self.error_delay,
        }
    }

    pub fn start(&self) -> RetryState<'_> {
        RetryState {
            policy: self,
            attempts: 0,
            started: Instant::now(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_secs(10), Duration::from_secs(20))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            status_delay: Duration::from_millis(config.status_delay_ms),
            error_delay: Duration::from_millis(config.error_delay_ms),
            max_attempts: config.max_attempts,
            max_elapsed: config.max_elapsed_secs.map(Duration::from_secs),
        }
    }
}

/// Attempt bookkeeping for one logical operation
#[derive(Debug)]
pub struct RetryState<'a> {
    policy: &'a RetryPolicy,
    attempts: u32,
    started: Instant,
}

impl RetryState<'_> {
    /// Number of attempts recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records a failed attempt; returns the delay before the next one,
    /// or `None` when the policy is exhausted
    pub fn record_failure(&mut self, kind: FailureKind) -> Option<Duration> {
        self.attempts += 1;

        if let Some(max) = self.policy.max_attempts {
            if self.attempts >= max {
                return None;
            }
        }

        let delay = self.policy.delay_for(kind);
        if let Some(max_elapsed) = self.policy.max_elapsed {
            if self.started.elapsed() + delay > max_elapsed {
                return None;
            }
        }

        Some(delay)
    }

    /// Records a failure and sleeps for the policy delay; `false` when exhausted
    pub async fn backoff(&mut self, kind: FailureKind) -> bool {
        match self.record_failure(kind) {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                true
            }
            None => false,
        }
    }
}
