//! Bounded exponential-backoff retry for upstream calls.
//!
//! Only failures classified by [`ForgeError::is_transient`] are retried.
//! Everything else surfaces on first occurrence.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_retry::RetryIf;

use crate::error::{ForgeError, Result};
use crate::{log_debug, log_warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(2000);
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(1000);

/// How often and how patiently to retry transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the uniform random jitter added to each delay
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Attempts actually made; zero is treated as a single attempt
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay schedule for the retries this policy allows.
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule {
            policy: *self,
            next_attempt: 0,
        }
    }

    /// Delay before the retry that follows failed attempt `attempt` (0-indexed),
    /// without jitter.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// One scheduled retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryNotice {
    /// 1-based number of the attempt that just failed
    pub attempt: u32,
    pub max_attempts: u32,
    /// Wait before the next attempt, jitter included
    pub delay: Duration,
}

/// Iterator over retry delays: `base * 2^k + jitter` for `k` in
/// `0..max_attempts - 1`
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    policy: RetryPolicy,
    next_attempt: u32,
}

impl Iterator for BackoffSchedule {
    type Item = RetryNotice;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_attempt + 1 >= self.policy.effective_attempts() {
            return None;
        }

        let k = self.next_attempt;
        self.next_attempt += 1;

        let jitter = if self.policy.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            rand::rng().random_range(Duration::ZERO..self.policy.max_jitter)
        };

        Some(RetryNotice {
            attempt: k + 1,
            max_attempts: self.policy.effective_attempts(),
            delay: self.policy.backoff_for(k).saturating_add(jitter),
        })
    }
}

/// Run `operation`, retrying transient failures according to `policy`.
pub async fn invoke<T, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    invoke_observed(policy, operation, |_| {}).await
}

/// Like [`invoke`], additionally reporting every scheduled retry to `observer`.
pub async fn invoke_observed<T, F, Fut, O>(
    policy: &RetryPolicy,
    operation: F,
    mut observer: O,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    O: FnMut(&RetryNotice),
{
    let delays = policy.schedule().map(move |notice| {
        log_warn!(
            "Transient upstream failure on attempt {}/{}, retrying in {}ms",
            notice.attempt,
            notice.max_attempts,
            notice.delay.as_millis()
        );
        observer(&notice);
        notice.delay
    });

    let result = RetryIf::spawn(delays, operation, ForgeError::is_transient).await;

    match &result {
        Err(e) if e.is_transient() => {
            log_warn!(
                "Giving up after {} attempts: {}",
                policy.effective_attempts(),
                e
            );
        }
        Err(e) => log_debug!("Upstream call failed without retry: {}", e),
        Ok(_) => {}
    }

    result
}
