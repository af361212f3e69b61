use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::errors::{AutomationError, Result};

/// Inter-attempt delay growth family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Linear,
    Exponential,
}

pub type RetryPredicate = Box<dyn Fn(&AutomationError) -> bool + Send + Sync>;
pub type RetryObserver = Box<dyn Fn(u32, &AutomationError, Duration) + Send + Sync>;

/// Per-call-site retry configuration. Build one where the call happens;
/// the policy itself carries no state between calls.
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub jitter: bool,
    pub base_delay: Duration,
    pub attempt_timeout: Option<Duration>,
    retry_if: Option<RetryPredicate>,
    on_retry: Option<RetryObserver>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential,
            jitter: false,
            base_delay: Duration::from_millis(500),
            attempt_timeout: None,
            retry_if: None,
            on_retry: None,
        }
    }
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear,
            base_delay,
            ..Default::default()
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential,
            base_delay,
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn retry_if(
        mut self,
        predicate: impl Fn(&AutomationError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.retry_if = Some(Box::new(predicate));
        self
    }

    pub fn on_retry(
        mut self,
        observer: impl Fn(u32, &AutomationError, Duration) + Send + Sync + 'static,
    ) -> Self {
        self.on_retry = Some(Box::new(observer));
        self
    }

    /// Delay to sleep after a failed attempt numbered from 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let raw = match self.backoff {
            Backoff::Linear => self.base_delay * attempt,
            Backoff::Exponential => self.base_delay * 2u32.saturating_pow(attempt - 1),
        };
        if self.jitter {
            let noise: f64 = rand::thread_rng().gen_range(0.0..0.5);
            raw + raw.mul_f64(noise)
        } else {
            raw
        }
    }
}

/// Run `operation` up to `policy.max_attempts` times, racing each attempt
/// against `policy.attempt_timeout` when one is set. A timer win counts as
/// a retryable timeout for that attempt. Non-retryable errors (and errors
/// the predicate rejects) abort immediately; the last attempt's error is
/// returned unmodified.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        let outcome = match policy.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, operation()).await {
                Ok(result) => result,
                Err(_) => Err(AutomationError::timeout(format!(
                    "attempt {attempt} exceeded {}ms",
                    limit.as_millis()
                ))),
            },
            None => operation().await,
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let accepted = policy.retry_if.as_ref().map_or(true, |pred| pred(&err));
        if !err.retryable || !accepted || attempt == attempts {
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        if let Some(observer) = &policy.on_retry {
            observer(attempt, &err, delay);
        }
        debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying after failure"
        );
        tokio::time::sleep(delay).await;
    }
    unreachable!("final attempt always returns")
}
