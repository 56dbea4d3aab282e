//! Retry policy shared by every fallible boundary call.
//!
//! Connection bootstrap uses a bounded policy; the invocation loop uses an
//! unbounded one unless a failure bound is configured. Delays are fixed:
//! no exponential growth and no jitter.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (`None` = never give up).
    max_attempts: Option<u32>,
    /// Pause between a failed attempt and the next one.
    delay: Duration,
}

impl RetryPolicy {
    /// Bounded policy. `max_attempts` is clamped to at least one.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            delay,
        }
    }

    pub fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether `attempts` failed attempts use up the policy.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// policy is exhausted. The closure receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut, R>(
        &self,
        operation: &str,
        mut op: F,
        is_retryable: R,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 0u32;
        loop {
            attempt = attempt.saturating_add(1);
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!("{} succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if !is_retryable(&e) => {
                    tracing::error!("{} failed with a non-retryable error: {}", operation, e);
                    return Err(e);
                }
                Err(e) if self.is_exhausted(attempt) => {
                    tracing::error!(
                        "{} failed on attempt {}: {}. Max retries reached.",
                        operation,
                        attempt,
                        e
                    );
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        "{} failed on attempt {}: {}. Retrying in {:?}...",
                        operation,
                        attempt,
                        e,
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}
