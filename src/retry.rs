//! Retry policy with exponential backoff
//!
//! The policy is a plain value: the fetch layer hands it an operation and it
//! decides, per failure, whether to sleep and try again.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::error::{Result, ValidationError};

/// Exponential backoff bounded by a total time budget
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: u32,
    /// Total time after which no further attempt is started
    pub max_elapsed: Duration,
    /// Optional cap on the number of retries
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2,
            max_elapsed: Duration::from_secs(300),
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: Some(0),
            ..Self::default()
        }
    }

    /// Backoff delay before retry number `attempt` (0-based), capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Whether `error` qualifies for another attempt
    pub fn is_retryable(&self, error: &ValidationError) -> bool {
        error.is_transient()
    }

    /// Decide whether to retry after `attempt` failed retries, given the time already spent
    pub fn should_retry(&self, error: &ValidationError, attempt: u32, elapsed: Duration) -> bool {
        if !self.is_retryable(error) {
            return false;
        }
        if let Some(max_retries) = self.max_retries
            && attempt >= max_retries
        {
            return false;
        }
        elapsed + self.delay_for(attempt) <= self.max_elapsed
    }

    /// Run `operation` until it succeeds, fails permanently, or the budget runs out
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !self.should_retry(&error, attempt, started.elapsed()) {
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        location = %label,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
