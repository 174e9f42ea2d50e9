//! Retry policy for model calls

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Exponential backoff for transient provider failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps; for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Calculate delay before retry number `attempt` (0-indexed).
    ///
    /// A multiplier that yields a negative or NaN delay falls back to `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::try_from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64())).unwrap_or(self.max_delay)
    }

    /// Whether `error` may be tried again under this policy
    pub fn applies_to(&self, error: &Error) -> bool {
        error.is_transient()
    }

    fn delay_for(&self, attempt: u32, error: &Error) -> Duration {
        let backoff = self.delay_for_attempt(attempt);
        match error {
            Error::ProviderTransient(huddle_ai::Error::RateLimited {
                retry_after: Some(secs),
            }) => backoff.max(Duration::from_secs(*secs)).min(self.max_delay),
            _ => backoff,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if self.applies_to(&e) && attempt + 1 < max_attempts => {
                    let delay = self.delay_for(attempt, &e);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        label,
                        attempt + 1,
                        max_attempts,
                        e,
                        delay
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
