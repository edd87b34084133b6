//! Attempt-level retry policy
//!
//! Wraps a [`Fetcher`] and retries transient failures with a fixed delay. Once
//! the API rate limits us, the longer delay stays in force for the rest of the
//! attempts on that coordinate. Decisive outcomes (success, not found, quota)
//! end the run immediately.

use crate::config::RetryConfig;
use crate::crawler::fetcher::{FetchOutcome, Fetcher};
use crate::state::Coordinate;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// How many times to try a coordinate and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            rate_limit_delay: Duration::from_secs(10),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            rate_limit_delay: Duration::from_millis(config.rate_limit_delay_ms),
        }
    }
}

/// A failed attempt that is worth retrying
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    RateLimited,
    Transient(String),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited"),
            Self::Transient(detail) => write!(f, "{}", detail),
        }
    }
}

/// What the retry wrapper hands to the traversal engine
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Success(Value),
    NotFound(i64),
    QuotaExhausted,
    /// Every attempt was rate limited or failed transiently
    ExhaustedRetries {
        attempts: u32,
        last_failure: AttemptFailure,
    },
}

/// Fetches `coordinate`, retrying transient failures according to `policy`
pub async fn fetch_with_retry<F>(fetcher: &F, coordinate: Coordinate, policy: &RetryPolicy) -> RetryOutcome
where
    F: Fetcher + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.base_delay;
    let mut rate_limited = false;
    let mut attempt = 0;

    loop {
        attempt += 1;

        let failure = match fetcher.fetch(coordinate).await {
            FetchOutcome::Success(payload) => return RetryOutcome::Success(payload),
            FetchOutcome::NotFound(code) => return RetryOutcome::NotFound(code),
            FetchOutcome::QuotaExhausted => return RetryOutcome::QuotaExhausted,
            FetchOutcome::RateLimited => {
                if !rate_limited {
                    rate_limited = true;
                    delay = policy.rate_limit_delay;
                }
                AttemptFailure::RateLimited
            }
            FetchOutcome::TransientError(detail) => AttemptFailure::Transient(detail),
        };

        if attempt >= max_attempts {
            return RetryOutcome::ExhaustedRetries {
                attempts: attempt,
                last_failure: failure,
            };
        }

        tracing::warn!(
            "Fetching {} failed ({}); retrying in {:?} (attempt {}/{})",
            coordinate,
            failure,
            delay,
            attempt,
            max_attempts
        );
        tokio::time::sleep(delay).await;
    }
}
