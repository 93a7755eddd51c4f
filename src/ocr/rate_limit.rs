//! Backoff and Retry-After handling for rate-limited service calls.

use std::time::Duration;

/// Parse a Retry-After header given in seconds, capped at `max_wait`.
pub fn parse_retry_after(header_value: Option<&str>, max_wait: Duration) -> Option<Duration> {
    header_value?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(max_wait))
}

/// Exponential backoff for a zero-based attempt, capped at `max_wait`.
pub fn backoff_delay(attempt: u32, base: Duration, max_wait: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max_wait).min(max_wait)
}

/// How many times to retry a rate-limited request and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Wait before retry `attempt`, or `None` once retries are exhausted.
    /// A server-supplied Retry-After takes precedence over backoff.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<&str>) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        Some(
            parse_retry_after(retry_after, self.max_wait)
                .unwrap_or_else(|| backoff_delay(attempt, self.base_delay, self.max_wait)),
        )
    }
}
