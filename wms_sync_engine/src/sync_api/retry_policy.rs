use chrono::{DateTime, Duration, Utc};

use crate::traits::Settlement;

/// Prefix stamped on the error of an entry that exhausted its retries.
pub const MAX_RETRIES_MARKER: &str = "[max retries reached] ";
/// Prefix stamped on the error of an entry that failed permanently without exhausting its retries.
pub const NON_RETRYABLE_MARKER: &str = "[non-retryable] ";

pub const DEFAULT_BASE_DELAY_MINS: i64 = 5;
pub const DEFAULT_MAX_RETRIES: i64 = 5;

/// The backoff and cap law shared by the outbox and the dead-letter queue.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_retries: i64,
    /// When set, 4xx responses from the carrier fail an entry immediately instead of consuming its retries.
    pub classify_client_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::minutes(DEFAULT_BASE_DELAY_MINS),
            max_retries: DEFAULT_MAX_RETRIES,
            classify_client_errors: false,
        }
    }
}

impl RetryPolicy {
    /// `base_delay × 2^(n−1)` for the n-th failed attempt. With the default base that is 5, 10, 20, 40 minutes.
    pub fn delay_for(&self, retry_count: i64) -> Duration {
        let exponent = retry_count.clamp(1, 20) - 1;
        self.base_delay * (1i32 << exponent)
    }

    /// Decides what happens to an entry after a failed attempt.
    ///
    /// `retry_count` is the number of failed attempts including this one. The entry is retried at
    /// `now + delay_for(retry_count)` while `retry_count < max_retries`, and fails terminally once the cap is reached.
    /// A `permanent` failure ends the entry straight away.
    pub fn settle_failure(
        &self,
        retry_count: i64,
        max_retries: i64,
        error: &str,
        permanent: bool,
        now: DateTime<Utc>,
    ) -> Settlement {
        if permanent {
            Settlement::Failed { retry_count, error: format!("{NON_RETRYABLE_MARKER}{error}") }
        } else if retry_count >= max_retries {
            Settlement::Failed { retry_count, error: format!("{MAX_RETRIES_MARKER}{error}") }
        } else {
            Settlement::Retry { retry_count, next_retry_at: now + self.delay_for(retry_count), error: error.to_string() }
        }
    }
}
