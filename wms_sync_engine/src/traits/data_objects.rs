use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Parameters for atomically claiming due rows from a retry queue.
///
/// A row is due when it is pending (or, for the DLQ, stuck in `retrying`), its `next_retry_at` has passed, and no
/// other worker holds an unexpired lease on it. Claimed rows are stamped with `worker_id` and leased until
/// `now + lease`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimRequest {
    pub worker_id: String,
    pub now: DateTime<Utc>,
    pub lease: Duration,
    pub limit: i64,
}

impl ClaimRequest {
    pub fn leased_until(&self) -> DateTime<Utc> {
        self.now + self.lease
    }
}

/// The outcome of one delivery attempt, as written back to the queue row. Every variant clears the lease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Settlement {
    /// The outbox entry becomes `sent`, or the DLQ message `success`.
    Delivered { response: Option<String> },
    /// Stays pending until `next_retry_at`.
    Retry { retry_count: i64, next_retry_at: DateTime<Utc>, error: String },
    /// Terminal. The row is never claimed again.
    Failed { retry_count: i64, error: String },
}

impl Settlement {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Settlement::Retry { .. })
    }
}
