use std::fmt::Display;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::sync_api::{sync_objects::DEFAULT_CLIENT_ID, RetryPolicy};

pub const DEFAULT_BATCH_SIZE: i64 = 50;
pub const DEFAULT_LEASE_MINS: i64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct OutboxSettings {
    pub batch_size: i64,
    /// How long a claim is honoured before another worker may take the entry over.
    pub lease: Duration,
    pub retry: RetryPolicy,
}

impl Default for OutboxSettings {
    fn default() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE, lease: Duration::minutes(DEFAULT_LEASE_MINS), retry: RetryPolicy::default() }
    }
}

/// What to do with a DLQ message whose `event_type` has no handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnknownEventPolicy {
    /// Count it as a failed attempt and let the retry cap end it.
    #[default]
    Retry,
    /// Fail it on the first attempt.
    FailImmediately,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DlqSettings {
    pub client_id: i64,
    pub batch_size: i64,
    pub lease: Duration,
    pub retry: RetryPolicy,
    pub unknown_event_policy: UnknownEventPolicy,
}

impl Default for DlqSettings {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID,
            batch_size: DEFAULT_BATCH_SIZE,
            lease: Duration::minutes(DEFAULT_LEASE_MINS),
            retry: RetryPolicy::default(),
            unknown_event_policy: UnknownEventPolicy::default(),
        }
    }
}

/// The DLQ job types that have a retry handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DlqEventType {
    OrderSync,
    ProductSync,
    Unknown(String),
}

impl DlqEventType {
    pub const ORDER_SYNC: &'static str = "order_sync";
    pub const PRODUCT_SYNC: &'static str = "product_sync";

    pub fn parse(event_type: &str) -> Self {
        match event_type {
            Self::ORDER_SYNC => Self::OrderSync,
            Self::PRODUCT_SYNC => Self::ProductSync,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl Display for DlqEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DlqEventType::OrderSync => write!(f, "{}", Self::ORDER_SYNC),
            DlqEventType::ProductSync => write!(f, "{}", Self::PRODUCT_SYNC),
            DlqEventType::Unknown(s) => write!(f, "{s}"),
        }
    }
}

/// Payload of an `order_sync` DLQ message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSyncPayload {
    pub external_id: String,
}

/// Payload of a `product_sync` DLQ message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSyncPayload {
    pub sku: String,
}

/// Tally of one queue worker invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueRunReport {
    pub claimed: usize,
    pub succeeded: usize,
    pub rescheduled: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl QueueRunReport {
    pub fn processed(&self) -> usize {
        self.succeeded + self.rescheduled + self.failed
    }
}
