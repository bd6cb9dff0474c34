use thiserror::Error;

use crate::traits::{AuditLog, DeliveryLog, DlqStore, OrderStore, OutboxStore, RuleStore};

/// The complete set of behaviour a storage backend needs to run the whole sync pipeline.
#[allow(async_fn_in_trait)]
pub trait SyncDatabase: Clone + OrderStore + RuleStore + OutboxStore + DlqStore + DeliveryLog + AuditLog {
    /// The URL of the database
    fn url(&self) -> &str;
}

#[derive(Debug, Clone, Error)]
pub enum SyncDatabaseError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderNotFound(i64),
    #[error("No external reference exists for order {0}")]
    ExternalRefNotFound(i64),
    #[error("External order {0} has already been imported")]
    DuplicateExternalId(String),
    #[error("Queue entry {0} is no longer claimed by this worker")]
    LeaseLost(i64),
    #[error("Could not serialize {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for SyncDatabaseError {
    fn from(e: sqlx::Error) -> Self {
        SyncDatabaseError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for SyncDatabaseError {
    fn from(e: serde_json::Error) -> Self {
        SyncDatabaseError::SerializationError(e.to_string())
    }
}
