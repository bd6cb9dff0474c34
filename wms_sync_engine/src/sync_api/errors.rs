use thiserror::Error;

use crate::traits::{CarrierError, SyncDatabaseError};

#[derive(Debug, Clone, Error)]
pub enum SyncApiError {
    /// Missing credentials or other setup problems. Nothing was attempted.
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Database error: {0}")]
    Database(#[from] SyncDatabaseError),
    #[error("Carrier platform error: {0}")]
    Carrier(#[from] CarrierError),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SyncApiError {
    /// Converts a failed credential check into a configuration error.
    pub fn from_credentials(e: CarrierError) -> Self {
        SyncApiError::Configuration(e.to_string())
    }
}
