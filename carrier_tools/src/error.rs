use thiserror::Error;

#[derive(Debug, Error)]
pub enum CarrierApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Carrier API credentials are not configured")]
    MissingCredentials,
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("The request timed out: {0}")]
    Timeout(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Invalid decimal amount: {0}")]
    InvalidAmount(String),
}

impl CarrierApiError {
    /// The HTTP status code returned by the platform, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::QueryError { status, .. } => Some(*status),
            _ => None,
        }
    }
}
