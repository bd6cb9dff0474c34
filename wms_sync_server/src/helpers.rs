use log::trace;
use serde::de::DeserializeOwned;

use crate::errors::ServerError;

/// Deserializes an optional JSON request body. An empty (or all-whitespace) body yields `T::default()`.
pub fn parse_optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ServerError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        trace!("💻️ Empty request body. Using defaults.");
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))
}
