//! Error types for the history components.

use aviary_client::ClientError;
use aviary_core::error::AviaryError;

/// Errors from the history components.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("storage error: {0}")]
    StorageError(String),
    #[error("api error: {0}")]
    ApiError(#[from] ClientError),
}

impl From<AviaryError> for HistoryError {
    fn from(err: AviaryError) -> Self {
        HistoryError::StorageError(err.to_string())
    }
}
