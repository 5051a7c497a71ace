//! Error types for the chat components.

use aviary_client::ClientError;
use aviary_core::error::AviaryError;

use crate::state_machine::DispatchState;

/// Errors from the chat components.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("invalid dispatch transition: {0:?} -> {1:?}")]
    InvalidTransition(DispatchState, DispatchState),
    #[error("api error: {0}")]
    ApiError(#[from] ClientError),
    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<AviaryError> for ChatError {
    fn from(err: AviaryError) -> Self {
        ChatError::StorageError(err.to_string())
    }
}
