use thiserror::Error;

use aviary_core::error::AviaryError;

/// Failures talking to the Aviary service.
///
/// Every variant is a network failure from the caller's point of view:
/// callers log it and fall back to a non-blocking state.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status of the failed response, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            ClientError::Decode(_) => None,
        }
    }
}

impl From<ClientError> for AviaryError {
    fn from(err: ClientError) -> Self {
        AviaryError::Network(err.to_string())
    }
}
