use thiserror::Error;

/// Top-level error type for the Aviary system.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for AviaryError` (or the reverse) so that the `?`
/// operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AviaryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for AviaryError {
    fn from(err: toml::de::Error) -> Self {
        AviaryError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AviaryError {
    fn from(err: toml::ser::Error) -> Self {
        AviaryError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AviaryError {
    fn from(err: serde_json::Error) -> Self {
        AviaryError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Aviary operations.
pub type Result<T> = std::result::Result<T, AviaryError>;
