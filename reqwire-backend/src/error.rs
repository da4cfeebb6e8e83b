//! Error types for store operations.

use reqwire_core::RequestError;
use thiserror::Error;

/// Error type for store operations.
///
/// This enum categorizes errors that can occur while talking to a cache
/// store into distinct groups for appropriate handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Internal store error, state or computation error.
    ///
    /// Any error not related to I/O with an external store.
    #[error(transparent)]
    InternalError(Box<dyn std::error::Error + Send + Sync>),

    /// Interaction error with an external store.
    #[error(transparent)]
    ConnectionError(Box<dyn std::error::Error + Send + Sync>),

    /// The store does not support the requested operation.
    #[error("store does not support `{0}`")]
    Unsupported(&'static str),

    /// Serialization or deserialization error.
    #[error(transparent)]
    FormatError(#[from] serde_json::Error),
}

/// Result type of store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for RequestError {
    fn from(error: StoreError) -> Self {
        RequestError::store(error)
    }
}
