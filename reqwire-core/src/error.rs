//! Error types for pipeline calls.

use std::error::Error as StdError;
use std::sync::Arc;

use smol_str::SmolStr;
use thiserror::Error;

/// Shared, thread-safe error source.
pub type BoxError = Arc<dyn StdError + Send + Sync>;

/// Error type of a pipeline call.
///
/// The enum is `Clone` because one in-flight result may be observed by
/// several callers at once (idempotent calls, suspended reads).
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// Failure raised by the base requestor.
    ///
    /// Opaque to the pipeline and propagated verbatim unless a middleware
    /// intercepts it.
    #[error(transparent)]
    Transport(BoxError),

    /// Failure raised by a cache store.
    #[error("cache store error: {0}")]
    Store(BoxError),

    /// The call was queued in a concurrency pool and removed before it
    /// started.
    #[error("queued task `{0}` was removed before it started")]
    Cancelled(SmolStr),

    /// A middleware deliberately short-circuited the chain.
    #[error("request rejected: {0}")]
    Rejected(SmolStr),
}

impl RequestError {
    /// Wraps any error as a transport failure.
    pub fn transport<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        RequestError::Transport(Arc::new(error))
    }

    /// Wraps any error as a store failure.
    pub fn store<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        RequestError::Store(Arc::new(error))
    }

    /// Creates a rejection with the given reason.
    pub fn rejected(reason: impl Into<SmolStr>) -> Self {
        RequestError::Rejected(reason.into())
    }

    /// Returns `true` for errors raised by the base requestor.
    pub fn is_transport(&self) -> bool {
        matches!(self, RequestError::Transport(_))
    }

    /// Returns the transport error downcast to `E`, if it is one.
    pub fn transport_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        match self {
            RequestError::Transport(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Result type of a pipeline call.
pub type RequestResult<T> = Result<T, RequestError>;
