//! Response bound.

/// Marker for types a pipeline can produce.
///
/// `Clone` is required because idempotent calls and suspended reads hand one
/// settled result to every caller waiting on it. Implemented for every type
/// that satisfies the bounds.
pub trait Response: Clone + Send + Sync + 'static {}

impl<T> Response for T where T: Clone + Send + Sync + 'static {}
