#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! # reqwire
//!
//! Composable request pipeline. Wrap any transport in independent layers
//! (caching, retry, call deduplication, bounded concurrency and synchronous
//! read-through) without the layers knowing about each other.
//!
//! ```
//! use std::time::Duration;
//!
//! use reqwire::prelude::*;
//! use reqwire_core::{base_fn, Request, RequestError};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let base = base_fn(|request: Request| async move {
//!     Ok::<_, RequestError>(format!("{} {}", request.method(), request.url()))
//! });
//!
//! let api = Requestor::builder(base)
//!     .with(idempotent(IdempotentOptions::default()))
//!     .with(cache(CacheOptions::default().duration(Duration::from_secs(60))))
//!     .with(concurrent(ConcurrentOptions::default().parallel_count(4)))
//!     .with(retry(RetryOptions::default().retries(2)))
//!     .build();
//!
//! assert_eq!(api.get("/users").await.unwrap(), "get /users");
//! # }
//! ```
//!
//! Layers run in the order they were added: the first one is the outermost,
//! so its code before `next` runs first and its code after `next` runs last.

/// Chain composition.
///
/// [`Pipeline`] freezes a list of middleware over a base requestor and runs
/// calls through it, each with a fresh [`Context`](reqwire_core::Context).
pub mod dispatch;

/// Error types for requestor assembly.
pub mod error;

/// Built-in layers: `cache`, `idempotent`, `retry`, `concurrent` and `sync`.
pub mod middleware;

/// Metrics collection.
///
/// When the `metrics` feature is enabled, the built-in layers record
/// cache hits and misses, joined in-flight calls, retry attempts and pool
/// occupancy through the `metrics` facade.
pub mod metrics;

/// Bounded FIFO task scheduler used by the concurrency layer.
pub mod pool;

/// In-flight call registry used by the idempotency layer.
pub mod promise;

/// Named base requestors.
pub mod registry;

/// Requestor surface: [`Requestor`], [`RequestorBuilder`] and
/// [`SyncRequestor`].
pub mod requestor;

/// Synchronous read results.
pub mod suspense;

/// Declarative configuration of the built-in layers.
pub mod config;

/// Ready-made layer stacks.
pub mod combinations;

pub use combinations::{
    CachedIdempotentOptions, ConcurrentRetryOptions, cached_idempotent, concurrent_retry,
};
pub use config::PipelineConfig;
pub use dispatch::{Pipeline, compose};
pub use error::{ConfigError, RegistryError};
pub use registry::{DEFAULT_KEY, Registry};
pub use requestor::{Requestor, RequestorBuilder, SyncRequestor};
pub use suspense::{Pending, Suspense};

pub use reqwire_core::{
    BaseRequestor, CacheKey, Context, Method, Middleware, Next, Request, RequestError,
    RequestResult, Response, base_fn, middleware_fn,
};

/// The commonly used items in one import.
pub mod prelude {
    pub use crate::middleware::{
        CacheOptions, ConcurrentOptions, Delay, IdempotentOptions, RetryOptions, SyncOptions,
        Ttl, cache, concurrent, idempotent, retry, sync,
    };
    pub use crate::{Pending, Registry, Requestor, RequestorBuilder, Suspense, SyncRequestor};
    pub use reqwire_core::{Context, Middleware, Next, Request, RequestError, RequestResult};
}
