//! Requestor surface.
//!
//! A [`Requestor`] exposes the fixed method set `get`, `post`, `put`,
//! `delete` and `request`. Every method builds a [`Request`] and hands it to
//! one dispatch path, which runs the middleware chain with a fresh
//! [`Context`] inside a `request` tracing span.
//!
//! ```
//! use reqwire::middleware::{cache, CacheOptions};
//! use reqwire::Requestor;
//! use reqwire_core::{base_fn, Request, RequestError};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let base = base_fn(|request: Request| async move {
//!     Ok::<_, RequestError>(format!("body of {}", request.url()))
//! });
//! let api = Requestor::builder(base)
//!     .with(cache(CacheOptions::default()))
//!     .build();
//!
//! assert_eq!(api.get("/users").await.unwrap(), "body of /users");
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use reqwire_core::{BaseRequestor, Context, Middleware, Request, RequestResult, Response};
use serde_json::Value;
use tracing::debug_span;

use crate::dispatch::Pipeline;
use crate::error::RegistryError;
use crate::middleware::SyncMiddleware;
use crate::registry::Registry;
use crate::suspense::Suspense;

/// Collects layers around a base requestor.
pub struct RequestorBuilder<Res> {
    base: Arc<dyn BaseRequestor<Res>>,
    chain: Vec<Arc<dyn Middleware<Res>>>,
}

impl<Res> fmt::Debug for RequestorBuilder<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestorBuilder")
            .field("layers", &self.chain.len())
            .finish_non_exhaustive()
    }
}

impl<Res: Response> RequestorBuilder<Res> {
    /// Starts a builder over `base`.
    pub fn new(base: impl BaseRequestor<Res>) -> Self {
        Self::from_shared(Arc::new(base))
    }

    /// Starts a builder over an already shared base requestor.
    pub fn from_shared(base: Arc<dyn BaseRequestor<Res>>) -> Self {
        RequestorBuilder {
            base,
            chain: Vec::new(),
        }
    }

    /// Starts a builder over the base requestor registered under `key`.
    pub fn from_registry(registry: &Registry<Res>, key: &str) -> Result<Self, RegistryError> {
        registry.resolve(key).map(Self::from_shared)
    }

    /// Appends a layer. The first appended layer is the outermost.
    ///
    /// Pass an `Arc` to keep a handle on the layer's state.
    pub fn with(mut self, middleware: impl Middleware<Res>) -> Self {
        self.chain.push(Arc::new(middleware));
        self
    }

    /// Appends a layer that is already shared.
    pub fn with_shared(mut self, middleware: Arc<dyn Middleware<Res>>) -> Self {
        self.chain.push(middleware);
        self
    }

    /// Freezes the chain.
    pub fn build(self) -> Requestor<Res> {
        Requestor {
            pipeline: Pipeline::new(self.chain, self.base),
        }
    }

    /// Freezes the chain under a synchronous read-through layer.
    pub fn sync(self, layer: impl Into<Arc<SyncMiddleware<Res>>>) -> SyncRequestor<Res> {
        SyncRequestor {
            layer: layer.into(),
            pipeline: Pipeline::new(self.chain, self.base),
        }
    }
}

/// Async requestor over a middleware chain.
///
/// Cloning is cheap; clones share every layer.
pub struct Requestor<Res> {
    pipeline: Pipeline<Res>,
}

impl<Res> Clone for Requestor<Res> {
    fn clone(&self) -> Self {
        Requestor {
            pipeline: self.pipeline.clone(),
        }
    }
}

impl<Res> fmt::Debug for Requestor<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requestor")
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl<Res: Response> Requestor<Res> {
    /// Starts a builder over `base`.
    pub fn builder(base: impl BaseRequestor<Res>) -> RequestorBuilder<Res> {
        RequestorBuilder::new(base)
    }

    /// Sends a `get` request.
    pub async fn get(&self, url: impl Into<String>) -> RequestResult<Res> {
        self.request(Request::get(url)).await
    }

    /// Sends a `post` request with a body.
    pub async fn post(&self, url: impl Into<String>, data: Value) -> RequestResult<Res> {
        self.request(Request::post(url, data)).await
    }

    /// Sends a `put` request with a body.
    pub async fn put(&self, url: impl Into<String>, data: Value) -> RequestResult<Res> {
        self.request(Request::put(url, data)).await
    }

    /// Sends a `delete` request.
    pub async fn delete(&self, url: impl Into<String>) -> RequestResult<Res> {
        self.request(Request::delete(url)).await
    }

    /// Sends an arbitrary request.
    pub async fn request(&self, request: Request) -> RequestResult<Res> {
        self.pipeline.dispatch(request).await
    }

    /// The frozen chain.
    pub fn pipeline(&self) -> &Pipeline<Res> {
        &self.pipeline
    }
}

/// Requestor answering synchronously through a [`SyncMiddleware`].
///
/// Reads never block, but a miss starts its call on the Tokio runtime, so
/// they must happen inside one.
pub struct SyncRequestor<Res> {
    layer: Arc<SyncMiddleware<Res>>,
    pipeline: Pipeline<Res>,
}

impl<Res> Clone for SyncRequestor<Res> {
    fn clone(&self) -> Self {
        SyncRequestor {
            layer: Arc::clone(&self.layer),
            pipeline: self.pipeline.clone(),
        }
    }
}

impl<Res> fmt::Debug for SyncRequestor<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncRequestor")
            .field("layer", &self.layer)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl<Res: Response> SyncRequestor<Res> {
    /// Reads with `get`.
    pub fn get(&self, url: impl Into<String>) -> Suspense<Res> {
        self.request(Request::get(url))
    }

    /// Reads with `post` and a body.
    pub fn post(&self, url: impl Into<String>, data: Value) -> Suspense<Res> {
        self.request(Request::post(url, data))
    }

    /// Reads with `put` and a body.
    pub fn put(&self, url: impl Into<String>, data: Value) -> Suspense<Res> {
        self.request(Request::put(url, data))
    }

    /// Reads with `delete`.
    pub fn delete(&self, url: impl Into<String>) -> Suspense<Res> {
        self.request(Request::delete(url))
    }

    /// Reads with an arbitrary request.
    pub fn request(&self, request: Request) -> Suspense<Res> {
        let span = debug_span!("request", method = %request.method(), url = request.url(), sync = true);
        let _entered = span.enter();
        self.layer.handle(request, Context::new(), self.pipeline.next())
    }

    /// The sync layer in front of the chain.
    pub fn layer(&self) -> &SyncMiddleware<Res> {
        &self.layer
    }
}
