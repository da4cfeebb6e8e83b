//! Onion-style middleware contract.
//!
//! A chain is an ordered list of [`Middleware`] over one [`BaseRequestor`].
//! Running the chain threads the request and the per-call [`Context`]
//! through every layer in registration order:
//!
//! ```text
//!  request ──▶ A (before) ──▶ B (before) ──▶ base requestor
//!                                                  │
//! response ◀── A (after)  ◀── B (after)  ◀─────────┘
//! ```
//!
//! The first registered middleware is the outermost. Each layer decides
//! whether to call [`Next::run`] zero times (short-circuit), once, or
//! several times (retry). Errors returned from inner layers propagate
//! outwards like ordinary `?` propagation and may be caught, transformed or
//! suppressed by any enclosing layer.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::base::BaseRequestor;
use crate::context::Context;
use crate::error::RequestResult;
use crate::request::Request;

/// One layer of a request chain.
///
/// # Contract
///
/// - Code before `next.run(..)` executes on the way in, code after the
///   returned future resolves executes on the way out.
/// - Not running `next` short-circuits the chain; the base requestor is
///   never invoked.
/// - `next` is `Clone + 'static`: a layer may run it repeatedly or move it
///   into a future that outlives the call.
#[async_trait]
pub trait Middleware<Res>: Send + Sync + 'static {
    /// Handles one call.
    async fn handle(&self, request: Request, ctx: Context, next: Next<Res>) -> RequestResult<Res>;
}

#[async_trait]
impl<Res, T> Middleware<Res> for Arc<T>
where
    Res: Send + 'static,
    T: Middleware<Res> + ?Sized,
{
    async fn handle(&self, request: Request, ctx: Context, next: Next<Res>) -> RequestResult<Res> {
        (**self).handle(request, ctx, next).await
    }
}

/// Continuation to the rest of the chain.
///
/// Holds shared handles to the remaining middleware and the base requestor,
/// so cloning it is cheap.
pub struct Next<Res> {
    chain: Arc<[Arc<dyn Middleware<Res>>]>,
    base: Arc<dyn BaseRequestor<Res>>,
    index: usize,
}

impl<Res> Clone for Next<Res> {
    fn clone(&self) -> Self {
        Next {
            chain: Arc::clone(&self.chain),
            base: Arc::clone(&self.base),
            index: self.index,
        }
    }
}

impl<Res> std::fmt::Debug for Next<Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("remaining", &self.remaining())
            .finish()
    }
}

impl<Res> Next<Res> {
    /// Creates a continuation positioned at the outermost middleware.
    pub fn new(chain: Arc<[Arc<dyn Middleware<Res>>]>, base: Arc<dyn BaseRequestor<Res>>) -> Self {
        Next {
            chain,
            base,
            index: 0,
        }
    }

    /// Number of middleware still ahead of the base requestor.
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.index)
    }
}

impl<Res> Next<Res>
where
    Res: Send + 'static,
{
    /// Runs the rest of the chain.
    ///
    /// The returned future is lazy: neither the next middleware nor the base
    /// requestor is touched until it is polled.
    pub fn run(self, request: Request, ctx: Context) -> BoxFuture<'static, RequestResult<Res>> {
        match self.chain.get(self.index) {
            Some(middleware) => {
                let middleware = Arc::clone(middleware);
                let next = Next {
                    index: self.index + 1,
                    ..self
                };
                Box::pin(async move { middleware.handle(request, ctx, next).await })
            }
            None => {
                let base = self.base;
                Box::pin(async move { base.send(request).await })
            }
        }
    }
}

/// Middleware built from an async closure. See [`middleware_fn`].
#[derive(Clone)]
pub struct MiddlewareFn<F> {
    f: F,
}

impl<F> std::fmt::Debug for MiddlewareFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareFn")
            .field("f", &std::any::type_name::<F>())
            .finish()
    }
}

/// Adapts an async closure into a [`Middleware`].
///
/// ```
/// use reqwire_core::{middleware_fn, Context, Next, Request};
///
/// // Prefix every url before delegating.
/// let prefix = middleware_fn(|mut request: Request, ctx: Context, next: Next<String>| async move {
///     let url = format!("/api/v1{}", request.url());
///     request.set_url(url);
///     next.run(request, ctx).await
/// });
/// # let _ = prefix;
/// ```
pub fn middleware_fn<Res, F, Fut>(f: F) -> MiddlewareFn<F>
where
    F: Fn(Request, Context, Next<Res>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RequestResult<Res>> + Send,
{
    MiddlewareFn { f }
}

#[async_trait]
impl<Res, F, Fut> Middleware<Res> for MiddlewareFn<F>
where
    Res: Send + 'static,
    F: Fn(Request, Context, Next<Res>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RequestResult<Res>> + Send,
{
    async fn handle(&self, request: Request, ctx: Context, next: Next<Res>) -> RequestResult<Res> {
        (self.f)(request, ctx, next).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::base_fn;
    use crate::error::RequestError;
    use std::sync::Mutex;

    fn chain(layers: Vec<Arc<dyn Middleware<String>>>) -> Next<String> {
        let base = base_fn(|request: Request| async move { Ok(request.url().to_owned()) });
        Next::new(layers.into(), Arc::new(base))
    }

    #[tokio::test]
    async fn test_empty_chain_reaches_base() {
        let next = chain(Vec::new());
        assert_eq!(next.remaining(), 0);
        let response = next.run(Request::get("/plain"), Context::new()).await;
        assert_eq!(response.unwrap(), "/plain");
    }

    #[tokio::test]
    async fn test_layers_nest_in_registration_order() {
        let trail = Arc::new(Mutex::new(Vec::new()));
        let layer = |name: &'static str| -> Arc<dyn Middleware<String>> {
            let trail = Arc::clone(&trail);
            Arc::new(middleware_fn(move |request, ctx, next: Next<String>| {
                let trail = Arc::clone(&trail);
                async move {
                    trail.lock().unwrap().push(format!("{name} in"));
                    let response = next.run(request, ctx).await;
                    trail.lock().unwrap().push(format!("{name} out"));
                    response
                }
            }))
        };
        let next = chain(vec![layer("a"), layer("b")]);
        next.run(Request::get("/x"), Context::new()).await.unwrap();
        assert_eq!(
            *trail.lock().unwrap(),
            vec!["a in", "b in", "b out", "a out"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_base() {
        let deny: Arc<dyn Middleware<String>> = Arc::new(middleware_fn(
            |_request, _ctx, _next: Next<String>| async move {
                Err::<String, _>(RequestError::rejected("unauthorized"))
            },
        ));
        let result = chain(vec![deny]).run(Request::get("/x"), Context::new()).await;
        assert!(matches!(result, Err(RequestError::Rejected(reason)) if reason == "unauthorized"));
    }
}
