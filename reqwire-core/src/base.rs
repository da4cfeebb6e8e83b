//! Base requestor contract.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RequestResult;
use crate::request::Request;

/// The transport at the bottom of every middleware chain.
///
/// This trait is transport-agnostic: an HTTP client, an RPC stub or an
/// in-process mock all qualify. It receives the request as rewritten by the
/// innermost middleware.
///
/// # Examples
///
/// ```rust,ignore
/// use reqwire_core::{BaseRequestor, Request, RequestResult};
///
/// struct Echo;
///
/// #[async_trait::async_trait]
/// impl BaseRequestor<String> for Echo {
///     async fn send(&self, request: Request) -> RequestResult<String> {
///         Ok(request.url().to_owned())
///     }
/// }
/// ```
#[async_trait]
pub trait BaseRequestor<Res>: Send + Sync + 'static {
    /// Sends the request and resolves to its response.
    async fn send(&self, request: Request) -> RequestResult<Res>;
}

#[async_trait]
impl<Res, T> BaseRequestor<Res> for Arc<T>
where
    T: BaseRequestor<Res> + ?Sized,
{
    async fn send(&self, request: Request) -> RequestResult<Res> {
        (**self).send(request).await
    }
}

/// Base requestor built from an async closure. See [`base_fn`].
#[derive(Clone)]
pub struct BaseFn<F> {
    f: F,
}

impl<F> std::fmt::Debug for BaseFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseFn")
            .field("f", &std::any::type_name::<F>())
            .finish()
    }
}

/// Adapts an async closure into a [`BaseRequestor`].
///
/// ```
/// use reqwire_core::{base_fn, BaseRequestor, Request, RequestError};
///
/// # #[tokio::main]
/// # async fn main() {
/// let base = base_fn(|request: Request| async move {
///     Ok::<_, RequestError>(request.url().len())
/// });
/// let len: usize = base.send(Request::get("/abc")).await.unwrap();
/// assert_eq!(len, 4);
/// # }
/// ```
pub fn base_fn<Res, F, Fut>(f: F) -> BaseFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RequestResult<Res>> + Send,
{
    BaseFn { f }
}

#[async_trait]
impl<Res, F, Fut> BaseRequestor<Res> for BaseFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RequestResult<Res>> + Send,
{
    async fn send(&self, request: Request) -> RequestResult<Res> {
        (self.f)(request).await
    }
}
