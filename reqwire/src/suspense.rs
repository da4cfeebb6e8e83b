//! Synchronous read results.
//!
//! A synchronous read either has its value at hand or it does not. Instead
//! of signalling the second case out of band, the read returns a
//! [`Suspense`] the caller matches on:
//!
//! ```
//! use reqwire::suspense::Suspense;
//!
//! fn render(user: Suspense<String>) -> String {
//!     match user {
//!         Suspense::Ready(name) => format!("hello {name}"),
//!         Suspense::Suspended(_) | Suspense::Deferred(_) => "loading".to_owned(),
//!     }
//! }
//! # assert_eq!(render(Suspense::Ready("ann".to_owned())), "hello ann");
//! ```
//!
//! [`Suspense::into_result`] turns the pending variants into an `Err`, so a
//! render function can bail out with `?` and be invoked again later. The
//! call behind a miss is already running, so the caller may drop the
//! [`Pending`] handle and simply render again:
//!
//! ```
//! use std::time::Duration;
//!
//! use reqwire::middleware::{sync, SyncOptions};
//! use reqwire::{Pending, Requestor, SyncRequestor};
//! use reqwire_core::{base_fn, Request, RequestError};
//!
//! fn render(api: &SyncRequestor<String>) -> Result<String, Pending<String>> {
//!     let name = api.get("/me").into_result()?;
//!     Ok(format!("hello {name}"))
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let base = base_fn(|_request: Request| async { Ok::<_, RequestError>("ann".to_owned()) });
//! let api = Requestor::builder(base).sync(sync(SyncOptions::default()));
//!
//! assert!(render(&api).is_err());
//! tokio::time::sleep(Duration::from_millis(10)).await;
//! assert_eq!(render(&api).unwrap(), "hello ann");
//! # }
//! ```

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::{self, BoxFuture, Either, Shared};
use pin_project::pin_project;
use reqwire_core::{RequestResult, Response};

use crate::dispatch::spawn_call;

/// Clonable handle to a call that has not produced its value yet.
///
/// The call is already running on the Tokio runtime; dropping every handle
/// does not stop it. Every clone resolves to the same result.
#[pin_project]
pub struct Pending<Res> {
    #[pin]
    inner: Shared<BoxFuture<'static, RequestResult<Res>>>,
}

impl<Res: Response> Pending<Res> {
    /// Starts `call` and returns the first handle to it.
    pub(crate) fn spawn(call: BoxFuture<'static, RequestResult<Res>>) -> Self {
        Pending {
            inner: spawn_call(call).shared(),
        }
    }

    /// Returns `true` once the call has settled.
    pub fn is_settled(&self) -> bool {
        self.inner.peek().is_some()
    }

    /// Returns `true` if both handles belong to the same call.
    pub fn ptr_eq(&self, other: &Pending<Res>) -> bool {
        Shared::ptr_eq(&self.inner, &other.inner)
    }
}

impl<Res> Clone for Pending<Res> {
    fn clone(&self) -> Self {
        Pending {
            inner: self.inner.clone(),
        }
    }
}

impl<Res> fmt::Debug for Pending<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}

impl<Res: Response> Future for Pending<Res> {
    type Output = RequestResult<Res>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project().inner.poll(cx)
    }
}

/// Outcome of a synchronous read.
pub enum Suspense<Res> {
    /// The value was available without waiting.
    Ready(Res),
    /// The value is on its way and the caller is expected to retry the read
    /// after awaiting the handle.
    Suspended(Pending<Res>),
    /// The value is on its way and the caller is expected to await the
    /// handle directly.
    Deferred(Pending<Res>),
}

impl<Res> fmt::Debug for Suspense<Res>
where
    Res: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suspense::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Suspense::Suspended(pending) => f.debug_tuple("Suspended").field(pending).finish(),
            Suspense::Deferred(pending) => f.debug_tuple("Deferred").field(pending).finish(),
        }
    }
}

impl<Res> Suspense<Res> {
    /// Returns `true` for [`Suspense::Ready`].
    pub fn is_ready(&self) -> bool {
        matches!(self, Suspense::Ready(_))
    }

    /// Returns the value, or the pending handle as the error.
    pub fn into_result(self) -> Result<Res, Pending<Res>> {
        match self {
            Suspense::Ready(value) => Ok(value),
            Suspense::Suspended(pending) | Suspense::Deferred(pending) => Err(pending),
        }
    }

    /// Returns the value if it was available.
    pub fn ready(self) -> Option<Res> {
        self.into_result().ok()
    }

    /// Returns the pending handle, if any.
    pub fn pending(&self) -> Option<&Pending<Res>> {
        match self {
            Suspense::Ready(_) => None,
            Suspense::Suspended(pending) | Suspense::Deferred(pending) => Some(pending),
        }
    }
}

impl<Res: Response> IntoFuture for Suspense<Res> {
    type Output = RequestResult<Res>;
    type IntoFuture = Either<future::Ready<RequestResult<Res>>, Pending<Res>>;

    fn into_future(self) -> Self::IntoFuture {
        match self.into_result() {
            Ok(value) => Either::Left(future::ready(Ok(value))),
            Err(pending) => Either::Right(pending),
        }
    }
}
