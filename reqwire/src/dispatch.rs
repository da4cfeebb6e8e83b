//! Chain composition.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwire_core::{
    BaseRequestor, Context, Middleware, Next, Request, RequestError, RequestResult, Response,
};
use tracing::{Instrument, debug_span};

/// Runs `request` through `chain` and then `base`, first layer outermost.
///
/// The returned future is lazy.
pub fn compose<Res: Response>(
    request: Request,
    ctx: Context,
    chain: Arc<[Arc<dyn Middleware<Res>>]>,
    base: Arc<dyn BaseRequestor<Res>>,
) -> BoxFuture<'static, RequestResult<Res>> {
    Next::new(chain, base).run(request, ctx)
}

/// Starts `call` on the Tokio runtime right away and returns a handle to its
/// result.
///
/// The call runs to completion even if the handle is dropped. A panic inside
/// the call resumes in whoever awaits the handle.
pub(crate) fn spawn_call<Res: Response>(
    call: BoxFuture<'static, RequestResult<Res>>,
) -> BoxFuture<'static, RequestResult<Res>> {
    let handle = tokio::spawn(call.in_current_span());
    async move {
        match handle.await {
            Ok(result) => result,
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            Err(error) => Err(RequestError::transport(error)),
        }
    }
    .boxed()
}

/// Frozen middleware chain over one base requestor.
///
/// Cloning is cheap and clones share the middleware instances, and with
/// them their stores, registries and pools.
pub struct Pipeline<Res> {
    chain: Arc<[Arc<dyn Middleware<Res>>]>,
    base: Arc<dyn BaseRequestor<Res>>,
}

impl<Res> Clone for Pipeline<Res> {
    fn clone(&self) -> Self {
        Pipeline {
            chain: Arc::clone(&self.chain),
            base: Arc::clone(&self.base),
        }
    }
}

impl<Res> fmt::Debug for Pipeline<Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("layers", &self.chain.len())
            .finish_non_exhaustive()
    }
}

impl<Res: Response> Pipeline<Res> {
    /// Freezes `chain` over `base`.
    pub fn new(chain: Vec<Arc<dyn Middleware<Res>>>, base: Arc<dyn BaseRequestor<Res>>) -> Self {
        Pipeline {
            chain: chain.into(),
            base,
        }
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Returns `true` if requests go straight to the base requestor.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Continuation positioned at the outermost layer.
    pub fn next(&self) -> Next<Res> {
        Next::new(Arc::clone(&self.chain), Arc::clone(&self.base))
    }

    /// Runs one call with a fresh [`Context`].
    pub fn dispatch(&self, request: Request) -> BoxFuture<'static, RequestResult<Res>> {
        let span = debug_span!("request", method = %request.method(), url = request.url());
        let call = compose(
            request,
            Context::new(),
            Arc::clone(&self.chain),
            Arc::clone(&self.base),
        );
        Box::pin(call.instrument(span))
    }
}
