//! Bounded concurrency layer.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwire_core::{Context, Middleware, Next, Request, RequestResult, Response};

use crate::pool::{ConcurrencyPool, DEFAULT_PARALLEL_COUNT, TaskId};

type IdFn = Arc<dyn Fn(&Request) -> TaskId + Send + Sync>;

/// Options of the concurrency layer.
#[derive(Clone)]
pub struct ConcurrentOptions {
    parallel_count: usize,
    create_id: IdFn,
}

impl Default for ConcurrentOptions {
    fn default() -> Self {
        ConcurrentOptions {
            parallel_count: DEFAULT_PARALLEL_COUNT,
            create_id: Arc::new(|_: &Request| TaskId::next()),
        }
    }
}

impl fmt::Debug for ConcurrentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentOptions")
            .field("parallel_count", &self.parallel_count)
            .finish_non_exhaustive()
    }
}

impl ConcurrentOptions {
    /// Sets how many calls may run at once.
    pub fn parallel_count(mut self, parallel_count: usize) -> Self {
        self.parallel_count = parallel_count;
        self
    }

    /// Sets how queued calls are identified, e.g. for [`ConcurrencyPool::remove`].
    pub fn create_id<F, I>(mut self, create_id: F) -> Self
    where
        F: Fn(&Request) -> I + Send + Sync + 'static,
        I: Into<TaskId>,
    {
        self.create_id = Arc::new(move |request: &Request| create_id(request).into());
        self
    }
}

/// Runs the rest of the chain inside a [`ConcurrencyPool`] slot.
///
/// Placed outside a retry layer, every attempt of a call stays in one slot.
/// Placed inside it, each attempt queues again.
#[derive(Clone)]
pub struct ConcurrentMiddleware {
    create_id: IdFn,
    pool: ConcurrencyPool,
}

impl fmt::Debug for ConcurrentMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentMiddleware")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl ConcurrentMiddleware {
    /// Creates the layer with its own pool.
    pub fn new(options: ConcurrentOptions) -> Self {
        ConcurrentMiddleware {
            create_id: options.create_id,
            pool: ConcurrencyPool::new(options.parallel_count),
        }
    }

    /// Pool owned by this layer.
    pub fn pool(&self) -> &ConcurrencyPool {
        &self.pool
    }
}

#[async_trait]
impl<Res: Response> Middleware<Res> for ConcurrentMiddleware {
    async fn handle(&self, request: Request, ctx: Context, next: Next<Res>) -> RequestResult<Res> {
        let id = (self.create_id)(&request);
        self.pool.add(id, next.run(request, ctx)).await
    }
}
