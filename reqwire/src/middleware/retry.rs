//! Bounded retry layer.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwire_core::{Context, Middleware, Next, Request, RequestError, RequestResult, Response};
use tracing::{debug, warn};

use crate::metrics;

/// Default number of retries after the first attempt.
pub const DEFAULT_RETRIES: usize = 3;

/// State of a failed attempt.
#[derive(Debug)]
pub struct RetryContext<'a> {
    /// Request as seen by the retry layer.
    pub request: &'a Request,
    /// Failure of the attempt that just finished.
    pub last_error: &'a RequestError,
    /// Zero-based number of the attempt that just failed.
    pub attempt: usize,
}

type DelayFn = Arc<dyn Fn(&RetryContext<'_>) -> Duration + Send + Sync>;
type ConditionFn = Arc<dyn Fn(&RetryContext<'_>) -> bool + Send + Sync>;

/// Pause before the next attempt.
#[derive(Clone)]
pub enum Delay {
    /// Same pause before every retry.
    Fixed(Duration),
    /// Pause computed from the failed attempt.
    Computed(DelayFn),
}

impl Delay {
    /// Builds a computed delay.
    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&RetryContext<'_>) -> Duration + Send + Sync + 'static,
    {
        Delay::Computed(Arc::new(f))
    }

    fn resolve(&self, ctx: &RetryContext<'_>) -> Duration {
        match self {
            Delay::Fixed(delay) => *delay,
            Delay::Computed(f) => f(ctx),
        }
    }
}

impl Default for Delay {
    fn default() -> Self {
        Delay::Fixed(Duration::ZERO)
    }
}

impl From<Duration> for Delay {
    fn from(delay: Duration) -> Self {
        Delay::Fixed(delay)
    }
}

impl fmt::Debug for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delay::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            Delay::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Options of the retry layer.
#[derive(Clone)]
pub struct RetryOptions {
    retries: usize,
    delay: Delay,
    condition: Option<ConditionFn>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        RetryOptions {
            retries: DEFAULT_RETRIES,
            delay: Delay::default(),
            condition: None,
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("retries", &self.retries)
            .field("delay", &self.delay)
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

impl RetryOptions {
    /// Sets how many times a failed call is retried.
    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the pause before each retry.
    pub fn delay(mut self, delay: impl Into<Delay>) -> Self {
        self.delay = delay.into();
        self
    }

    /// Sets the predicate deciding whether a failure is retried.
    ///
    /// It is never consulted for the last allowed attempt: an exhausted
    /// budget always surfaces the error.
    pub fn retry_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&RetryContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }
}

/// Re-runs the rest of the chain after a failure.
///
/// With `retries = R`, a call that keeps failing reaches the inner chain
/// `R + 1` times and resolves with the last failure. A success returns at
/// once.
#[derive(Debug, Clone)]
pub struct RetryMiddleware {
    options: RetryOptions,
}

impl RetryMiddleware {
    /// Creates the layer.
    pub fn new(options: RetryOptions) -> Self {
        RetryMiddleware { options }
    }

    /// Number of retries after the first attempt.
    pub fn retries(&self) -> usize {
        self.options.retries
    }
}

#[async_trait]
impl<Res: Response> Middleware<Res> for RetryMiddleware {
    async fn handle(&self, request: Request, ctx: Context, next: Next<Res>) -> RequestResult<Res> {
        let retries = self.options.retries;
        let mut attempt = 0;
        loop {
            let error = match next.clone().run(request.clone(), ctx.clone()).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };
            if attempt >= retries {
                if retries > 0 {
                    warn!(url = request.url(), attempts = attempt + 1, %error, "retry budget exhausted");
                }
                return Err(error);
            }
            let retry_ctx = RetryContext {
                request: &request,
                last_error: &error,
                attempt,
            };
            if let Some(condition) = &self.options.condition
                && !condition(&retry_ctx)
            {
                debug!(url = request.url(), attempt, %error, "failure not retried");
                return Err(error);
            }
            let delay = self.options.delay.resolve(&retry_ctx);
            attempt += 1;
            debug!(url = request.url(), attempt, ?delay, %error, "retrying");
            metrics::record_retry_attempt();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
