//! Counting base requestor for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwire_core::{BaseRequestor, Request, RequestError, RequestResult};

/// Failure returned by [`MockBase`]; carries the zero-based call number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("mock failure on call {call}")]
pub struct MockError {
    pub call: usize,
}

#[derive(Default)]
struct State {
    calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
    requests: Mutex<Vec<Request>>,
}

/// Base requestor that answers `"<method> <url> #<n>"`, where `n` counts
/// calls from 1.
///
/// It can sleep before answering and fail its first calls. Clones share
/// their counters.
#[derive(Clone, Default)]
pub struct MockBase {
    state: Arc<State>,
    delay: Duration,
    fail_first: usize,
}

impl MockBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `delay` inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fails the first `count` calls.
    pub fn failing_first(mut self, count: usize) -> Self {
        self.fail_first = count;
        self
    }

    /// Fails every call.
    pub fn always_failing(self) -> Self {
        self.failing_first(usize::MAX)
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at once.
    pub fn max_running(&self) -> usize {
        self.state.max_running.load(Ordering::SeqCst)
    }

    /// Requests as received, in call order.
    pub fn requests(&self) -> Vec<Request> {
        self.state.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseRequestor<String> for MockBase {
    async fn send(&self, request: Request) -> RequestResult<String> {
        let call = self.state.calls.fetch_add(1, Ordering::SeqCst);
        self.state.requests.lock().unwrap().push(request.clone());

        let running = self.state.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_running.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.state.running.fetch_sub(1, Ordering::SeqCst);

        if call < self.fail_first {
            return Err(RequestError::transport(MockError { call }));
        }
        Ok(format!("{} {} #{}", request.method(), request.url(), call + 1))
    }
}
