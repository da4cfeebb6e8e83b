//! Bounded concurrency pool.
//!
//! [`ConcurrencyPool`] admits at most `parallel_count` tasks at a time and
//! queues the rest in arrival order. A task moves through
//! `queued → running → settled`:
//!
//! - [`ConcurrencyPool::add`] enqueues the task and runs the drain loop.
//! - The drain loop starts queued tasks from the head of the queue while the
//!   running count is below the limit.
//! - When a running task settles its slot is released, which decrements the
//!   running count and runs the drain loop again. No polling or timer is
//!   involved.
//!
//! Identifiers are bookkeeping only: two tasks with the same id both run
//! unless one is removed with [`ConcurrencyPool::remove`] while it is still
//! queued.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwire_core::{CacheKey, RequestError, RequestResult, SmolStr};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::metrics;

/// Default number of tasks a pool runs at once.
pub const DEFAULT_PARALLEL_COUNT: usize = 4;

static TASK_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Identifier of a queued task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskId {
    /// Generated from the process-wide sequence.
    Seq(u64),
    /// Chosen by the caller.
    Named(SmolStr),
}

impl TaskId {
    /// Takes the next value of the process-wide sequence.
    pub fn next() -> Self {
        TaskId::Seq(TASK_SEQUENCE.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Seq(id) => write!(f, "{id}"),
            TaskId::Named(name) => f.write_str(name),
        }
    }
}

impl From<u64> for TaskId {
    fn from(id: u64) -> Self {
        TaskId::Seq(id)
    }
}

impl From<&str> for TaskId {
    fn from(name: &str) -> Self {
        TaskId::Named(SmolStr::new(name))
    }
}

impl From<String> for TaskId {
    fn from(name: String) -> Self {
        TaskId::Named(SmolStr::from(name))
    }
}

impl From<CacheKey> for TaskId {
    fn from(key: CacheKey) -> Self {
        TaskId::Named(key.into())
    }
}

struct Task {
    id: TaskId,
    start: oneshot::Sender<Slot>,
}

#[derive(Default)]
struct PoolState {
    queue: VecDeque<Task>,
    running: usize,
}

struct PoolInner {
    parallel_count: usize,
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Permission to run, held by a task while it is running.
///
/// Dropping the slot frees it, so a task that panics or whose caller goes
/// away still gives its slot back.
struct Slot {
    pool: Arc<PoolInner>,
    drain_on_release: bool,
}

impl Drop for Slot {
    fn drop(&mut self) {
        {
            let mut state = self.pool.lock();
            state.running = state.running.saturating_sub(1);
            metrics::record_pool_state(state.queue.len(), state.running);
        }
        if self.drain_on_release {
            drain(&self.pool);
        }
    }
}

fn drain(pool: &Arc<PoolInner>) {
    loop {
        let task = {
            let mut state = pool.lock();
            if state.running >= pool.parallel_count {
                return;
            }
            let Some(task) = state.queue.pop_front() else {
                return;
            };
            state.running += 1;
            metrics::record_pool_state(state.queue.len(), state.running);
            task
        };
        let slot = Slot {
            pool: Arc::clone(pool),
            drain_on_release: true,
        };
        match task.start.send(slot) {
            Ok(()) => trace!(id = %task.id, "pool task started"),
            Err(mut slot) => {
                // The waiter is gone; hand the slot straight back and keep
                // draining from this loop.
                trace!(id = %task.id, "pool task abandoned before start");
                slot.drain_on_release = false;
                drop(slot);
            }
        }
    }
}

/// Bounded task scheduler with FIFO admission.
///
/// Cloning the pool yields another handle to the same queue.
///
/// # Example
///
/// ```
/// use reqwire::pool::ConcurrencyPool;
/// use reqwire_core::RequestError;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = ConcurrencyPool::new(2);
/// let answer = pool.add(1u64, async { Ok::<_, RequestError>(42) }).await;
/// assert_eq!(answer.unwrap(), 42);
/// assert_eq!(pool.running(), 0);
/// # }
/// ```
#[derive(Clone)]
pub struct ConcurrencyPool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for ConcurrencyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("ConcurrencyPool")
            .field("parallel_count", &self.inner.parallel_count)
            .field("running", &state.running)
            .field("queued", &state.queue.len())
            .finish()
    }
}

impl Default for ConcurrencyPool {
    fn default() -> Self {
        Self::new(DEFAULT_PARALLEL_COUNT)
    }
}

impl ConcurrencyPool {
    /// Creates a pool running at most `parallel_count` tasks at once.
    ///
    /// A limit of zero is raised to one.
    pub fn new(parallel_count: usize) -> Self {
        ConcurrencyPool {
            inner: Arc::new(PoolInner {
                parallel_count: parallel_count.max(1),
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    /// Maximum number of running tasks.
    pub fn parallel_count(&self) -> usize {
        self.inner.parallel_count
    }

    /// Number of tasks currently running.
    pub fn running(&self) -> usize {
        self.inner.lock().running
    }

    /// Number of tasks waiting for a slot.
    pub fn queued(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Queues `work` under `id` and resolves once it has run.
    ///
    /// `work` is not polled before the task gets a slot. If the task is
    /// removed while queued the call resolves with
    /// [`RequestError::Cancelled`].
    pub async fn add<T, F>(&self, id: impl Into<TaskId>, work: F) -> RequestResult<T>
    where
        F: Future<Output = RequestResult<T>>,
    {
        let id = id.into();
        let (start, started) = oneshot::channel();
        {
            let mut state = self.inner.lock();
            state.queue.push_back(Task {
                id: id.clone(),
                start,
            });
            debug!(%id, queued = state.queue.len(), running = state.running, "pool task queued");
            metrics::record_pool_state(state.queue.len(), state.running);
        }
        drain(&self.inner);

        let slot = started
            .await
            .map_err(|_| RequestError::Cancelled(SmolStr::new(id.to_string())))?;
        let result = work.await;
        drop(slot);
        result
    }

    /// Removes every queued, not yet started task registered under `id`.
    ///
    /// Running tasks are unaffected. Returns the number of removed tasks.
    pub fn remove(&self, id: &TaskId) -> usize {
        let removed: Vec<Task> = {
            let mut state = self.inner.lock();
            let (removed, kept): (Vec<Task>, Vec<Task>) = std::mem::take(&mut state.queue)
                .into_iter()
                .partition(|task| &task.id == id);
            state.queue = kept.into();
            metrics::record_pool_state(state.queue.len(), state.running);
            removed
        };
        if !removed.is_empty() {
            debug!(%id, count = removed.len(), "removed queued pool tasks");
        }
        removed.len()
    }
}
