//! Per-task completion signalling between a worker and the submitter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::{Task, TaskId};

/// One-shot slot with exactly one producer (the worker) and one consumer
/// (the submitter).
///
/// Waiters re-check the slot in a loop around the `Condvar`, so spurious
/// wakeups and a completion that lands before the wait starts are both
/// harmless.
pub(crate) struct CompletionSignal<T> {
    slot: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> CompletionSignal<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Store the value and wake the waiter.
    pub(crate) fn complete(&self, value: T) {
        let mut slot = self.slot.lock();
        *slot = Some(value);
        drop(slot);
        self.ready.notify_all();
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Block until the value is available.
    pub(crate) fn wait(&self) -> T {
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.take() {
                return value;
            }
            self.ready.wait(&mut slot);
        }
    }

    /// Block until the value is available or the timeout elapses.
    pub(crate) fn wait_for(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.take() {
                return Some(value);
            }
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                return slot.take();
            }
        }
    }
}

/// The worker-side half of an admitted task.
pub(crate) struct Submission<P, R> {
    pub(crate) task: Task<P, R>,
    signal: Arc<CompletionSignal<Task<P, R>>>,
}

impl<P, R> Submission<P, R> {
    /// Pair a task with a fresh completion signal.
    pub(crate) fn new(task: Task<P, R>) -> (Self, TaskHandle<P, R>) {
        let signal = Arc::new(CompletionSignal::new());
        let handle = TaskHandle {
            id: task.id(),
            signal: Arc::clone(&signal),
        };
        (Self { task, signal }, handle)
    }

    /// Hand the task back to the submitter. Harmless if nobody is waiting.
    pub(crate) fn complete(self) {
        self.signal.complete(self.task);
    }
}

/// The submitter's handle on an admitted task.
///
/// Dropping the handle does not cancel the task: a worker still processes it
/// and the result is discarded.
pub struct TaskHandle<P, R> {
    id: TaskId,
    signal: Arc<CompletionSignal<Task<P, R>>>,
}

impl<P, R> TaskHandle<P, R> {
    /// Identifier of the task this handle waits on.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Whether the worker has already signalled completion.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.signal.is_complete()
    }

    /// Block the calling thread until the task completes.
    #[must_use]
    pub fn wait(self) -> Task<P, R> {
        self.signal.wait()
    }

    /// Block for at most `timeout`.
    ///
    /// # Errors
    ///
    /// Gives the handle back if the task has not completed in time; the task
    /// keeps running and can be waited on again.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Task<P, R>, Self> {
        match self.signal.wait_for(timeout) {
            Some(task) => Ok(task),
            None => Err(self),
        }
    }
}

#[cfg(feature = "tokio-runtime")]
impl<P, R> TaskHandle<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Wait for completion from an async context.
    ///
    /// The blocking wait is moved onto tokio's blocking thread pool so the
    /// async runtime is never stalled by inference latency.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::Internal` if the blocking waiter could not be
    /// joined.
    pub async fn wait_async(self) -> Result<Task<P, R>, crate::core::ExecutorError> {
        let signal = self.signal;
        tokio::task::spawn_blocking(move || signal.wait())
            .await
            .map_err(|e| crate::core::ExecutorError::Internal(e.to_string()))
    }
}

impl<P, R> std::fmt::Debug for TaskHandle<P, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("complete", &self.is_complete())
            .finish()
    }
}
