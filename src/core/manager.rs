//! Executor manager: the single entry point to the admission gate, the
//! scheduling queue and the worker pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::core::admission::{AdmissionGate, Rejected};
use crate::core::completion::Submission;
use crate::core::worker_pool::{PoolCounters, PoolStats, WorkerPool};
use crate::core::{ExecutorError, Predictor, Task, TaskError, TaskHandle};

/// Bounded, resizable executor for prediction tasks.
///
/// `capacity_limit` is both the number of worker threads and the ceiling on
/// running plus queued tasks. It can be changed at runtime with
/// [`scale_up`](Self::scale_up) and [`scale_down`](Self::scale_down).
///
/// # Example
///
/// ```rust,ignore
/// use inference_executor::config::ExecutorConfig;
/// use inference_executor::core::{ExecutorManager, Task};
///
/// let manager = ExecutorManager::new(ExecutorConfig::new().with_task_number_limit(4), predictor)?;
/// let handle = manager.submit(Task::new("book a table for two".to_string()))?;
/// let task = handle.wait();
/// println!("{:?}", task.result());
/// ```
pub struct ExecutorManager<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: Predictor<P, R>,
{
    config: ExecutorConfig,
    gate: Arc<AdmissionGate<Submission<P, R>>>,
    pool: WorkerPool<P, R, E>,
    counters: Arc<PoolCounters>,
    shutdown: AtomicBool,
}

impl<P, R, E> ExecutorManager<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: Predictor<P, R>,
{
    /// Validate the configuration and start `task_number_limit` workers.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::InvalidConfig` for an invalid configuration
    /// and `ExecutorError::WorkerSpawn` if a worker thread cannot be started.
    pub fn new(config: ExecutorConfig, predictor: E) -> Result<Self, ExecutorError> {
        config.validate().map_err(ExecutorError::InvalidConfig)?;

        let gate = Arc::new(AdmissionGate::new(
            config.task_number_limit,
            config.queue_order,
        ));
        let counters = Arc::new(PoolCounters::default());
        let pool = WorkerPool::new(&config, Arc::clone(&gate), Arc::clone(&counters), predictor);

        let manager = Self {
            config,
            gate,
            pool,
            counters,
            shutdown: AtomicBool::new(false),
        };

        for _ in 0..manager.config.task_number_limit {
            manager
                .pool
                .spawn_worker()
                .map_err(|e| ExecutorError::WorkerSpawn(e.to_string()))?;
        }

        info!(
            task_number_limit = manager.config.task_number_limit,
            queue_order = ?manager.config.queue_order,
            "Executor started"
        );
        Ok(manager)
    }

    /// Admit and enqueue a task, returning the handle to wait on.
    ///
    /// The capacity check and the enqueue are atomic. The lock wait and the
    /// enqueue timestamp are recorded on the task inside that critical
    /// section.
    ///
    /// # Errors
    ///
    /// - `ExecutorError::Overloaded` if running plus queued tasks already
    ///   reach the capacity limit; the task is dropped and the caller should
    ///   answer with a retriable overload response.
    /// - `ExecutorError::Shutdown` after [`shutdown`](Self::shutdown).
    pub fn submit(&self, task: Task<P, R>) -> Result<TaskHandle<P, R>, ExecutorError> {
        let arrival = task.arrival_micros();
        let task_id = task.id();
        let (submission, handle) = Submission::new(task);

        match self.gate.try_admit(submission, arrival, |submission, lock_time| {
            submission.task.metrics_mut().mark_enqueued(lock_time);
        }) {
            Ok(queue_depth) => {
                self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
                self.pool.notify_ready();
                debug!(task_id = %task_id, queue_depth = queue_depth, "Task admitted");
                Ok(handle)
            }
            Err(Rejected { reason, .. }) => {
                if matches!(reason, ExecutorError::Overloaded { .. }) {
                    self.counters.rejected_tasks.fetch_add(1, Ordering::Relaxed);
                }
                warn!(task_id = %task_id, reason = %reason, "Task rejected");
                Err(reason)
            }
        }
    }

    /// `capacity_limit - capacity_deficit - (active + queued)`.
    ///
    /// Advisory only: a later [`submit`](Self::submit) may still be rejected
    /// if another caller wins the race. Negative after a scale-down that left
    /// more work in flight than the new limit.
    #[must_use]
    pub fn remaining_capacity(&self) -> isize {
        self.gate.capacity_remaining()
    }

    /// Raise the capacity limit by one and start one more worker.
    ///
    /// The new capacity is visible to admission before the worker thread is
    /// scheduled. If earlier scale-downs went past zero, this pays back one
    /// unit of that deficit instead: the limit is unchanged and the new
    /// worker consumes a leftover stop token. Returns the new limit.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::WorkerSpawn` (with the limit restored) if the
    /// thread cannot be started, or `ExecutorError::Shutdown`.
    pub fn scale_up(&self) -> Result<usize, ExecutorError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(ExecutorError::Shutdown);
        }
        let limit = self.gate.grow();
        match self.pool.spawn_worker() {
            Ok(worker_id) if self.gate.is_closed() => {
                // Shutdown won the race; the worker exits on the closed gate.
                warn!(worker_id = worker_id, "Scale up raced shutdown");
                Err(ExecutorError::Shutdown)
            }
            Ok(worker_id) => {
                info!(capacity_limit = limit, worker_id = worker_id, "Scaled up");
                Ok(limit)
            }
            Err(e) => {
                let limit = self.gate.shrink();
                warn!(capacity_limit = limit, error = %e, "Scale up failed");
                Err(ExecutorError::WorkerSpawn(e.to_string()))
            }
        }
    }

    /// Lower the capacity limit by one and post one stop token.
    ///
    /// Some worker exits the next time it is between tasks; which one is
    /// unspecified. Running tasks are never aborted. If there are more
    /// tokens than live workers, the surplus retires workers added later,
    /// and the limit, already at zero, records a deficit that the matching
    /// scale-ups pay back. Returns the new limit.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::Shutdown` after [`shutdown`](Self::shutdown).
    pub fn scale_down(&self) -> Result<usize, ExecutorError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(ExecutorError::Shutdown);
        }
        let limit = self.gate.shrink();
        self.pool.request_stop();
        info!(capacity_limit = limit, "Scaled down");
        Ok(limit)
    }

    /// Current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let gate = self.gate.snapshot();
        PoolStats {
            capacity_limit: gate.capacity_limit,
            capacity_deficit: gate.capacity_deficit,
            active_tasks: gate.active_count,
            queued_tasks: gate.queued_count,
            live_workers: self.pool.live_workers(),
            pending_shutdowns: self.pool.pending_shutdowns(),
            submitted_tasks: self.counters.submitted_tasks.load(Ordering::Relaxed),
            rejected_tasks: self.counters.rejected_tasks.load(Ordering::Relaxed),
            completed_tasks: self.counters.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.counters.failed_tasks.load(Ordering::Relaxed),
        }
    }

    /// Configuration the executor was started with.
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Stop admitting, retire all workers and join them.
    ///
    /// Tasks still queued are completed with `TaskError::Shutdown` so no
    /// submitter is left waiting. Calling this twice is a no-op.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Shutting down executor");

        let abandoned = abandon_queued(&self.gate);
        self.pool
            .stop_all(Duration::from_millis(self.config.shutdown_timeout_ms));
        info!(abandoned = abandoned, "Executor shut down complete");
    }
}

impl<P, R, E> Drop for ExecutorManager<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: Predictor<P, R>,
{
    fn drop(&mut self) {
        // Workers exit once the stop channel disconnects; they are not joined.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            let abandoned = abandon_queued(&self.gate);
            debug!(
                abandoned = abandoned,
                "ExecutorManager dropped without explicit shutdown - workers will be detached"
            );
        }
    }
}

/// Close the gate and wake every submitter whose task never ran.
fn abandon_queued<P, R>(gate: &AdmissionGate<Submission<P, R>>) -> usize {
    let leftover = gate.close();
    let count = leftover.len();
    for mut submission in leftover {
        submission.task.set_error(TaskError::Shutdown);
        submission.complete();
    }
    count
}
