//! Worker threads, stop tokens and pool statistics.
//!
//! Each worker is a dedicated OS thread running one task at a time. Between
//! tasks it checks, in order:
//!
//! 1. the stop-token channel (one token retires exactly one worker),
//! 2. the scheduling queue behind the admission gate.
//!
//! A closed gate with an empty queue also ends the worker, so a worker
//! that outlived its shutdown join or started during shutdown still exits.
//!
//! When both are empty the worker parks in a single `select!` over the stop
//! channel and a ready-signal channel instead of spinning. A stop token is
//! therefore only ever observed between tasks; running work is never
//! preempted.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::ExecutorConfig;
use crate::core::admission::{AdmissionGate, Dispatch};
use crate::core::completion::Submission;
use crate::core::{Predictor, PredictorError};

/// Pending ready signals kept for idle workers. Extra signals are dropped:
/// a full channel already guarantees the next idle wait returns at once.
const READY_SIGNAL_CAPACITY: usize = 256;

/// Sentinel that makes exactly one worker exit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StopToken;

/// Statistics about pool utilization and throughput.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Target worker count and ceiling on running plus queued tasks.
    pub capacity_limit: usize,
    /// Scale-downs past zero still owed by future scale-ups.
    pub capacity_deficit: usize,
    /// Tasks currently being processed.
    pub active_tasks: usize,
    /// Tasks admitted but not yet picked up.
    pub queued_tasks: usize,
    /// Worker threads currently alive.
    pub live_workers: usize,
    /// Stop tokens no worker has consumed yet.
    pub pending_shutdowns: usize,
    /// Tasks admitted since start.
    pub submitted_tasks: u64,
    /// Submissions turned away for lack of capacity.
    pub rejected_tasks: u64,
    /// Tasks that produced a prediction.
    pub completed_tasks: u64,
    /// Tasks that finished with a predictor error.
    pub failed_tasks: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub live_workers: AtomicUsize,
    pub submitted_tasks: AtomicU64,
    pub rejected_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
}

/// Decrements the live worker count when a worker thread ends, including by
/// unwinding.
struct LiveWorker(Arc<PoolCounters>);

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.live_workers.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Everything a worker thread needs, moved into the thread at spawn.
struct Worker<P, R, E> {
    id: usize,
    gate: Arc<AdmissionGate<Submission<P, R>>>,
    stop_rx: Receiver<StopToken>,
    ready_tx: Sender<()>,
    ready_rx: Receiver<()>,
    counters: Arc<PoolCounters>,
    predictor: E,
    idle_backoff: Duration,
}

impl<P, R, E> Worker<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: Predictor<P, R>,
{
    fn run(self) {
        let _live = LiveWorker(Arc::clone(&self.counters));
        debug!(worker_id = self.id, "Worker thread started");

        loop {
            match self.stop_rx.try_recv() {
                Ok(StopToken) => {
                    info!(worker_id = self.id, "Worker received stop token");
                    break;
                }
                Err(TryRecvError::Disconnected) => {
                    debug!(worker_id = self.id, "Stop channel closed, exiting");
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            if let Some(dispatch) = self.gate.begin_next() {
                self.process(dispatch);
                continue;
            }
            if self.gate.is_closed() {
                debug!(worker_id = self.id, "Gate closed and queue empty, exiting");
                break;
            }

            select! {
                recv(self.stop_rx) -> msg => {
                    if msg.is_ok() {
                        info!(worker_id = self.id, "Worker received stop token while idle");
                    }
                    break;
                }
                recv(self.ready_rx) -> _ => {}
                default(self.idle_backoff) => {}
            }
        }

        debug!(worker_id = self.id, "Worker thread exiting");
    }

    fn process(&self, dispatch: Dispatch<Submission<P, R>>) {
        let Dispatch {
            item: mut submission,
            queue_depth,
            load_factor,
        } = dispatch;

        // More work is waiting: pass the wakeup on to another idle worker.
        if queue_depth > 0 {
            let _ = self.ready_tx.try_send(());
        }

        let task_id = submission.task.id();
        submission
            .task
            .metrics_mut()
            .mark_dequeued(queue_depth, load_factor);
        debug!(
            worker_id = self.id,
            task_id = %task_id,
            queue_depth = queue_depth,
            load_factor = load_factor,
            "Worker executing task"
        );

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.predictor.predict(submission.task.payload())
        }))
        .unwrap_or_else(|panic| Err(PredictorError::Panicked(panic_message(&*panic))));
        let elapsed = started.elapsed();
        submission.task.metrics_mut().mark_processed(elapsed);

        self.gate.finish();

        match outcome {
            Ok(result) => {
                submission.task.set_result(result);
                self.counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
                debug!(
                    worker_id = self.id,
                    task_id = %task_id,
                    elapsed = ?elapsed,
                    "Worker completed task"
                );
            }
            Err(err) => {
                if matches!(err, PredictorError::Panicked(_)) {
                    error!(
                        worker_id = self.id,
                        task_id = %task_id,
                        error = %err,
                        "Predictor panicked"
                    );
                } else {
                    warn!(
                        worker_id = self.id,
                        task_id = %task_id,
                        error = %err,
                        "Prediction failed"
                    );
                }
                submission.task.set_error(err.into());
                self.counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
            }
        }

        submission.complete();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned())
}

/// Set of worker threads sharing one admission gate.
pub(crate) struct WorkerPool<P, R, E> {
    gate: Arc<AdmissionGate<Submission<P, R>>>,
    predictor: E,
    counters: Arc<PoolCounters>,
    stop_tx: Sender<StopToken>,
    stop_rx: Receiver<StopToken>,
    ready_tx: Sender<()>,
    ready_rx: Receiver<()>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_worker_id: AtomicUsize,
    thread_name_prefix: String,
    thread_stack_size: usize,
    idle_backoff: Duration,
}

impl<P, R, E> WorkerPool<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: Predictor<P, R>,
{
    pub(crate) fn new(
        config: &ExecutorConfig,
        gate: Arc<AdmissionGate<Submission<P, R>>>,
        counters: Arc<PoolCounters>,
        predictor: E,
    ) -> Self {
        let (stop_tx, stop_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(READY_SIGNAL_CAPACITY);
        Self {
            gate,
            predictor,
            counters,
            stop_tx,
            stop_rx,
            ready_tx,
            ready_rx,
            workers: Mutex::new(Vec::with_capacity(config.task_number_limit)),
            next_worker_id: AtomicUsize::new(0),
            thread_name_prefix: config.thread_name_prefix.clone(),
            thread_stack_size: config.thread_stack_size,
            idle_backoff: Duration::from_millis(config.idle_backoff_ms),
        }
    }

    /// Start one more worker thread.
    pub(crate) fn spawn_worker(&self) -> Result<usize, std::io::Error> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let worker = Worker {
            id,
            gate: Arc::clone(&self.gate),
            stop_rx: self.stop_rx.clone(),
            ready_tx: self.ready_tx.clone(),
            ready_rx: self.ready_rx.clone(),
            counters: Arc::clone(&self.counters),
            predictor: self.predictor.clone(),
            idle_backoff: self.idle_backoff,
        };

        self.counters.live_workers.fetch_add(1, Ordering::AcqRel);
        let spawned = thread::Builder::new()
            .name(format!("{}-{id}", self.thread_name_prefix))
            .stack_size(self.thread_stack_size)
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                let mut workers = self.workers.lock();
                workers.retain(|h| !h.is_finished());
                workers.push(handle);
                Ok(id)
            }
            Err(e) => {
                self.counters.live_workers.fetch_sub(1, Ordering::AcqRel);
                Err(e)
            }
        }
    }

    /// Ask one worker, whichever checks first, to exit after its current task.
    pub(crate) fn request_stop(&self) {
        // The pool holds a receiver, so the channel cannot be disconnected.
        let _ = self.stop_tx.send(StopToken);
        if self.counters.live_workers.load(Ordering::Acquire) < self.stop_rx.len() {
            warn!(
                pending = self.stop_rx.len(),
                "More stop tokens than live workers; extra tokens retire future workers"
            );
        }
    }

    /// Wake one idle worker because new work was queued.
    pub(crate) fn notify_ready(&self) {
        let _ = self.ready_tx.try_send(());
    }

    pub(crate) fn live_workers(&self) -> usize {
        self.counters.live_workers.load(Ordering::Acquire)
    }

    pub(crate) fn pending_shutdowns(&self) -> usize {
        self.stop_rx.len()
    }

    /// Retire every live worker and join them, waiting at most `timeout` per
    /// worker. Workers that overrun are detached.
    pub(crate) fn stop_all(&self, timeout: Duration) {
        for _ in 0..self.live_workers() {
            let _ = self.stop_tx.send(StopToken);
        }

        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        let worker_count = handles.len();
        for (idx, handle) in handles.into_iter().enumerate() {
            let (done_tx, done_rx) = bounded(1);
            let joiner = thread::spawn(move || {
                let _ = done_tx.send(handle.join().is_ok());
            });
            match done_rx.recv_timeout(timeout) {
                Ok(true) => debug!(worker = idx, "Worker joined successfully"),
                Ok(false) => warn!(worker = idx, "Worker panicked"),
                Err(_) => {
                    warn!(worker = idx, "Worker did not exit within timeout - detaching");
                    continue;
                }
            }
            let _ = joiner.join();
        }

        // Drop tokens left over from earlier scale-downs.
        while self.stop_rx.try_recv().is_ok() {}
        info!(worker_count = worker_count, "Worker pool stopped");
    }
}
