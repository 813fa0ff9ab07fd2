//! Task model: payload, arrival time, outcome and telemetry.
//!
//! A `Task` moves by value through the executor: the submitter owns it until
//! it is admitted, the scheduling queue owns it until a worker dequeues it,
//! the worker owns it until completion is signalled, and the caller owns it
//! afterwards. Because ownership is exclusive at every step, `metrics` and
//! `result` never need their own synchronization.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::TaskError;
use crate::util::clock::now_micros;

/// Unique task identifier.
pub type TaskId = Uuid;

/// Timing and saturation measurements collected while a task moves through
/// the executor.
///
/// The executor fills `lock_time`, `queue_waiting_time`, `actual_processing`,
/// `waiting_queue_length` and `thread_capacity`. `task_service_time` and
/// `database_response_time` belong to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetrics {
    /// Time spent waiting to acquire the admission lock.
    pub lock_time: Option<Duration>,
    /// Time between enqueue and dequeue.
    pub queue_waiting_time: Option<Duration>,
    /// Time spent inside the predictor.
    pub actual_processing: Option<Duration>,
    /// End-to-end time from arrival until the caller built its response.
    pub task_service_time: Option<Duration>,
    /// Round trip of the downstream persistence call.
    pub database_response_time: Option<Duration>,
    /// Queue depth observed right after this task was dequeued.
    pub waiting_queue_length: Option<usize>,
    /// Load factor (`active / capacity_limit`) when the task started running.
    pub thread_capacity: Option<f64>,
    #[serde(skip)]
    enqueued_at: Option<Instant>,
}

impl TaskMetrics {
    pub(crate) fn mark_enqueued(&mut self, lock_time: Duration) {
        self.lock_time = Some(lock_time);
        self.enqueued_at = Some(Instant::now());
    }

    /// Consumes the enqueue checkpoint so the wait is only measured once.
    pub(crate) fn mark_dequeued(&mut self, queue_depth: usize, load_factor: f64) {
        self.queue_waiting_time = self.enqueued_at.take().map(|at| at.elapsed());
        self.waiting_queue_length = Some(queue_depth);
        self.thread_capacity = Some(load_factor);
    }

    pub(crate) fn mark_processed(&mut self, elapsed: Duration) {
        self.actual_processing = Some(elapsed);
    }
}

/// One classification request travelling through the executor.
#[derive(Debug)]
pub struct Task<P, R> {
    id: TaskId,
    payload: P,
    arrival_micros: u128,
    arrived_at: Instant,
    metrics: TaskMetrics,
    result: Option<R>,
    error: Option<TaskError>,
}

impl<P, R> Task<P, R> {
    /// Create a task stamped with the current wall-clock time.
    pub fn new(payload: P) -> Self {
        Self::with_arrival(payload, now_micros())
    }

    /// Create a task with an explicit arrival timestamp (microseconds since
    /// the epoch). The timestamp drives queue ordering.
    pub fn with_arrival(payload: P, arrival_micros: u128) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            arrival_micros,
            arrived_at: Instant::now(),
            metrics: TaskMetrics::default(),
            result: None,
            error: None,
        }
    }

    /// Task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Input payload.
    #[must_use]
    pub const fn payload(&self) -> &P {
        &self.payload
    }

    /// Arrival timestamp in microseconds since the epoch.
    #[must_use]
    pub const fn arrival_micros(&self) -> u128 {
        self.arrival_micros
    }

    /// Collected telemetry.
    #[must_use]
    pub const fn metrics(&self) -> &TaskMetrics {
        &self.metrics
    }

    /// Prediction, once the worker has produced one.
    #[must_use]
    pub const fn result(&self) -> Option<&R> {
        self.result.as_ref()
    }

    /// Failure attached to this task, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    /// Attach a downstream failure (for example a persistence error).
    pub fn set_error(&mut self, error: TaskError) {
        self.error = Some(error);
    }

    /// Record the end-to-end service time, measured from task creation.
    pub fn record_service_time(&mut self) {
        self.metrics.task_service_time = Some(self.arrived_at.elapsed());
    }

    /// Record the persistence round trip.
    pub fn record_database_response_time(&mut self, elapsed: Duration) {
        self.metrics.database_response_time = Some(elapsed);
    }

    /// Split the task into payload, result and error.
    pub fn into_parts(self) -> (P, Option<R>, Option<TaskError>) {
        (self.payload, self.result, self.error)
    }

    pub(crate) fn metrics_mut(&mut self) -> &mut TaskMetrics {
        &mut self.metrics
    }

    pub(crate) fn set_result(&mut self, result: R) {
        debug_assert!(self.result.is_none(), "task result written twice");
        self.result = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_empty() {
        let task: Task<String, String> = Task::new("hello".into());
        assert_eq!(task.payload(), "hello");
        assert!(task.result().is_none());
        assert!(task.error().is_none());
        assert_eq!(task.metrics(), &TaskMetrics::default());
        assert!(task.arrival_micros() > 0);
    }

    #[test]
    fn test_queue_wait_measured_once() {
        let mut metrics = TaskMetrics::default();
        metrics.mark_enqueued(Duration::from_micros(5));
        std::thread::sleep(Duration::from_millis(2));
        metrics.mark_dequeued(3, 0.5);

        let waited = metrics.queue_waiting_time.unwrap();
        assert!(waited >= Duration::from_millis(2));
        assert_eq!(metrics.lock_time, Some(Duration::from_micros(5)));
        assert_eq!(metrics.waiting_queue_length, Some(3));
        assert_eq!(metrics.thread_capacity, Some(0.5));
        assert!(metrics.enqueued_at.is_none());
    }

    #[test]
    fn test_caller_side_timings() {
        let mut task: Task<&str, &str> = Task::with_arrival("x", 1);
        task.record_database_response_time(Duration::from_millis(7));
        task.record_service_time();
        task.set_error(TaskError::Persistence {
            name: "IntegrityError".into(),
            cause: "duplicate key".into(),
        });

        assert_eq!(task.arrival_micros(), 1);
        assert_eq!(
            task.metrics().database_response_time,
            Some(Duration::from_millis(7))
        );
        assert!(task.metrics().task_service_time.is_some());
        let (payload, result, error) = task.into_parts();
        assert_eq!(payload, "x");
        assert!(result.is_none());
        assert!(matches!(error, Some(TaskError::Persistence { .. })));
    }
}
