//! Core executor abstractions: tasks, admission, scheduling and workers.

pub mod admission;
pub mod completion;
pub mod error;
pub mod manager;
pub mod predictor;
pub mod queue;
pub mod task;
pub mod worker_pool;

pub use admission::{AdmissionGate, Dispatch, GateSnapshot, Rejected};
pub use completion::TaskHandle;
pub use error::{AppResult, ExecutorError, PredictorError, TaskError};
pub use manager::ExecutorManager;
pub use predictor::{IntentLabels, IntentPredictor, Predictor, ScoringModel};
pub use queue::{QueueOrder, SchedulingQueue};
pub use task::{Task, TaskId, TaskMetrics};
pub use worker_pool::PoolStats;
