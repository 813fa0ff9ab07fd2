//! Error types for executor operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned synchronously by the executor to its callers.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Capacity is exhausted; the caller should back off or answer 429.
    #[error("executor overloaded: capacity limit {capacity_limit} reached")]
    Overloaded {
        /// Capacity limit observed when the task was rejected.
        capacity_limit: usize,
    },
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The executor has been shut down and no longer admits work.
    #[error("executor has been shut down")]
    Shutdown,
    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker: {0}")]
    WorkerSpawn(String),
    /// Internal failure (waiter thread lost, runtime gone, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failures raised by a predictor while classifying a payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PredictorError {
    /// The model reported a failure.
    #[error("prediction failed: {0}")]
    Failed(String),
    /// The predictor panicked inside a worker thread.
    #[error("predictor panicked: {0}")]
    Panicked(String),
    /// The model produced no scores to choose from.
    #[error("model returned no scores")]
    EmptyScores,
    /// The winning index has no label mapping.
    #[error("no label mapped for class index {0}")]
    UnknownLabel(usize),
}

/// Failure attached to a completed task.
///
/// Predictor failures are written by the worker; persistence failures are
/// written by the caller after the executor hands the task back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskError {
    /// Inference failed for this task.
    #[error("predictor error: {message}")]
    Predictor {
        /// Human readable description.
        message: String,
    },
    /// Writing the result downstream failed.
    #[error("persistence error {name}: {cause}")]
    Persistence {
        /// Error class name reported by the store.
        name: String,
        /// Underlying cause.
        cause: String,
    },
    /// The executor shut down before the task was picked up.
    #[error("executor shut down before the task ran")]
    Shutdown,
}

impl From<PredictorError> for TaskError {
    fn from(err: PredictorError) -> Self {
        Self::Predictor {
            message: err.to_string(),
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
