//! Request and scaling surfaces, independent of any HTTP framework.
//!
//! Handlers return an [`ApiResponse`] carrying a status code and a JSON
//! body; routing, authentication and transport stay with the caller.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::core::{ExecutorError, ExecutorManager, Predictor, Task, TaskError};
use crate::infra::{IntentRecord, ResultStore};
use crate::runtime::host::HostSampler;
use crate::util::clock::secs;

/// Inbound classification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRequest {
    /// Text to classify.
    pub text: String,
    /// Caller supplied correlation identifier, persisted with the result.
    pub correlation_id: String,
}

impl IntentRequest {
    /// Create a request.
    pub fn new(text: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            correlation_id: correlation_id.into(),
        }
    }

    /// Field-level validation messages, keyed by field name.
    ///
    /// # Errors
    ///
    /// Returns a JSON object of messages when a required field is blank.
    pub fn validate(&self) -> Result<(), Value> {
        let mut errors = serde_json::Map::new();
        if self.text.trim().is_empty() {
            errors.insert("text".into(), json!(["Missing data for required field."]));
        }
        if self.correlation_id.trim().is_empty() {
            errors.insert(
                "correlation_id".into(),
                json!(["Missing data for required field."]),
            );
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Value::Object(errors))
        }
    }
}

/// Status code and JSON body produced by a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// HTTP-style status code.
    pub status: u16,
    /// Response body.
    pub body: Value,
}

impl ApiResponse {
    fn json<T: Serialize>(status: u16, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status, body },
            Err(e) => Self::error(500, &e.to_string()),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error_code": status, "message": message }),
        }
    }

    fn too_many_requests() -> Self {
        Self::error(429, "Too many requests")
    }

    fn from_executor_error(err: &ExecutorError) -> Self {
        match err {
            ExecutorError::Overloaded { .. } => Self::too_many_requests(),
            ExecutorError::Shutdown => Self::error(503, "Service unavailable"),
            other => Self::error(500, &other.to_string()),
        }
    }
}

/// Latency section of a report, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Latency {
    /// Wait for the admission lock.
    pub lock_time: Option<f64>,
    /// Time spent queued.
    pub queue_waiting_time: Option<f64>,
    /// Time inside the predictor.
    pub actual_processing: Option<f64>,
    /// End to end.
    pub task_service_time: Option<f64>,
    /// Persistence round trip.
    pub database_response_time: Option<f64>,
}

/// Saturation section of a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Saturation {
    /// Host CPU utilization in percent.
    pub cpu_utilization: Option<f64>,
    /// Host RAM utilization in percent.
    pub ram_utilization: Option<f64>,
    /// Queue depth right after the task was dequeued.
    pub waiting_queue_length: Option<usize>,
    /// Load factor when the task started.
    pub thread_capacity: Option<f64>,
}

/// Errors section of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportErrors {
    /// Inference failure, if any.
    pub predictor_error: Option<String>,
    /// Persistence failure, if any.
    pub db_error: Option<TaskError>,
}

impl From<Option<&TaskError>> for ReportErrors {
    fn from(error: Option<&TaskError>) -> Self {
        match error {
            None => Self::default(),
            Some(db @ TaskError::Persistence { .. }) => Self {
                predictor_error: None,
                db_error: Some(db.clone()),
            },
            Some(other) => Self {
                predictor_error: Some(other.to_string()),
                db_error: None,
            },
        }
    }
}

/// Response body for a completed classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    /// Classified text.
    pub text: String,
    /// Predicted intent, absent when inference failed.
    pub prediction: Option<String>,
    /// Timing measurements.
    pub latency: Latency,
    /// Load measurements.
    pub saturation: Saturation,
    /// Failures recorded on the task.
    pub errors: ReportErrors,
}

impl TaskReport {
    /// Build a report, sampling host utilization now.
    pub fn from_task<H>(task: &Task<String, String>, sampler: &H) -> Self
    where
        H: HostSampler + ?Sized,
    {
        let metrics = task.metrics();
        Self {
            text: task.payload().clone(),
            prediction: task.result().cloned(),
            latency: Latency {
                lock_time: secs(metrics.lock_time),
                queue_waiting_time: secs(metrics.queue_waiting_time),
                actual_processing: secs(metrics.actual_processing),
                task_service_time: secs(metrics.task_service_time),
                database_response_time: secs(metrics.database_response_time),
            },
            saturation: Saturation {
                cpu_utilization: sampler.cpu_utilization(),
                ram_utilization: sampler.ram_utilization(),
                waiting_queue_length: metrics.waiting_queue_length,
                thread_capacity: metrics.thread_capacity,
            },
            errors: task.error().into(),
        }
    }
}

/// Acknowledgement returned by the scaling surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleAck {
    /// Human readable outcome.
    pub message: String,
    /// Status code, repeated in the body.
    pub code: u16,
    /// Capacity limit after the change.
    pub capacity_limit: usize,
}

/// Classify one request and persist the outcome.
///
/// Answers 400 for a blank field, 429 when the executor has no capacity,
/// 503 after shutdown, 500 with the report when inference or persistence
/// fails, and 200 with the report otherwise.
pub async fn classify<E, S, H>(
    manager: &ExecutorManager<String, String, E>,
    store: &S,
    sampler: &H,
    request: IntentRequest,
) -> ApiResponse
where
    E: Predictor<String, String>,
    S: ResultStore + ?Sized,
    H: HostSampler + ?Sized,
{
    if let Err(errors) = request.validate() {
        return ApiResponse {
            status: 400,
            body: errors,
        };
    }
    // Advisory only; `submit` makes the binding decision.
    if manager.remaining_capacity() <= 0 {
        debug!(correlation_id = %request.correlation_id, "No capacity left, rejecting early");
        return ApiResponse::too_many_requests();
    }

    let IntentRequest {
        text,
        correlation_id,
    } = request;
    let handle = match manager.submit(Task::new(text)) {
        Ok(handle) => handle,
        Err(e) => return ApiResponse::from_executor_error(&e),
    };
    let mut task = match handle.wait_async().await {
        Ok(task) => task,
        Err(e) => return ApiResponse::from_executor_error(&e),
    };

    let prediction = if task.error().is_none() {
        task.result().cloned()
    } else {
        None
    };
    let status = match prediction {
        Some(prediction) => {
            let record = IntentRecord::new(correlation_id, task.payload().clone(), prediction);
            let started = Instant::now();
            let saved = store.save(record).await;
            task.record_database_response_time(started.elapsed());
            match saved {
                Ok(()) => 200,
                Err(e) => {
                    warn!(task_id = %task.id(), error = %e, "Failed to persist prediction");
                    task.set_error(e.into());
                    500
                }
            }
        }
        None => 500,
    };

    task.record_service_time();
    ApiResponse::json(status, &TaskReport::from_task(&task, sampler))
}

/// Add one worker and one unit of capacity.
pub async fn increase<E>(manager: &ExecutorManager<String, String, E>) -> ApiResponse
where
    E: Predictor<String, String>,
{
    match manager.scale_up() {
        Ok(capacity_limit) => ApiResponse::json(
            200,
            &ScaleAck {
                message: "The number of running threads was increased".into(),
                code: 200,
                capacity_limit,
            },
        ),
        Err(e) => ApiResponse::from_executor_error(&e),
    }
}

/// Retire one worker and remove one unit of capacity.
pub async fn decrease<E>(manager: &ExecutorManager<String, String, E>) -> ApiResponse
where
    E: Predictor<String, String>,
{
    match manager.scale_down() {
        Ok(capacity_limit) => ApiResponse::json(
            200,
            &ScaleAck {
                message: "The number of running threads was decreased".into(),
                code: 200,
                capacity_limit,
            },
        ),
        Err(e) => ApiResponse::from_executor_error(&e),
    }
}
