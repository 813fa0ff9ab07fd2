//! # Inference Executor
//!
//! A bounded, runtime-resizable worker-thread executor for intent
//! classification inference.
//!
//! Prediction requests are admitted against a single capacity limit that
//! covers both running and queued work. Admitted tasks wait in a scheduling
//! queue until one of the dedicated worker threads picks them up, and the
//! submitter blocks (or awaits) on a per-task completion handle. Each task
//! comes back carrying its prediction or error plus latency and saturation
//! telemetry.
//!
//! ## Key Features
//!
//! - **Admission control**: `submit` fails fast with
//!   [`ExecutorError::Overloaded`](core::ExecutorError::Overloaded) instead of
//!   letting the queue grow without bound
//! - **Dynamic resizing**: `scale_up` adds capacity and a worker at once;
//!   `scale_down` retires exactly one worker between tasks
//! - **Configurable ordering**: youngest-first (default) or oldest-first
//! - **Per-task telemetry**: lock wait, queue wait, processing time, queue
//!   depth and load factor
//! - **Async surface**: transport-agnostic request and scaling handlers on
//!   tokio (`tokio-runtime` feature)
//!
//! ```rust,ignore
//! use inference_executor::builders::build_intent_executor;
//! use inference_executor::config::ExecutorConfig;
//! use inference_executor::core::Task;
//!
//! let executor = build_intent_executor(
//!     &ExecutorConfig::new().with_task_number_limit(4),
//!     my_model, // Implements ScoringModel<String>
//!     r#"{"0": "greeting", "1": "booking"}"#,
//! )?;
//!
//! let handle = executor.submit(Task::new("book a table".to_string()))?;
//! let task = handle.wait();
//! assert_eq!(task.result().map(String::as_str), Some("booking"));
//! ```
//!
//! For complete examples, see:
//! - `tests/executor_test.rs` - ordering, overload and stress tests
//! - `tests/api_test.rs` - request surface end to end

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core executor abstractions: tasks, admission, scheduling and workers.
pub mod core;
/// Configuration models for the executor.
pub mod config;
/// Builders to construct executors from configuration.
pub mod builders;
/// Infrastructure adapters for storage backends.
pub mod infra;
/// Async request and scaling surfaces.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;
