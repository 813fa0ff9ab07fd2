//! Configuration models for the executor.

pub mod executor;

pub use executor::{
    ExecutorConfig, DEFAULT_IDLE_BACKOFF_MS, DEFAULT_SHUTDOWN_TIMEOUT_MS,
    DEFAULT_THREAD_STACK_SIZE,
};
