//! Executor configuration.

use std::env;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{AppResult, QueueOrder};

/// Default worker thread stack size (2 MiB).
pub const DEFAULT_THREAD_STACK_SIZE: usize = 2 * 1024 * 1024;
/// Default upper bound on an idle worker's wait between queue checks.
pub const DEFAULT_IDLE_BACKOFF_MS: u64 = 50;
/// Default per-worker join timeout on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 2_000;

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Initial capacity limit and initial number of worker threads.
    pub task_number_limit: usize,
    /// Dequeue discipline for queued tasks.
    pub queue_order: QueueOrder,
    /// Stack size for worker threads in bytes.
    pub thread_stack_size: usize,
    /// Worker threads are named `<prefix>-<id>`.
    pub thread_name_prefix: String,
    /// Longest an idle worker sleeps before re-checking the queue.
    pub idle_backoff_ms: u64,
    /// How long shutdown waits for each worker to exit.
    pub shutdown_timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            task_number_limit: num_cpus::get(),
            queue_order: QueueOrder::default(),
            thread_stack_size: DEFAULT_THREAD_STACK_SIZE,
            thread_name_prefix: "executor-worker".into(),
            idle_backoff_ms: DEFAULT_IDLE_BACKOFF_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl ExecutorConfig {
    /// Configuration with defaults (one worker per CPU).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial capacity limit / worker count.
    #[must_use]
    pub fn with_task_number_limit(mut self, limit: usize) -> Self {
        self.task_number_limit = limit;
        self
    }

    /// Set the queue discipline.
    #[must_use]
    pub fn with_queue_order(mut self, order: QueueOrder) -> Self {
        self.queue_order = order;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the idle wait bound in milliseconds.
    #[must_use]
    pub fn with_idle_backoff_ms(mut self, ms: u64) -> Self {
        self.idle_backoff_ms = ms;
        self
    }

    /// Set the per-worker shutdown join timeout in milliseconds.
    #[must_use]
    pub fn with_shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.shutdown_timeout_ms = ms;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.task_number_limit == 0 {
            return Err("task_number_limit must be greater than 0".into());
        }
        if self.thread_stack_size == 0 {
            return Err("thread_stack_size must be greater than 0".into());
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        if self.idle_backoff_ms == 0 {
            return Err("idle_backoff_ms must be greater than 0".into());
        }
        if self.shutdown_timeout_ms == 0 {
            return Err("shutdown_timeout_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields
    /// take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the environment, reading a `.env` file first
    /// if one exists.
    ///
    /// Recognised variables: `EXECUTOR_TASK_NUMBER_LIMIT`,
    /// `EXECUTOR_QUEUE_ORDER` (`youngest_first` | `oldest_first`),
    /// `EXECUTOR_THREAD_STACK_SIZE`, `EXECUTOR_THREAD_NAME_PREFIX`,
    /// `EXECUTOR_IDLE_BACKOFF_MS`, `EXECUTOR_SHUTDOWN_TIMEOUT_MS`.
    ///
    /// # Errors
    ///
    /// Fails if a variable is present but unparsable, or if the resulting
    /// configuration is invalid.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup, starting from
    /// defaults.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = parse_var(&lookup, "EXECUTOR_TASK_NUMBER_LIMIT")? {
            cfg.task_number_limit = v;
        }
        if let Some(raw) = lookup("EXECUTOR_QUEUE_ORDER") {
            cfg.queue_order = serde_json::from_value(serde_json::Value::String(raw.trim().into()))
                .with_context(|| format!("EXECUTOR_QUEUE_ORDER has unknown value `{raw}`"))?;
        }
        if let Some(v) = parse_var(&lookup, "EXECUTOR_THREAD_STACK_SIZE")? {
            cfg.thread_stack_size = v;
        }
        if let Some(prefix) = lookup("EXECUTOR_THREAD_NAME_PREFIX") {
            cfg.thread_name_prefix = prefix;
        }
        if let Some(v) = parse_var(&lookup, "EXECUTOR_IDLE_BACKOFF_MS")? {
            cfg.idle_backoff_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "EXECUTOR_SHUTDOWN_TIMEOUT_MS")? {
            cfg.shutdown_timeout_ms = v;
        }
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> AppResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} has invalid value `{raw}`"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = ExecutorConfig::new();
        assert!(cfg.validate().is_ok());
        assert!(cfg.task_number_limit >= 1);
        assert_eq!(cfg.queue_order, QueueOrder::YoungestFirst);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let cfg = ExecutorConfig::from_lookup(lookup(&[
            ("EXECUTOR_TASK_NUMBER_LIMIT", "8"),
            ("EXECUTOR_QUEUE_ORDER", "oldest_first"),
            ("EXECUTOR_THREAD_NAME_PREFIX", "intent"),
            ("EXECUTOR_IDLE_BACKOFF_MS", " 10 "),
        ]))
        .unwrap();

        assert_eq!(cfg.task_number_limit, 8);
        assert_eq!(cfg.queue_order, QueueOrder::OldestFirst);
        assert_eq!(cfg.thread_name_prefix, "intent");
        assert_eq!(cfg.idle_backoff_ms, 10);
        assert_eq!(cfg.thread_stack_size, DEFAULT_THREAD_STACK_SIZE);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ExecutorConfig::from_lookup(lookup(&[("EXECUTOR_TASK_NUMBER_LIMIT", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("EXECUTOR_TASK_NUMBER_LIMIT"));

        assert!(
            ExecutorConfig::from_lookup(lookup(&[("EXECUTOR_QUEUE_ORDER", "random")])).is_err()
        );
        assert!(
            ExecutorConfig::from_lookup(lookup(&[("EXECUTOR_TASK_NUMBER_LIMIT", "0")])).is_err()
        );
    }
}
