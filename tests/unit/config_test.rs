//! Tests for configuration validation

use inference_executor::config::{
    ExecutorConfig, DEFAULT_IDLE_BACKOFF_MS, DEFAULT_THREAD_STACK_SIZE,
};
use inference_executor::core::QueueOrder;

#[test]
fn test_executor_config_defaults() {
    let cfg = ExecutorConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.task_number_limit, num_cpus::get());
    assert_eq!(cfg.queue_order, QueueOrder::YoungestFirst);
    assert_eq!(cfg.thread_stack_size, DEFAULT_THREAD_STACK_SIZE);
    assert_eq!(cfg.idle_backoff_ms, DEFAULT_IDLE_BACKOFF_MS);
}

#[test]
fn test_executor_config_invalid_task_number_limit() {
    let invalid = ExecutorConfig::new().with_task_number_limit(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_executor_config_invalid_stack_size() {
    let invalid = ExecutorConfig::new().with_thread_stack_size(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_executor_config_invalid_name_prefix() {
    let invalid = ExecutorConfig::new().with_thread_name_prefix("  ");
    assert!(invalid.validate().is_err());
}

#[test]
fn test_executor_config_invalid_backoff() {
    let invalid = ExecutorConfig::new().with_idle_backoff_ms(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_executor_config_from_json() {
    let json = r#"{
        "task_number_limit": 6,
        "queue_order": "oldest_first",
        "thread_name_prefix": "intent-worker"
    }"#;
    let cfg = ExecutorConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.task_number_limit, 6);
    assert_eq!(cfg.queue_order, QueueOrder::OldestFirst);
    assert_eq!(cfg.thread_name_prefix, "intent-worker");
    assert_eq!(cfg.idle_backoff_ms, DEFAULT_IDLE_BACKOFF_MS);
}

#[test]
fn test_executor_config_from_json_rejects_invalid() {
    assert!(ExecutorConfig::from_json_str(r#"{"task_number_limit": 0}"#).is_err());
    assert!(ExecutorConfig::from_json_str(r#"{"queue_order": "random"}"#).is_err());
    assert!(ExecutorConfig::from_json_str("not json").is_err());
}

#[test]
fn test_executor_config_roundtrips_through_serde() {
    let cfg = ExecutorConfig::new()
        .with_task_number_limit(3)
        .with_queue_order(QueueOrder::OldestFirst)
        .with_shutdown_timeout_ms(500);
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(ExecutorConfig::from_json_str(&json).unwrap(), cfg);
}
