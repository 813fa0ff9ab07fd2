//! Tests for builder modules

use inference_executor::builders::{build_executor, build_intent_executor};
use inference_executor::config::ExecutorConfig;
use inference_executor::core::{
    ExecutorError, ExecutorManager, Predictor, PredictorError, ScoringModel, Task,
};
use std::cell::Cell;

#[derive(Clone)]
struct Echo;

impl Predictor<String, String> for Echo {
    fn predict(&self, payload: &String) -> Result<String, PredictorError> {
        Ok(payload.clone())
    }
}

#[derive(Clone)]
struct Flat;

impl ScoringModel<String> for Flat {
    fn scores(&self, _payload: &String) -> Result<Vec<f32>, PredictorError> {
        Ok(vec![0.5, 0.5])
    }
}

#[test]
fn test_build_executor_from_config() {
    let cfg = ExecutorConfig::new()
        .with_task_number_limit(2)
        .with_thread_name_prefix("builder-test");
    let manager: ExecutorManager<String, String, Echo> =
        build_executor(&cfg, |_| Ok(Echo)).unwrap();

    assert_eq!(manager.config().thread_name_prefix, "builder-test");
    assert_eq!(manager.stats().capacity_limit, 2);
    let task = manager.submit(Task::new("ping".to_string())).unwrap().wait();
    assert_eq!(task.result().map(String::as_str), Some("ping"));
    manager.shutdown();
}

#[test]
fn test_build_executor_skips_factory_for_invalid_config() {
    let called = Cell::new(false);
    let result: Result<ExecutorManager<String, String, Echo>, _> = build_executor(
        &ExecutorConfig::new().with_task_number_limit(0),
        |_| {
            called.set(true);
            Ok(Echo)
        },
    );
    assert!(matches!(result, Err(ExecutorError::InvalidConfig(_))));
    assert!(!called.get());
}

#[test]
fn test_build_executor_propagates_factory_error() {
    let result: Result<ExecutorManager<String, String, Echo>, _> =
        build_executor(&ExecutorConfig::new().with_task_number_limit(1), |_| {
            Err(ExecutorError::InvalidConfig("model file missing".into()))
        });
    assert!(matches!(
        result,
        Err(ExecutorError::InvalidConfig(msg)) if msg == "model file missing"
    ));
}

#[test]
fn test_build_intent_executor_rejects_empty_labels() {
    let result: Result<ExecutorManager<String, String, _>, _> =
        build_intent_executor(&ExecutorConfig::new().with_task_number_limit(1), Flat, "{}");
    assert!(matches!(result, Err(ExecutorError::InvalidConfig(_))));
}

#[test]
fn test_build_intent_executor_ties_pick_first_label() {
    let manager = build_intent_executor(
        &ExecutorConfig::new().with_task_number_limit(1),
        Flat,
        r#"{"0": "greeting", "1": "farewell"}"#,
    )
    .unwrap();
    let task = manager.submit(Task::new("anything".to_string())).unwrap().wait();
    assert_eq!(task.result().map(String::as_str), Some("greeting"));
    manager.shutdown();
}
