//! Tests for error types

use inference_executor::core::{ExecutorError, IntentLabels, PredictorError, TaskError};

#[test]
fn test_overloaded_error() {
    let err = ExecutorError::Overloaded { capacity_limit: 4 };
    assert_eq!(
        format!("{}", err),
        "executor overloaded: capacity limit 4 reached"
    );
}

#[test]
fn test_invalid_config_error() {
    let err = ExecutorError::InvalidConfig("task_number_limit must be greater than 0".to_string());
    assert_eq!(
        format!("{}", err),
        "invalid configuration: task_number_limit must be greater than 0"
    );
}

#[test]
fn test_shutdown_error() {
    assert_eq!(
        format!("{}", ExecutorError::Shutdown),
        "executor has been shut down"
    );
}

#[test]
fn test_predictor_error_becomes_task_error() {
    let err: TaskError = PredictorError::UnknownLabel(7).into();
    assert_eq!(
        err,
        TaskError::Predictor {
            message: "no label mapped for class index 7".to_string()
        }
    );
}

#[test]
fn test_task_error_serializes_with_kind() {
    let err = TaskError::Persistence {
        name: "Unavailable".to_string(),
        cause: "connection refused".to_string(),
    };
    let value = serde_json::to_value(&err).unwrap();
    assert_eq!(value["kind"], "persistence");
    assert_eq!(value["name"], "Unavailable");
    assert_eq!(value["cause"], "connection refused");
}

#[test]
fn test_malformed_labels_are_config_errors() {
    assert!(matches!(
        IntentLabels::from_json_str(r#"{"zero": "greeting"}"#),
        Err(ExecutorError::InvalidConfig(_))
    ));
    assert!(matches!(
        IntentLabels::from_json_str("[]"),
        Err(ExecutorError::InvalidConfig(_))
    ));
}
