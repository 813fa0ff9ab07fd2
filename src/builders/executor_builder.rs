//! Builders to construct an executor from configuration.

use crate::config::ExecutorConfig;
use crate::core::{
    AppResult, ExecutorError, ExecutorManager, IntentLabels, IntentPredictor, Predictor,
    ScoringModel,
};

/// Build an executor from configuration using a predictor factory.
///
/// The configuration is validated before the factory runs, so an invalid
/// configuration never loads a model.
///
/// # Errors
///
/// Returns `ExecutorError::InvalidConfig` for an invalid configuration, any
/// error produced by the factory, or `ExecutorError::WorkerSpawn`.
pub fn build_executor<P, R, E, F>(
    cfg: &ExecutorConfig,
    predictor_factory: F,
) -> Result<ExecutorManager<P, R, E>, ExecutorError>
where
    P: Send + 'static,
    R: Send + 'static,
    E: Predictor<P, R>,
    F: FnOnce(&ExecutorConfig) -> Result<E, ExecutorError>,
{
    cfg.validate()
        .map_err(|e| ExecutorError::InvalidConfig(format!("config invalid: {e}")))?;
    let predictor = predictor_factory(cfg)?;
    ExecutorManager::new(cfg.clone(), predictor)
}

/// Build an intent classification executor from a scoring model and a JSON
/// index-to-intent mapping.
///
/// # Errors
///
/// Same as [`build_executor`], plus `ExecutorError::InvalidConfig` for a
/// malformed or empty label map.
pub fn build_intent_executor<P, M>(
    cfg: &ExecutorConfig,
    model: M,
    labels_json: &str,
) -> Result<ExecutorManager<P, String, IntentPredictor<M>>, ExecutorError>
where
    P: Send + 'static,
    M: ScoringModel<P>,
{
    build_executor(cfg, |_| {
        let labels = IntentLabels::from_json_str(labels_json)?;
        if labels.is_empty() {
            return Err(ExecutorError::InvalidConfig("label map is empty".into()));
        }
        Ok(IntentPredictor::new(model, labels))
    })
}

/// Build an intent executor configured from the environment (and `.env`).
///
/// # Errors
///
/// Fails on configuration, label map or worker start-up errors.
pub fn build_intent_executor_from_env<P, M>(
    model: M,
    labels_json: &str,
) -> AppResult<ExecutorManager<P, String, IntentPredictor<M>>>
where
    P: Send + 'static,
    M: ScoringModel<P>,
{
    let cfg = ExecutorConfig::from_env()?;
    Ok(build_intent_executor(&cfg, model, labels_json)?)
}
