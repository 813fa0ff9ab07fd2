//! Predictor abstraction invoked by workers, plus the intent-label adapter.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{ExecutorError, PredictorError};

/// Model inference capability invoked once per task.
///
/// Every worker thread owns its own clone, so implementations only need
/// `Sync` for state they deliberately share (e.g. model weights in an `Arc`).
///
/// # Example
///
/// ```rust,ignore
/// use inference_executor::core::{Predictor, PredictorError};
///
/// #[derive(Clone)]
/// struct Echo;
///
/// impl Predictor<String, String> for Echo {
///     fn predict(&self, payload: &String) -> Result<String, PredictorError> {
///         Ok(payload.to_uppercase())
///     }
/// }
/// ```
pub trait Predictor<P, R>: Send + Sync + Clone + 'static {
    /// Classify a payload. Called synchronously on a worker thread.
    ///
    /// # Errors
    ///
    /// Any `PredictorError` is attached to the task and the submitter is
    /// woken with it.
    fn predict(&self, payload: &P) -> Result<R, PredictorError>;
}

/// External model producing one score per intent class.
pub trait ScoringModel<P>: Send + Sync + Clone + 'static {
    /// Score the payload against every known class.
    ///
    /// # Errors
    ///
    /// Implementations report embedding or inference failures.
    fn scores(&self, payload: &P) -> Result<Vec<f32>, PredictorError>;
}

/// Mapping from class index to intent label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentLabels {
    labels: HashMap<usize, String>,
}

impl IntentLabels {
    /// Parse a `{"0": "greeting", "1": "farewell"}` style mapping.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::InvalidConfig` for malformed JSON or keys that
    /// are not class indices.
    pub fn from_json_str(input: &str) -> Result<Self, ExecutorError> {
        let raw: HashMap<String, String> = serde_json::from_str(input)
            .map_err(|e| ExecutorError::InvalidConfig(format!("label map parse error: {e}")))?;
        let labels = raw
            .into_iter()
            .map(|(index, label)| {
                index
                    .trim()
                    .parse::<usize>()
                    .map(|index| (index, label))
                    .map_err(|_| {
                        ExecutorError::InvalidConfig(format!("label key `{index}` is not an index"))
                    })
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self { labels })
    }

    /// Label for a class index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(&index).map(String::as_str)
    }

    /// Number of mapped classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no class is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<(usize, String)> for IntentLabels {
    fn from_iter<I: IntoIterator<Item = (usize, String)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

/// Predictor that picks the highest-scoring class and maps it to a label.
#[derive(Clone)]
pub struct IntentPredictor<M> {
    model: M,
    labels: Arc<IntentLabels>,
}

impl<M> IntentPredictor<M> {
    /// Combine a scoring model with its label table.
    pub fn new(model: M, labels: IntentLabels) -> Self {
        Self {
            model,
            labels: Arc::new(labels),
        }
    }
}

impl<P, M> Predictor<P, String> for IntentPredictor<M>
where
    P: 'static,
    M: ScoringModel<P>,
{
    fn predict(&self, payload: &P) -> Result<String, PredictorError> {
        let scores = self.model.scores(payload)?;
        let index = argmax(&scores).ok_or(PredictorError::EmptyScores)?;
        self.labels
            .get(index)
            .map(str::to_owned)
            .ok_or(PredictorError::UnknownLabel(index))
    }
}

/// Index of the first maximum; NaN scores never win over a number.
fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        let replace = match best {
            None => true,
            Some((_, top)) => (top.is_nan() && !score.is_nan()) || score > top,
        };
        if replace {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct FixedScores(Vec<f32>);

    impl ScoringModel<String> for FixedScores {
        fn scores(&self, _payload: &String) -> Result<Vec<f32>, PredictorError> {
            Ok(self.0.clone())
        }
    }

    fn labels() -> IntentLabels {
        IntentLabels::from_json_str(r#"{"0": "greeting", "1": "farewell", "2": "order"}"#).unwrap()
    }

    #[test]
    fn test_label_parsing() {
        let labels = labels();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get(1), Some("farewell"));
        assert_eq!(labels.get(9), None);
    }

    #[test]
    fn test_label_parsing_rejects_bad_keys() {
        assert!(IntentLabels::from_json_str(r#"{"zero": "greeting"}"#).is_err());
        assert!(IntentLabels::from_json_str("not json").is_err());
    }

    #[test]
    fn test_predicts_highest_score() {
        let predictor = IntentPredictor::new(FixedScores(vec![0.1, 0.2, 0.7]), labels());
        assert_eq!(predictor.predict(&"hi".to_string()).unwrap(), "order");
    }

    #[test]
    fn test_empty_scores() {
        let predictor = IntentPredictor::new(FixedScores(vec![]), labels());
        assert_eq!(
            predictor.predict(&"hi".to_string()),
            Err(PredictorError::EmptyScores)
        );
    }

    #[test]
    fn test_unknown_label() {
        let predictor = IntentPredictor::new(FixedScores(vec![0.0, 0.0, 0.0, 5.0]), labels());
        assert_eq!(
            predictor.predict(&"hi".to_string()),
            Err(PredictorError::UnknownLabel(3))
        );
    }

    #[test]
    fn test_argmax_first_max_and_nan() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), Some(1));
        assert_eq!(argmax(&[f32::NAN, 0.5, 0.2]), Some(1));
        assert_eq!(argmax(&[0.5, f32::NAN]), Some(0));
        assert_eq!(argmax(&[]), None);
    }
}
