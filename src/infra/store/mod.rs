//! Persistence boundary for classification results.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::TaskError;

pub use memory::InMemoryResultStore;

/// One persisted classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRecord {
    /// Record identifier, generated per request.
    pub id: Uuid,
    /// Caller supplied correlation identifier.
    pub correlation_id: String,
    /// Classified text.
    pub text: String,
    /// Predicted intent.
    pub prediction: String,
}

impl IntentRecord {
    /// New record with a fresh identifier.
    pub fn new(
        correlation_id: impl Into<String>,
        text: impl Into<String>,
        prediction: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlation_id: correlation_id.into(),
            text: text.into(),
            prediction: prediction.into(),
        }
    }
}

/// Failures reported by a result store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The backend refused the write.
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Short class name used when the failure is attached to a task.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "Unavailable",
            Self::Rejected(_) => "Rejected",
        }
    }

    fn cause(&self) -> &str {
        match self {
            Self::Unavailable(cause) | Self::Rejected(cause) => cause,
        }
    }
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        Self::Persistence {
            name: err.name().to_owned(),
            cause: err.cause().to_owned(),
        }
    }
}

/// Destination for completed classifications.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist one record.
    async fn save(&self, record: IntentRecord) -> Result<(), StoreError>;
}
