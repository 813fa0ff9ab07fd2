//! In-memory result store for development/testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{IntentRecord, ResultStore, StoreError};

/// Default number of records kept before the oldest are evicted.
pub const DEFAULT_STORE_CAPACITY: usize = 10_000;

/// Bounded record buffer; the oldest record is evicted when full.
#[derive(Debug)]
pub struct InMemoryResultStore {
    records: Mutex<VecDeque<IntentRecord>>,
    capacity: usize,
    fail_next: AtomicBool,
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_STORE_CAPACITY)
    }
}

impl InMemoryResultStore {
    /// Create a store with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding at most `capacity` records (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            fail_next: AtomicBool::new(false),
        }
    }

    /// Make the next `save` fail with `StoreError::Unavailable`.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::Release);
    }

    /// Snapshot of stored records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<IntentRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn save(&self, record: IntentRecord) -> Result<(), StoreError> {
        if self.fail_next.swap(false, Ordering::AcqRel) {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_evicts_oldest() {
        let store = InMemoryResultStore::with_capacity(2);
        for text in ["a", "b", "c"] {
            store
                .save(IntentRecord::new("corr", text, "greeting"))
                .await
                .unwrap();
        }
        let texts: Vec<_> = store.records().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let store = InMemoryResultStore::new();
        store.fail_next();
        assert!(store
            .save(IntentRecord::new("corr", "a", "greeting"))
            .await
            .is_err());
        assert!(store
            .save(IntentRecord::new("corr", "b", "greeting"))
            .await
            .is_ok());
        assert_eq!(store.len(), 1);
    }
}
