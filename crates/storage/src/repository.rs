use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{HistoryError, HistoryRecord, OptionKey, QuestionId, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for one entry of the history blob.
///
/// This mirrors the domain `HistoryRecord` so the store can serialize and
/// deserialize without leaking storage concerns into the domain layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecordData {
    pub id: RecordId,
    pub recorded_at: DateTime<Utc>,
    pub score: u32,
    pub total: u32,
    pub credit: u32,
    pub duration_secs: u32,
    #[serde(default)]
    pub answers: BTreeMap<QuestionId, OptionKey>,
}

impl HistoryRecordData {
    #[must_use]
    pub fn from_record(record: &HistoryRecord) -> Self {
        Self {
            id: record.id(),
            recorded_at: record.recorded_at(),
            score: record.score(),
            total: record.total(),
            credit: record.credit(),
            duration_secs: record.duration_secs(),
            answers: record.answers().clone(),
        }
    }

    /// Convert the persisted entry back into a domain `HistoryRecord`.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError` if the persisted counts fail validation.
    pub fn into_record(self) -> Result<HistoryRecord, HistoryError> {
        HistoryRecord::from_persisted(
            self.id,
            self.recorded_at,
            self.score,
            self.total,
            self.credit,
            self.duration_secs,
            self.answers,
        )
    }
}

/// Contract for the quiz history log.
///
/// The log is append-only and ordered newest-first; the engine appends one
/// record per finished session and the results view reads the whole list.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a completed-session record to the front of the log.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be persisted.
    async fn append(&self, record: &HistoryRecord) -> Result<(), StorageError>;

    /// Load the entire log, newest first. Empty when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the log cannot be read or decoded.
    async fn load_all(&self) -> Result<Vec<HistoryRecord>, StorageError>;
}

/// Simple in-memory store implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryHistoryStore {
    records: Arc<Mutex<Vec<HistoryRecord>>>,
}

impl InMemoryHistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, record: &HistoryRecord) -> Result<(), StorageError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(0, record.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<HistoryRecord>, StorageError> {
        let guard = self
            .records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }
}

/// Aggregates the history store behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub history: Arc<dyn HistoryStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            history: Arc::new(InMemoryHistoryStore::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_now;

    fn build_record(score: u32, total: u32) -> HistoryRecord {
        HistoryRecord::new(
            RecordId::generate(),
            fixed_now(),
            score,
            total,
            total * 10,
            BTreeMap::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn in_memory_store_keeps_newest_first() {
        let store = InMemoryHistoryStore::new();
        let first = build_record(1, 2);
        let second = build_record(2, 2);

        store.append(&first).await.unwrap();
        store.append(&second).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id(), second.id());
        assert_eq!(all[1].id(), first.id());
    }

    #[test]
    fn data_round_trips_a_record() {
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId::new("q1"), OptionKey::new('A').unwrap());
        let record = HistoryRecord::new(
            RecordId::generate(),
            fixed_now(),
            1,
            2,
            12,
            answers,
        )
        .unwrap();

        let data = HistoryRecordData::from_record(&record);
        let back = data.into_record().unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn data_rejects_tampered_credit() {
        let record = build_record(2, 3);
        let mut data = HistoryRecordData::from_record(&record);
        data.credit = 7;
        assert!(data.into_record().is_err());
    }
}
