use chrono::{DateTime, Utc};
use std::sync::Arc;

use quiz_core::model::{HistoryRecord, RecordId};
use storage::repository::HistoryStore;

use crate::error::SessionError;

/// Presentation-agnostic list item for one history record.
///
/// This is intentionally **not** a UI view-model:
/// - no pre-formatted strings
/// - no localization assumptions
///
/// The UI may format timestamps and credit (e.g. as currency) as needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryListItem {
    pub id: RecordId,
    pub recorded_at: DateTime<Utc>,

    pub score: u32,
    pub total: u32,
    pub credit: u32,
    pub duration_secs: u32,
}

impl HistoryListItem {
    #[must_use]
    pub fn from_record(record: &HistoryRecord) -> Self {
        Self {
            id: record.id(),
            recorded_at: record.recorded_at(),
            score: record.score(),
            total: record.total(),
            credit: record.credit(),
            duration_secs: record.duration_secs(),
        }
    }
}

/// Results-view facade that hides the history store from the UI layer.
#[derive(Clone)]
pub struct HistoryService {
    history: Arc<dyn HistoryStore>,
}

impl HistoryService {
    #[must_use]
    pub fn new(history: Arc<dyn HistoryStore>) -> Self {
        Self { history }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(storage::repository::InMemoryHistoryStore::new()))
    }

    /// Load the full history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn list_history(&self) -> Result<Vec<HistoryListItem>, SessionError> {
        let records = self.history.load_all().await?;
        Ok(records.iter().map(HistoryListItem::from_record).collect())
    }

    /// The most recent record, if any session completed yet.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn latest(&self) -> Result<Option<HistoryListItem>, SessionError> {
        let records = self.history.load_all().await?;
        Ok(records.first().map(HistoryListItem::from_record))
    }

    /// Sum of the credit earned across the whole history.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn total_credit(&self) -> Result<u64, SessionError> {
        let records = self.history.load_all().await?;
        Ok(records.iter().map(|record| u64::from(record.credit())).sum())
    }
}
