use sqlx::Row;

use quiz_core::model::HistoryRecord;

use super::SqliteRepository;
use crate::repository::{HistoryRecordData, HistoryStore, StorageError};

/// Well-known key the serialized history list lives under.
const HISTORY_KEY: &str = "quiz_history";

fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn decode(raw: &str) -> Result<Vec<HistoryRecordData>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

#[async_trait::async_trait]
impl HistoryStore for SqliteRepository {
    async fn append(&self, record: &HistoryRecord) -> Result<(), StorageError> {
        // The whole log is one blob under a single key: read it, prepend the
        // new record, write it back wholesale. The transaction keeps the
        // read-modify-write atomic against other pool connections.
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(HISTORY_KEY)
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?;

        let mut entries = match row {
            Some(row) => decode(&row.try_get::<String, _>("value").map_err(ser)?)?,
            None => Vec::new(),
        };
        entries.insert(0, HistoryRecordData::from_record(record));
        let blob = serde_json::to_string(&entries).map_err(ser)?;

        sqlx::query(
            r"
                INSERT INTO kv_store (key, value)
                VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
            ",
        )
        .bind(HISTORY_KEY)
        .bind(blob)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<HistoryRecord>, StorageError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(HISTORY_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(Vec::new());
        };
        let raw: String = row.try_get("value").map_err(ser)?;

        let entries = decode(&raw)?;
        let mut records = Vec::with_capacity(entries.len());
        for data in entries {
            records.push(data.into_record().map_err(ser)?);
        }
        Ok(records)
    }
}
