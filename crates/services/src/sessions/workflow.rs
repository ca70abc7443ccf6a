use std::sync::Arc;

use quiz_core::model::{HistoryRecord, OptionKey, RecordId};
use storage::repository::{HistoryStore, StorageError};

use super::service::{AnswerOutcome, QuizSession, TickOutcome};
use crate::Clock;
use crate::catalog::QuestionCatalog;
use crate::error::SessionError;

/// Result of answering the current question through the loop service.
#[derive(Debug)]
pub struct SessionAnswerResult {
    pub outcome: AnswerOutcome,
    /// The finished record, present from the finish transition on.
    pub record: Option<HistoryRecord>,
    /// Set when the finished record could not be appended to the history
    /// log. The session still reports finished; `finalize_record` retries.
    pub persistence_error: Option<StorageError>,
}

/// Result of one driver tick through the loop service.
#[derive(Debug)]
pub struct SessionTickResult {
    pub outcome: TickOutcome,
    pub record: Option<HistoryRecord>,
    pub persistence_error: Option<StorageError>,
}

/// Orchestrates session start, answering, and the per-second countdown.
///
/// Owns the clock and the collaborators; the state machine itself stays pure
/// and is held by the caller, so one driver at a time applies transitions.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    catalog: Arc<dyn QuestionCatalog>,
    history: Arc<dyn HistoryStore>,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn QuestionCatalog>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            clock,
            catalog,
            history,
        }
    }

    /// Load the catalog and start a fresh session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Catalog` when the catalog cannot be loaded and
    /// `SessionError::EmptyCatalog` when it holds no questions.
    pub async fn start_session(&self) -> Result<QuizSession, SessionError> {
        let questions = self.catalog.load().await?;
        QuizSession::start(questions, self.clock.now())
    }

    /// Answer the current question; on the finish transition, append the
    /// history record exactly once.
    ///
    /// A failed append is reported in the result, not returned as an error:
    /// completion is never blocked on storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when the submission itself is rejected.
    pub async fn answer_current(
        &self,
        session: &mut QuizSession,
        chosen: Option<OptionKey>,
    ) -> Result<SessionAnswerResult, SessionError> {
        let index = session.current_index();
        let outcome = session.submit_answer(index, chosen, self.clock.now())?;
        let persistence_error = self.persist_if_finished(session).await?;

        Ok(SessionAnswerResult {
            outcome,
            record: session.record().cloned(),
            persistence_error,
        })
    }

    /// Drive one 1-second tick. A timeout on the last question finishes the
    /// session and appends history just like a manual answer.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` only for record-construction failures; stray
    /// ticks surface as `TickOutcome::Ignored`.
    pub async fn tick(&self, session: &mut QuizSession) -> Result<SessionTickResult, SessionError> {
        let outcome = session.tick(self.clock.now());
        let persistence_error = self.persist_if_finished(session).await?;

        Ok(SessionTickResult {
            outcome,
            record: session.record().cloned(),
            persistence_error,
        })
    }

    /// Retry history persistence for a finished session.
    ///
    /// Idempotent once the record reached the log: later calls return the
    /// same record id without appending again.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFinished` if the session has not finished,
    /// or `SessionError::Storage` if the append fails again.
    pub async fn finalize_record(
        &self,
        session: &mut QuizSession,
    ) -> Result<RecordId, SessionError> {
        let record = Self::ensure_record(session)?;
        if session.is_persisted() {
            return Ok(record.id());
        }

        self.history.append(&record).await?;
        session.mark_persisted();
        Ok(record.id())
    }

    /// Build the record on first use so the id stays stable across retries.
    fn ensure_record(session: &mut QuizSession) -> Result<HistoryRecord, SessionError> {
        if let Some(record) = session.record() {
            return Ok(record.clone());
        }
        let record = session.build_record()?;
        session.set_record(record.clone());
        Ok(record)
    }

    /// Append once per finish transition. Append failures are handed back to
    /// the caller inside `Ok` so the finished state still reaches the UI.
    async fn persist_if_finished(
        &self,
        session: &mut QuizSession,
    ) -> Result<Option<StorageError>, SessionError> {
        if !session.is_finished() || session.is_persisted() {
            return Ok(None);
        }

        let record = Self::ensure_record(session)?;
        match self.history.append(&record).await {
            Ok(()) => {
                session.mark_persisted();
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(
                    record_id = %record.id(),
                    error = %err,
                    "failed to append quiz history; results remain available for retry"
                );
                Ok(Some(err))
            }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use quiz_core::model::{Choice, Question, QuestionId};
    use quiz_core::time::fixed_clock;
    use storage::repository::InMemoryHistoryStore;

    use crate::catalog::StaticCatalog;

    fn key(c: char) -> OptionKey {
        OptionKey::new(c).unwrap()
    }

    fn build_question(id: &str, correct: char) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Prompt for {id}"),
            10,
            vec![Choice::new(key('A'), "first"), Choice::new(key('B'), "second")],
            key(correct),
        )
        .unwrap()
    }

    fn build_service(store: Arc<dyn HistoryStore>) -> QuizLoopService {
        let catalog = StaticCatalog::new(vec![
            build_question("q1", 'A'),
            build_question("q2", 'B'),
        ]);
        QuizLoopService::new(fixed_clock(), Arc::new(catalog), store)
    }

    /// Store whose first append fails, simulating a transient outage.
    #[derive(Default)]
    struct FlakyHistoryStore {
        failed_once: AtomicBool,
        inner: InMemoryHistoryStore,
    }

    #[async_trait]
    impl HistoryStore for FlakyHistoryStore {
        async fn append(&self, record: &HistoryRecord) -> Result<(), StorageError> {
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(StorageError::Connection("disk unavailable".into()));
            }
            self.inner.append(record).await
        }

        async fn load_all(&self) -> Result<Vec<HistoryRecord>, StorageError> {
            self.inner.load_all().await
        }
    }

    #[tokio::test]
    async fn completed_session_appends_exactly_one_record() {
        let store = Arc::new(InMemoryHistoryStore::new());
        let service = build_service(store.clone());

        let mut session = service.start_session().await.unwrap();
        service.answer_current(&mut session, Some(key('A'))).await.unwrap();
        let result = service.answer_current(&mut session, Some(key('B'))).await.unwrap();

        assert!(result.outcome.is_finished);
        assert!(result.persistence_error.is_none());
        assert!(session.is_persisted());

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].score(), 2);
        assert_eq!(all[0].credit(), 20);
    }

    #[tokio::test]
    async fn timeout_on_the_last_question_persists_like_an_answer() {
        let store = Arc::new(InMemoryHistoryStore::new());
        let service = build_service(store.clone());

        let mut session = service.start_session().await.unwrap();
        service.answer_current(&mut session, Some(key('A'))).await.unwrap();
        for _ in 0..9 {
            let result = service.tick(&mut session).await.unwrap();
            assert!(matches!(result.outcome, TickOutcome::Counting { .. }));
        }
        let result = service.tick(&mut session).await.unwrap();

        assert!(matches!(result.outcome, TickOutcome::Expired(ref a) if a.is_finished));
        assert!(session.is_persisted());
        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].score(), 1);
    }

    #[tokio::test]
    async fn abandoned_session_writes_no_history() {
        let store = Arc::new(InMemoryHistoryStore::new());
        let service = build_service(store.clone());

        let mut session = service.start_session().await.unwrap();
        service.answer_current(&mut session, Some(key('A'))).await.unwrap();
        session.abandon();

        // A tick the driver failed to cancel in time arrives afterwards.
        let result = service.tick(&mut session).await.unwrap();
        assert_eq!(result.outcome, TickOutcome::Ignored);
        assert!(result.record.is_none());

        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_append_is_reported_and_retried_via_finalize() {
        let store = Arc::new(FlakyHistoryStore::default());
        let service = build_service(store.clone());

        let mut session = service.start_session().await.unwrap();
        service.answer_current(&mut session, Some(key('A'))).await.unwrap();
        let result = service.answer_current(&mut session, Some(key('B'))).await.unwrap();

        // The session finished even though the append failed.
        assert!(result.outcome.is_finished);
        assert!(result.persistence_error.is_some());
        assert!(!session.is_persisted());
        let record = result.record.expect("record is built on finish");
        assert!(store.load_all().await.unwrap().is_empty());

        // The retry lands the same record exactly once.
        let id = service.finalize_record(&mut session).await.unwrap();
        assert_eq!(id, record.id());
        assert!(session.is_persisted());
        assert_eq!(store.load_all().await.unwrap().len(), 1);

        let id_again = service.finalize_record(&mut session).await.unwrap();
        assert_eq!(id_again, id);
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn finalize_rejects_an_unfinished_session() {
        let store = Arc::new(InMemoryHistoryStore::new());
        let service = build_service(store.clone());

        let mut session = service.start_session().await.unwrap();
        let err = service.finalize_record(&mut session).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFinished));
    }
}
