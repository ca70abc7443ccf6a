use std::sync::Arc;

use quiz_core::time::fixed_clock;
use services::{HistoryService, QuizLoopService, StaticCatalog, TickOutcome};
use storage::repository::{HistoryStore, InMemoryHistoryStore};

#[tokio::test]
async fn full_run_lands_one_record_in_history() {
    let store = Arc::new(InMemoryHistoryStore::new());
    let service = QuizLoopService::new(
        fixed_clock(),
        Arc::new(StaticCatalog::sample()),
        store.clone(),
    );

    let mut session = service.start_session().await.unwrap();
    let total = session.total_questions();

    while !session.is_finished() {
        let correct = session.current_question().expect("session is running").correct();
        let result = service
            .answer_current(&mut session, Some(correct))
            .await
            .unwrap();
        assert!(result.persistence_error.is_none());
    }

    let all = store.load_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].score(), u32::try_from(total).unwrap());
    assert_eq!(all[0].credit(), all[0].score() * 10);

    let history = HistoryService::new(store);
    let latest = history.latest().await.unwrap().expect("one record saved");
    assert_eq!(latest.total, u32::try_from(total).unwrap());
    assert_eq!(history.total_credit().await.unwrap(), u64::from(latest.credit));
}

#[tokio::test]
async fn mixed_answers_and_timeouts_score_only_the_correct_ones() {
    let store = Arc::new(InMemoryHistoryStore::new());
    let service = QuizLoopService::new(
        fixed_clock(),
        Arc::new(StaticCatalog::sample()),
        store.clone(),
    );

    let mut session = service.start_session().await.unwrap();

    // Answer the first question correctly, then let every later question
    // run out its ten-second countdown.
    let correct = session.current_question().unwrap().correct();
    service.answer_current(&mut session, Some(correct)).await.unwrap();

    while !session.is_finished() {
        let result = service.tick(&mut session).await.unwrap();
        assert_ne!(result.outcome, TickOutcome::Ignored);
    }

    let all = store.load_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].score(), 1);
    assert_eq!(all[0].credit(), 10);
    // Timed-out questions left no entries in the answer map.
    assert_eq!(all[0].answers().len(), 1);
}
