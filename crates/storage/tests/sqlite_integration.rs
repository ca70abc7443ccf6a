use std::collections::BTreeMap;

use quiz_core::model::{HistoryRecord, OptionKey, QuestionId, RecordId};
use quiz_core::time::fixed_now;
use storage::repository::HistoryStore;
use storage::sqlite::SqliteRepository;

fn build_record(score: u32, total: u32, duration_secs: u32) -> HistoryRecord {
    let mut answers = BTreeMap::new();
    for n in 0..score {
        answers.insert(
            QuestionId::new(format!("q{}", n + 1)),
            OptionKey::new('A').unwrap(),
        );
    }
    HistoryRecord::new(
        RecordId::generate(),
        fixed_now(),
        score,
        total,
        duration_secs,
        answers,
    )
    .unwrap()
}

#[tokio::test]
async fn fresh_database_has_empty_history() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_empty?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let all = repo.load_all().await.expect("load");
    assert!(all.is_empty());
}

#[tokio::test]
async fn append_round_trips_through_the_blob() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let older = build_record(1, 3, 25);
    let newer = build_record(3, 3, 18);
    repo.append(&older).await.expect("append older");
    repo.append(&newer).await.expect("append newer");

    let all = repo.load_all().await.expect("load");
    assert_eq!(all.len(), 2);

    // Newest first, fields intact after the JSON round trip.
    assert_eq!(all[0], newer);
    assert_eq!(all[1], older);
    assert_eq!(all[0].credit(), 30);
    assert_eq!(all[1].answers().len(), 1);
}

#[tokio::test]
async fn migrate_twice_keeps_existing_history() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_idempotent?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");

    let record = build_record(2, 2, 9);
    repo.append(&record).await.expect("append");

    repo.migrate().await.expect("second migrate");
    let all = repo.load_all().await.expect("load");
    assert_eq!(all, vec![record]);
}
