// tests/postgres_store_tests.rs

//! Exercises `PgStore` against a real database.
//! Each test returns early when DATABASE_URL is not set.

use chrono::Utc;
use placement_engine::{
    models::{
        placement::PlacementCache,
        question::{Category, ChoiceKey, ChoiceOption, Difficulty, QuestionKind, QuestionPayload},
        session::{NewSession, SessionStatus},
    },
    placement::{
        cache::sync_user_placement_cache, error::PlacementError, level::LevelPolicy,
    },
    store::{PgStore, PlacementStore},
};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;

async fn store() -> Option<PgStore> {
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    Some(PgStore::new(pool))
}

/// A user id unlikely to collide with other test runs.
fn fresh_user() -> i64 {
    i64::from(rand::random::<u32>()) + 1_000_000
}

fn payload(category: Category) -> QuestionPayload {
    QuestionPayload {
        prompt: "What does API stand for?".to_string(),
        category,
        difficulty: Difficulty::Easy,
        points: 2,
        time_allocation: 30,
        skills_tested: vec!["definition".to_string()],
        is_active: true,
        kind: QuestionKind::DefinitionChoice(ChoiceKey {
            options: vec![
                ChoiceOption { label: "A".to_string(), text: "Application Programming Interface".to_string() },
                ChoiceOption { label: "B".to_string(), text: "Advanced Protocol Integration".to_string() },
            ],
            correct_answer: "A".to_string(),
        }),
    }
}

#[tokio::test]
async fn question_round_trip_keeps_answer_key() {
    let Some(store) = store().await else { return };

    let created = store.insert_question(payload(Category::Programming)).await.unwrap();
    let loaded = store.get_question(created.id).await.unwrap().unwrap();
    assert_eq!(loaded.kind, created.kind);
    assert_eq!(loaded.category, Category::Programming);

    let mut changed = payload(Category::Security);
    changed.is_active = false;
    let updated = store.update_question(created.id, changed).await.unwrap().unwrap();
    assert!(!updated.is_active);

    assert!(store.delete_question(created.id).await.unwrap());
    assert!(store.get_question(created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn one_session_in_progress_per_user() {
    let Some(store) = store().await else { return };
    let user_id = fresh_user();
    let question = store.insert_question(payload(Category::Database)).await.unwrap();
    let questions = vec![question];

    let first = store
        .create_session(NewSession::new(user_id, &questions, Utc::now(), None))
        .await
        .unwrap();
    assert_eq!(first.attempt_number, 1);

    let err = store
        .create_session(NewSession::new(user_id, &questions, Utc::now(), None))
        .await
        .unwrap_err();
    assert!(matches!(err, PlacementError::Conflict(_)));
}

#[tokio::test]
async fn completion_and_retake_are_versioned_and_atomic() {
    let Some(store) = store().await else { return };
    let user_id = fresh_user();
    let question = store.insert_question(payload(Category::Networking)).await.unwrap();
    let questions = vec![question.clone()];

    let mut session = store
        .create_session(NewSession::new(user_id, &questions, Utc::now(), None))
        .await
        .unwrap();
    let stale = session.clone();

    session.submit_answer(&question, json!("A"), 5, Utc::now()).unwrap();
    let mut session = store.save_session(&session).await.unwrap();
    assert!(matches!(store.save_session(&stale).await, Err(PlacementError::Conflict(_))));

    session.complete(&[], &LevelPolicy::default(), Utc::now()).unwrap();
    let cache = sync_user_placement_cache(user_id, Some(&session));
    let saved = store.save_completed_session(&session, &cache).await.unwrap();
    assert_eq!(saved.status, SessionStatus::Completed);
    assert_eq!(saved.scores.percentage_score, 100);
    assert!(store.placement_cache(user_id).await.unwrap().placement_test_completed);

    let cleared = PlacementCache::cleared(user_id);
    assert_eq!(store.reset_placement(user_id, &cleared).await.unwrap(), 1);
    assert_eq!(store.reset_placement(user_id, &cleared).await.unwrap(), 0);
    assert_eq!(store.placement_cache(user_id).await.unwrap(), cleared);

    let next = store
        .create_session(NewSession::new(user_id, &questions, Utc::now(), None))
        .await
        .unwrap();
    assert_eq!(next.attempt_number, 2);
}

#[tokio::test]
async fn question_in_an_open_session_cannot_be_deleted() {
    let Some(store) = store().await else { return };
    let user_id = fresh_user();
    let question = store.insert_question(payload(Category::Security)).await.unwrap();

    let mut session = store
        .create_session(NewSession::new(user_id, &[question.clone()], Utc::now(), None))
        .await
        .unwrap();
    assert!(matches!(store.delete_question(question.id).await, Err(PlacementError::Conflict(_))));

    session.cancel().unwrap();
    store.save_session(&session).await.unwrap();
    assert!(store.delete_question(question.id).await.unwrap());

    let err = store
        .create_session(NewSession::new(user_id, &[question], Utc::now(), None))
        .await
        .unwrap_err();
    assert!(matches!(err, PlacementError::Conflict(_)));
}
