// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    models::{
        placement::PlacementCache,
        question::{Page, Question, QuestionFilter, QuestionPayload},
        session::{NewSession, SessionStatus, TestSession},
    },
    placement::error::{PlacementError, PlacementResult},
    store::{PlacementStore, bank_changed, question_in_use},
};

#[derive(Default)]
struct Inner {
    questions: BTreeMap<i64, Question>,
    sessions: BTreeMap<i64, TestSession>,
    caches: HashMap<i64, PlacementCache>,
    next_question_id: i64,
    next_session_id: i64,
}

impl Inner {
    /// Version-checked write of a session's mutable fields.
    fn write_session(&mut self, session: &TestSession) -> PlacementResult<TestSession> {
        let stored = self
            .sessions
            .get_mut(&session.id)
            .ok_or_else(|| PlacementError::NotFound(format!("session {} not found", session.id)))?;

        if stored.version != session.version {
            return Err(PlacementError::Conflict(
                "session was modified concurrently, reload and retry".to_string(),
            ));
        }

        let mut updated = session.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }
}

/// In-process store. A single lock serializes writers, which makes every
/// multi-step operation atomic. Used when no database is configured.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlacementStore for MemoryStore {
    async fn list_questions(&self, filter: &QuestionFilter) -> PlacementResult<Page<Question>> {
        let inner = self.inner.read().await;
        let matching: Vec<&Question> = inner.questions.values().filter(|q| filter.matches(q)).collect();

        Ok(Page {
            total: matching.len() as i64,
            items: matching
                .into_iter()
                .skip(filter.offset() as usize)
                .take(filter.per_page() as usize)
                .cloned()
                .collect(),
            page: filter.page(),
            per_page: filter.per_page(),
        })
    }

    async fn active_questions(&self) -> PlacementResult<Vec<Question>> {
        let inner = self.inner.read().await;
        Ok(inner.questions.values().filter(|q| q.is_active).cloned().collect())
    }

    async fn get_question(&self, id: i64) -> PlacementResult<Option<Question>> {
        Ok(self.inner.read().await.questions.get(&id).cloned())
    }

    async fn questions_by_ids(&self, ids: &[i64]) -> PlacementResult<Vec<Question>> {
        let inner = self.inner.read().await;
        Ok(ids.iter().filter_map(|id| inner.questions.get(id).cloned()).collect())
    }

    async fn insert_question(&self, payload: QuestionPayload) -> PlacementResult<Question> {
        let mut inner = self.inner.write().await;
        inner.next_question_id += 1;
        let id = inner.next_question_id;
        let now = Some(Utc::now());
        let question = payload.into_question(id, now, now);
        inner.questions.insert(id, question.clone());
        Ok(question)
    }

    async fn update_question(
        &self,
        id: i64,
        payload: QuestionPayload,
    ) -> PlacementResult<Option<Question>> {
        let mut inner = self.inner.write().await;
        let Some(existing) = inner.questions.get_mut(&id) else {
            return Ok(None);
        };
        let updated = payload.into_question(id, existing.created_at, Some(Utc::now()));
        *existing = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_question(&self, id: i64) -> PlacementResult<bool> {
        let mut inner = self.inner.write().await;
        let in_use = inner
            .sessions
            .values()
            .any(|s| s.status == SessionStatus::InProgress && s.question_ids.contains(&id));
        if in_use {
            return Err(question_in_use(id));
        }
        Ok(inner.questions.remove(&id).is_some())
    }

    async fn create_session(&self, new: NewSession) -> PlacementResult<TestSession> {
        let mut inner = self.inner.write().await;

        if !new.question_ids.iter().all(|id| inner.questions.contains_key(id)) {
            return Err(bank_changed());
        }

        let owned = inner.sessions.values().filter(|s| s.user_id == new.user_id);
        let mut finished = 0;
        for session in owned {
            if session.status == SessionStatus::InProgress {
                return Err(PlacementError::Conflict(format!(
                    "session {} is already in progress",
                    session.id
                )));
            }
            finished += 1;
        }

        inner.next_session_id += 1;
        let session = TestSession::open(inner.next_session_id, finished + 1, new);
        inner.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: i64) -> PlacementResult<Option<TestSession>> {
        Ok(self.inner.read().await.sessions.get(&id).cloned())
    }

    async fn in_progress_session(&self, user_id: i64) -> PlacementResult<Option<TestSession>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .values()
            .find(|s| s.user_id == user_id && s.status == SessionStatus::InProgress)
            .cloned())
    }

    async fn sessions_for_user(&self, user_id: i64) -> PlacementResult<Vec<TestSession>> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<TestSession> = inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.attempt_number);
        Ok(sessions)
    }

    async fn completed_sessions(&self) -> PlacementResult<Vec<TestSession>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .values()
            .filter(|s| s.status == SessionStatus::Completed)
            .cloned()
            .collect())
    }

    async fn save_session(&self, session: &TestSession) -> PlacementResult<TestSession> {
        self.inner.write().await.write_session(session)
    }

    async fn save_completed_session(
        &self,
        session: &TestSession,
        cache: &PlacementCache,
    ) -> PlacementResult<TestSession> {
        let mut inner = self.inner.write().await;
        let saved = inner.write_session(session)?;
        inner.caches.insert(cache.user_id, cache.clone());
        Ok(saved)
    }

    async fn reset_placement(&self, user_id: i64, cache: &PlacementCache) -> PlacementResult<u64> {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        for session in inner.sessions.values_mut().filter(|s| s.user_id == user_id) {
            if session.abandon_for_retake() {
                session.version += 1;
                changed += 1;
            }
        }
        inner.caches.insert(user_id, cache.clone());
        Ok(changed)
    }

    async fn placement_cache(&self, user_id: i64) -> PlacementResult<PlacementCache> {
        let inner = self.inner.read().await;
        Ok(inner
            .caches
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| PlacementCache::cleared(user_id)))
    }
}
