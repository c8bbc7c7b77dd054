// src/placement/service.rs

//! Orchestration of the placement flow over a `PlacementStore`.
//!
//! Handlers only translate HTTP to these calls. Every rule that needs the
//! store (ownership, single active session, atomic completion and retake)
//! is enforced here or by the store itself.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use validator::Validate;

use crate::{
    config::PlacementSettings,
    models::{
        placement::{PlacementCache, PlacementStatistics},
        question::{Page, PublicQuestion, Question, QuestionFilter, QuestionPayload},
        session::{
            AnswerResponse, NewSession, SessionQuestionsResponse, SubmitAnswerRequest, TestSession,
        },
    },
    placement::{
        bank::sample,
        cache::sync_user_placement_cache,
        error::{PlacementError, PlacementResult},
        statistics,
    },
    store::PlacementStore,
};

#[derive(Clone)]
pub struct PlacementService {
    store: Arc<dyn PlacementStore>,
    settings: Arc<PlacementSettings>,
}

impl PlacementService {
    pub fn new(store: Arc<dyn PlacementStore>, settings: PlacementSettings) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
        }
    }

    /// Loads a session and checks that `user_id` owns it.
    async fn owned_session(&self, user_id: i64, session_id: i64) -> PlacementResult<TestSession> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| PlacementError::NotFound(format!("session {} not found", session_id)))?;
        session.ensure_owner(user_id)?;
        Ok(session)
    }

    fn questions_response(session: &TestSession, questions: &[Question]) -> SessionQuestionsResponse {
        SessionQuestionsResponse {
            session_id: session.id,
            attempt_number: session.attempt_number,
            status: session.status,
            started_at: session.started_at,
            expires_at: session.expires_at,
            answered_question_ids: session.attempts.iter().map(|a| a.question_id).collect(),
            questions: questions.iter().map(PublicQuestion::from).collect(),
        }
    }

    /// Bank records of the session's questions in presentation order.
    /// Questions deleted since sampling are skipped.
    async fn ordered_questions(&self, session: &TestSession) -> PlacementResult<Vec<Question>> {
        let mut by_id: HashMap<i64, Question> = self
            .store
            .questions_by_ids(&session.question_ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();

        Ok(session
            .question_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect())
    }

    /// Samples a fresh question set and opens a session for the user.
    pub async fn start_session(&self, user_id: i64) -> PlacementResult<SessionQuestionsResponse> {
        if let Some(active) = self.store.in_progress_session(user_id).await? {
            return Err(PlacementError::Conflict(format!(
                "session {} is already in progress",
                active.id
            )));
        }

        let bank = self.store.active_questions().await?;
        let questions = {
            let mut rng = rand::thread_rng();
            sample(&bank, &self.settings.sampling, &mut rng)?
        };

        let new = NewSession::new(user_id, &questions, Utc::now(), self.settings.time_limit_grace);
        let session = self.store.create_session(new).await?;

        tracing::info!(
            "User {} started placement session {} (attempt {}, {} questions)",
            user_id,
            session.id,
            session.attempt_number,
            questions.len()
        );

        Ok(Self::questions_response(&session, &questions))
    }

    /// Resumes the user's in-progress session.
    pub async fn current_session(&self, user_id: i64) -> PlacementResult<SessionQuestionsResponse> {
        let session = self
            .store
            .in_progress_session(user_id)
            .await?
            .ok_or_else(|| PlacementError::NotFound("no session in progress".to_string()))?;
        let questions = self.ordered_questions(&session).await?;
        Ok(Self::questions_response(&session, &questions))
    }

    pub async fn session_questions(
        &self,
        user_id: i64,
        session_id: i64,
    ) -> PlacementResult<SessionQuestionsResponse> {
        let session = self.owned_session(user_id, session_id).await?;
        let questions = self.ordered_questions(&session).await?;
        Ok(Self::questions_response(&session, &questions))
    }

    /// Grades one answer and persists it with a version-checked write.
    pub async fn submit_answer(
        &self,
        user_id: i64,
        session_id: i64,
        req: SubmitAnswerRequest,
    ) -> PlacementResult<AnswerResponse> {
        req.validate()?;

        let mut session = self.owned_session(user_id, session_id).await?;
        if !session.question_ids.contains(&req.question_id) {
            return Err(PlacementError::Validation(format!(
                "question {} is not part of session {}",
                req.question_id, session.id
            )));
        }

        let question = self
            .store
            .get_question(req.question_id)
            .await?
            .ok_or_else(|| {
                PlacementError::NotFound(format!("question {} not found", req.question_id))
            })?;

        let attempt = session
            .submit_answer(&question, req.answer, req.time_spent, Utc::now())?
            .clone();
        let saved = self.store.save_session(&session).await?;

        tracing::debug!(
            "Session {}: question {} graded {} ({} pts)",
            saved.id,
            attempt.question_id,
            if attempt.is_correct { "correct" } else { "incorrect" },
            attempt.points_earned
        );

        Ok(AnswerResponse {
            question_id: attempt.question_id,
            is_correct: attempt.is_correct,
            points_earned: attempt.points_earned,
            answered: saved.attempts.len(),
            remaining: saved.unanswered().len(),
        })
    }

    /// Scores the session, assigns a level and syncs the user's placement
    /// fields in one store transaction.
    pub async fn complete_session(&self, user_id: i64, session_id: i64) -> PlacementResult<TestSession> {
        let mut session = self.owned_session(user_id, session_id).await?;
        let now = Utc::now();

        let missing = if session.is_expired(now) {
            self.store.questions_by_ids(&session.unanswered()).await?
        } else {
            Vec::new()
        };

        session.complete(&missing, &self.settings.policy, now)?;
        let cache = sync_user_placement_cache(user_id, Some(&session));
        let saved = self.store.save_completed_session(&session, &cache).await?;

        tracing::info!(
            "User {} completed session {}: {}% -> {}",
            user_id,
            saved.id,
            saved.scores.percentage_score,
            cache.level_code.as_deref().unwrap_or("-")
        );

        Ok(saved)
    }

    pub async fn cancel_session(&self, user_id: i64, session_id: i64) -> PlacementResult<TestSession> {
        let mut session = self.owned_session(user_id, session_id).await?;
        session.cancel()?;
        let saved = self.store.save_session(&session).await?;
        tracing::info!("User {} abandoned session {}", user_id, saved.id);
        Ok(saved)
    }

    pub async fn session_result(&self, user_id: i64, session_id: i64) -> PlacementResult<TestSession> {
        self.owned_session(user_id, session_id).await
    }

    /// All of the user's sessions, oldest attempt first.
    pub async fn history(&self, user_id: i64) -> PlacementResult<Vec<TestSession>> {
        self.store.sessions_for_user(user_id).await
    }

    pub async fn placement(&self, user_id: i64) -> PlacementResult<PlacementCache> {
        self.store.placement_cache(user_id).await
    }

    /// Lets the user take the test again: completed sessions become
    /// abandoned and the placement fields are cleared. Idempotent.
    pub async fn allow_retake(&self, user_id: i64) -> PlacementResult<u64> {
        let cache = sync_user_placement_cache(user_id, None);
        let changed = self.store.reset_placement(user_id, &cache).await?;
        tracing::info!("Retake allowed for user {} ({} session(s) abandoned)", user_id, changed);
        Ok(changed)
    }

    pub async fn statistics(&self) -> PlacementResult<PlacementStatistics> {
        let sessions = self.store.completed_sessions().await?;
        Ok(statistics::compute(&sessions))
    }

    pub async fn list_questions(&self, filter: &QuestionFilter) -> PlacementResult<Page<Question>> {
        self.store.list_questions(filter).await
    }

    pub async fn get_question(&self, id: i64) -> PlacementResult<Question> {
        self.store
            .get_question(id)
            .await?
            .ok_or_else(|| PlacementError::NotFound(format!("question {} not found", id)))
    }

    pub async fn create_question(&self, payload: QuestionPayload) -> PlacementResult<Question> {
        payload.validate()?;
        let question = self.store.insert_question(payload).await?;
        tracing::info!(
            "Question {} created ({}, {})",
            question.id,
            question.category,
            question.difficulty
        );
        Ok(question)
    }

    pub async fn update_question(&self, id: i64, payload: QuestionPayload) -> PlacementResult<Question> {
        payload.validate()?;
        self.store
            .update_question(id, payload)
            .await?
            .ok_or_else(|| PlacementError::NotFound(format!("question {} not found", id)))
    }

    pub async fn delete_question(&self, id: i64) -> PlacementResult<()> {
        if !self.store.delete_question(id).await? {
            return Err(PlacementError::NotFound(format!("question {} not found", id)));
        }
        tracing::info!("Question {} deleted", id);
        Ok(())
    }

    /// Loads `payloads` into the bank if it is empty. Returns how many were inserted.
    pub async fn seed_questions(&self, payloads: Vec<QuestionPayload>) -> PlacementResult<usize> {
        let existing = self.store.list_questions(&QuestionFilter::default()).await?;
        if existing.total > 0 {
            return Ok(0);
        }

        for payload in &payloads {
            payload.validate()?;
        }
        let count = payloads.len();
        for payload in payloads {
            self.store.insert_question(payload).await?;
        }
        Ok(count)
    }
}
