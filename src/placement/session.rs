//! Test session state machine.
//!
//! ```text
//! in-progress ──complete──▶ completed ──retake──▶ abandoned
//!      └────────cancel───────────────────────────▶ abandoned
//! ```
//! No transition leads back to `in-progress`.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::{
    models::{
        question::Question,
        session::{LevelAssignment, NewSession, QuestionAttempt, SessionStatus, TestSession},
    },
    placement::{
        aggregator::aggregate,
        error::{PlacementError, PlacementResult},
        evaluator::{Grade, grade},
        level::LevelPolicy,
    },
};

impl NewSession {
    /// Opens a session over `questions`. With `grace` set, the server-side
    /// deadline is the sum of per-question allocations plus the grace period.
    pub fn new(
        user_id: i64,
        questions: &[Question],
        started_at: DateTime<Utc>,
        grace: Option<Duration>,
    ) -> Self {
        let expires_at = grace.map(|grace| {
            let allotted: i64 = questions.iter().map(|q| i64::from(q.time_allocation)).sum();
            started_at + Duration::seconds(allotted) + grace
        });

        Self {
            user_id,
            question_ids: questions.iter().map(|q| q.id).collect(),
            started_at,
            expires_at,
        }
    }
}

impl TestSession {
    /// Materializes a freshly stored session.
    pub fn open(id: i64, attempt_number: i32, new: NewSession) -> Self {
        Self {
            id,
            user_id: new.user_id,
            status: SessionStatus::InProgress,
            attempt_number,
            question_ids: new.question_ids,
            attempts: Vec::new(),
            started_at: new.started_at,
            expires_at: new.expires_at,
            completed_at: None,
            total_time_spent: 0,
            scores: Default::default(),
            placement: None,
            version: 0,
        }
    }

    pub fn ensure_owner(&self, user_id: i64) -> PlacementResult<()> {
        if self.user_id != user_id {
            return Err(PlacementError::Forbidden(
                "session belongs to another user".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }

    pub fn is_answered(&self, question_id: i64) -> bool {
        self.attempts.iter().any(|a| a.question_id == question_id)
    }

    /// Sampled question ids without an attempt yet, in presentation order.
    pub fn unanswered(&self) -> Vec<i64> {
        self.question_ids
            .iter()
            .copied()
            .filter(|id| !self.is_answered(*id))
            .collect()
    }

    fn ensure_in_progress(&self) -> PlacementResult<()> {
        if self.status != SessionStatus::InProgress {
            return Err(PlacementError::Validation(format!(
                "session {} is {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    fn record(&mut self, question: &Question, answer: Value, outcome: Grade, time_spent: i32, now: DateTime<Utc>) {
        self.attempts.push(QuestionAttempt {
            question_id: question.id,
            user_answer: answer,
            is_correct: outcome.is_correct,
            credit: outcome.credit,
            points_earned: outcome.points_earned.min(question.points),
            max_points: question.points,
            time_spent: time_spent.max(0),
            category: question.category,
            difficulty: question.difficulty,
            skills_tested: question.skills_tested.clone(),
            answered_at: now,
        });
    }

    /// Grades and records an answer, then refreshes the running scores.
    pub fn submit_answer(
        &mut self,
        question: &Question,
        answer: Value,
        time_spent: i32,
        now: DateTime<Utc>,
    ) -> PlacementResult<&QuestionAttempt> {
        self.ensure_in_progress()?;

        if !self.question_ids.contains(&question.id) {
            return Err(PlacementError::Validation(format!(
                "question {} is not part of session {}",
                question.id, self.id
            )));
        }
        if self.is_answered(question.id) {
            return Err(PlacementError::Validation(format!(
                "question {} has already been answered",
                question.id
            )));
        }
        if self.is_expired(now) {
            return Err(PlacementError::Validation(
                "the time limit for this session has passed".to_string(),
            ));
        }

        let outcome = grade(question, &answer);
        self.record(question, answer, outcome, time_spent, now);
        self.scores = aggregate(&self.attempts);

        // just pushed
        Ok(&self.attempts[self.attempts.len() - 1])
    }

    /// Finalizes the session: aggregate, assign a level, mark completed.
    ///
    /// Every question must be answered unless the deadline has passed, in
    /// which case the rest are recorded as unanswered. `unanswered_questions`
    /// must hold the bank records for those ids.
    pub fn complete(
        &mut self,
        unanswered_questions: &[Question],
        policy: &LevelPolicy,
        now: DateTime<Utc>,
    ) -> PlacementResult<&LevelAssignment> {
        self.ensure_in_progress()?;

        let missing = self.unanswered();
        if !missing.is_empty() {
            if !self.is_expired(now) {
                return Err(PlacementError::Validation(format!(
                    "{} question(s) still unanswered",
                    missing.len()
                )));
            }
            for id in missing {
                let question = unanswered_questions
                    .iter()
                    .find(|q| q.id == id)
                    .ok_or_else(|| PlacementError::NotFound(format!("question {} not found", id)))?;
                self.record(question, Value::Null, Grade::unanswered(), 0, now);
            }
        }

        let scores = aggregate(&self.attempts);
        let assignment = policy.assign(scores.percentage_score, &scores.category_scores);

        self.scores = scores;
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        self.total_time_spent = (now - self.started_at).num_seconds().clamp(0, i64::from(i32::MAX)) as i32;

        Ok(self.placement.insert(assignment))
    }

    /// User-initiated cancel of an in-progress session. Keeps all attempts.
    pub fn cancel(&mut self) -> PlacementResult<()> {
        self.ensure_in_progress()?;
        self.status = SessionStatus::Abandoned;
        Ok(())
    }

    /// Retake transition: completed sessions become abandoned.
    /// Returns whether the status changed.
    pub fn abandon_for_retake(&mut self) -> bool {
        if self.status == SessionStatus::Completed {
            self.status = SessionStatus::Abandoned;
            true
        } else {
            false
        }
    }
}
