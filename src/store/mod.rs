// src/store/mod.rs

//! Persistence seam for the placement engine.
//!
//! Both implementations uphold the same atomicity rules:
//! * at most one in-progress session per user (`create_session`);
//! * a question referenced by an in-progress session cannot be deleted;
//! * session writes are version-checked (`save_session`);
//! * completion and retake write the session change and the user's
//!   placement cache as one unit.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    models::{
        placement::PlacementCache,
        question::{Page, Question, QuestionFilter, QuestionPayload},
        session::{NewSession, TestSession},
    },
    placement::error::{PlacementError, PlacementResult},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait PlacementStore: Send + Sync {
    async fn list_questions(&self, filter: &QuestionFilter) -> PlacementResult<Page<Question>>;

    async fn active_questions(&self) -> PlacementResult<Vec<Question>>;

    async fn get_question(&self, id: i64) -> PlacementResult<Option<Question>>;

    /// Questions whose id is in `ids`, in no particular order. Unknown ids are skipped.
    async fn questions_by_ids(&self, ids: &[i64]) -> PlacementResult<Vec<Question>>;

    async fn insert_question(&self, payload: QuestionPayload) -> PlacementResult<Question>;

    async fn update_question(
        &self,
        id: i64,
        payload: QuestionPayload,
    ) -> PlacementResult<Option<Question>>;

    /// Removes the question. Fails with `Conflict` while an in-progress
    /// session still references it.
    async fn delete_question(&self, id: i64) -> PlacementResult<bool>;

    /// Inserts an in-progress session numbered after the user's finished ones.
    /// Fails with `Conflict` if the user already has one in progress or a
    /// sampled question no longer exists.
    async fn create_session(&self, new: NewSession) -> PlacementResult<TestSession>;

    async fn get_session(&self, id: i64) -> PlacementResult<Option<TestSession>>;

    async fn in_progress_session(&self, user_id: i64) -> PlacementResult<Option<TestSession>>;

    async fn sessions_for_user(&self, user_id: i64) -> PlacementResult<Vec<TestSession>>;

    async fn completed_sessions(&self) -> PlacementResult<Vec<TestSession>>;

    /// Writes the mutable parts of `session` if its version is current.
    /// Returns the stored session with the bumped version, or `Conflict`.
    async fn save_session(&self, session: &TestSession) -> PlacementResult<TestSession>;

    /// `save_session` plus the user's placement cache, atomically.
    async fn save_completed_session(
        &self,
        session: &TestSession,
        cache: &PlacementCache,
    ) -> PlacementResult<TestSession>;

    /// Abandons every completed session of the user and stores `cache`,
    /// atomically. Returns how many sessions changed status.
    async fn reset_placement(&self, user_id: i64, cache: &PlacementCache) -> PlacementResult<u64>;

    /// The user's cache, or cleared fields if nothing was ever stored.
    async fn placement_cache(&self, user_id: i64) -> PlacementResult<PlacementCache>;
}

fn question_in_use(id: i64) -> PlacementError {
    PlacementError::Conflict(format!(
        "question {} belongs to a session in progress, deactivate it instead",
        id
    ))
}

fn bank_changed() -> PlacementError {
    PlacementError::Conflict("question bank changed while sampling, retry".to_string())
}
