// src/models/session.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::{Category, Difficulty, PublicQuestion, UnknownVariant};

/// Lifecycle of a test session.
/// `InProgress` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in-progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            "abandoned" => Ok(SessionStatus::Abandoned),
            other => Err(UnknownVariant {
                kind: "session status",
                value: other.to_string(),
            }),
        }
    }
}

/// Proficiency level with its CEFR-style code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Beginner, Level::Intermediate, Level::Advanced];

    pub fn code(&self) -> &'static str {
        match self {
            Level::Beginner => "A1-A2",
            Level::Intermediate => "B1-B2",
            Level::Advanced => "C1-C2",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

impl FromStr for Level {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "level",
                value: s.to_string(),
            })
    }
}

/// One graded answer inside a session.
///
/// Carries a snapshot of the question's scoring attributes so the session
/// can be re-aggregated without consulting the bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAttempt {
    pub question_id: i64,
    /// Raw answer as submitted. `null` marks a question left unanswered at expiry.
    pub user_answer: serde_json::Value,
    pub is_correct: bool,
    /// Fraction of the question answered correctly, in [0, 1].
    pub credit: f64,
    pub points_earned: i32,
    pub max_points: i32,
    pub time_spent: i32,
    pub category: Category,
    pub difficulty: Difficulty,
    pub skills_tested: Vec<String>,
    pub answered_at: DateTime<Utc>,
}

/// Aggregate over one dimension value (a category, skill or difficulty).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub key: String,
    pub total: i32,
    pub correct: i32,
    pub percentage: i32,
}

/// Totals and breakdowns produced by the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionScores {
    pub total_questions: i32,
    pub correct_answers: i32,
    pub total_points: i32,
    pub earned_points: i32,
    pub percentage_score: i32,
    pub category_scores: Vec<ScoreBreakdown>,
    pub skill_scores: Vec<ScoreBreakdown>,
    pub difficulty_scores: Vec<ScoreBreakdown>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Output of the level assigner, written onto a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelAssignment {
    pub assigned_level: Level,
    pub level_code: String,
    pub strength_areas: Vec<String>,
    pub improvement_areas: Vec<String>,
    pub feedback: Feedback,
}

/// One user's placement test attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSession {
    pub id: i64,
    pub user_id: i64,
    pub status: SessionStatus,
    pub attempt_number: i32,
    /// Sampled questions, in presentation order.
    pub question_ids: Vec<i64>,
    pub attempts: Vec<QuestionAttempt>,
    pub started_at: DateTime<Utc>,
    /// Server-side deadline, present when time limits are enforced.
    pub expires_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_time_spent: i32,
    #[serde(flatten)]
    pub scores: SessionScores,
    #[serde(flatten)]
    pub placement: Option<LevelAssignment>,
    /// Optimistic concurrency counter, bumped on every store write.
    #[serde(skip)]
    pub version: i32,
}

/// A session about to be persisted; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: i64,
    pub question_ids: Vec<i64>,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// DTO for answering one question.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub question_id: i64,
    /// Shape depends on the question type; malformed shapes grade as incorrect.
    #[serde(default)]
    pub answer: serde_json::Value,
    /// Client-reported seconds spent (advisory).
    #[serde(default)]
    #[validate(range(min = 0, max = 86400))]
    pub time_spent: i32,
}

/// Response for a started or resumed session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuestionsResponse {
    pub session_id: i64,
    pub attempt_number: i32,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub answered_question_ids: Vec<i64>,
    pub questions: Vec<PublicQuestion>,
}

/// Response after grading a single answer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub question_id: i64,
    pub is_correct: bool,
    pub points_earned: i32,
    pub answered: usize,
    pub remaining: usize,
}
