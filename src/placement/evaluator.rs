//! Answer evaluation.
//!
//! Pure function: (question, submitted answer) -> grade. Dispatch is an
//! exhaustive match on the question kind. A malformed answer never errors;
//! it grades as incorrect with zero points.

use std::collections::HashSet;

use serde_json::Value;

use crate::models::question::{ComprehensionKey, MatchingKey, Question, QuestionKind};

/// Outcome of grading one answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grade {
    pub is_correct: bool,
    /// Fraction of the question answered correctly, in [0, 1].
    pub credit: f64,
    pub points_earned: i32,
}

impl Grade {
    fn all_or_nothing(is_correct: bool, points: i32) -> Self {
        Grade {
            is_correct,
            credit: if is_correct { 1.0 } else { 0.0 },
            points_earned: if is_correct { points.max(0) } else { 0 },
        }
    }

    /// Grade recorded for a question left unanswered.
    pub fn unanswered() -> Self {
        Self::all_or_nothing(false, 0)
    }
}

/// Grades `answer` against the question's answer key.
pub fn grade(question: &Question, answer: &Value) -> Grade {
    let points = question.points;
    match &question.kind {
        QuestionKind::DefinitionChoice(key)
        | QuestionKind::TrueFalse(key)
        | QuestionKind::FillInBlank(key)
        | QuestionKind::UsageInSentence(key) => {
            Grade::all_or_nothing(label_matches(answer, &key.correct_answer), points)
        }
        QuestionKind::AcronymMatching(key) => grade_matching(key, answer, points),
        QuestionKind::Comprehension(key) => grade_comprehension(key, answer, points),
    }
}

fn label_matches(answer: &Value, correct: &str) -> bool {
    answer
        .as_str()
        .is_some_and(|given| given.trim() == correct.trim())
}

/// Accepts `[{"leftId": .., "rightId": ..}, ..]` or `{"<leftId>": "<rightId>", ..}`.
fn submitted_pairs(answer: &Value) -> Option<HashSet<(&str, &str)>> {
    match answer {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                let left = item.get("leftId")?.as_str()?;
                let right = item.get("rightId")?.as_str()?;
                Some((left, right))
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(left, right)| Some((left.as_str(), right.as_str()?)))
            .collect(),
        _ => None,
    }
}

fn grade_matching(key: &MatchingKey, answer: &Value, points: i32) -> Grade {
    let Some(submitted) = submitted_pairs(answer) else {
        return Grade::all_or_nothing(false, points);
    };

    let expected: HashSet<(&str, &str)> = key
        .correct_matches
        .iter()
        .map(|pair| (pair.left_id.as_str(), pair.right_id.as_str()))
        .collect();

    Grade::all_or_nothing(submitted == expected, points)
}

/// `points * correct / total`, rounded half up, clamped to `[0, points]`.
fn prorate(points: i32, correct: usize, total: usize) -> i32 {
    if total == 0 || points <= 0 {
        return 0;
    }
    let points = i64::from(points);
    let correct = correct.min(total) as i64;
    let total = total as i64;
    let earned = (2 * points * correct + total) / (2 * total);
    earned.clamp(0, points) as i32
}

fn grade_comprehension(key: &ComprehensionKey, answer: &Value, points: i32) -> Grade {
    let Some(items) = answer.as_array() else {
        return Grade::all_or_nothing(false, points);
    };

    let total = key.sub_questions.len();
    if total == 0 {
        return Grade::all_or_nothing(false, points);
    }

    let correct = key
        .sub_questions
        .iter()
        .enumerate()
        .filter(|(i, sub)| {
            items
                .get(*i)
                .is_some_and(|given| label_matches(given, &sub.correct_answer))
        })
        .count();

    Grade {
        is_correct: correct == total,
        credit: correct as f64 / total as f64,
        points_earned: prorate(points, correct, total),
    }
}
