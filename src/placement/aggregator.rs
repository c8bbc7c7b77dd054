//! Score aggregation over a session's attempts.
//!
//! `aggregate` is a pure function of the attempt list, so a session can be
//! re-aggregated at any time (after each answer, on completion, on audit).

use std::collections::BTreeMap;

use crate::models::{
    question::{Category, Difficulty},
    session::{QuestionAttempt, ScoreBreakdown, SessionScores},
};

/// `round(part / whole * 100)`, half up, 0 when `whole` is 0.
pub fn percentage(part: i64, whole: i64) -> i32 {
    if whole <= 0 {
        return 0;
    }
    let part = part.clamp(0, whole);
    ((200 * part + whole) / (2 * whole)) as i32
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    total: i32,
    correct: i32,
}

impl Tally {
    fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    fn breakdown(self, key: &str) -> ScoreBreakdown {
        ScoreBreakdown {
            key: key.to_string(),
            total: self.total,
            correct: self.correct,
            percentage: percentage(i64::from(self.correct), i64::from(self.total)),
        }
    }
}

/// Builds totals plus category, skill and difficulty breakdowns.
///
/// Categories and difficulties are listed in declaration order, skills
/// alphabetically. Only dimension values that occur are listed.
pub fn aggregate(attempts: &[QuestionAttempt]) -> SessionScores {
    let mut by_category: BTreeMap<Category, Tally> = BTreeMap::new();
    let mut by_skill: BTreeMap<&str, Tally> = BTreeMap::new();
    let mut by_difficulty: BTreeMap<Difficulty, Tally> = BTreeMap::new();

    let mut correct_answers = 0;
    let mut total_points: i64 = 0;
    let mut earned_points: i64 = 0;

    for attempt in attempts {
        if attempt.is_correct {
            correct_answers += 1;
        }
        total_points += i64::from(attempt.max_points);
        earned_points += i64::from(attempt.points_earned);

        by_category.entry(attempt.category).or_default().record(attempt.is_correct);
        by_difficulty.entry(attempt.difficulty).or_default().record(attempt.is_correct);
        for skill in &attempt.skills_tested {
            by_skill.entry(skill.as_str()).or_default().record(attempt.is_correct);
        }
    }

    SessionScores {
        total_questions: attempts.len() as i32,
        correct_answers,
        total_points: total_points as i32,
        earned_points: earned_points as i32,
        percentage_score: percentage(earned_points, total_points),
        category_scores: by_category
            .into_iter()
            .map(|(c, t)| t.breakdown(c.as_str()))
            .collect(),
        skill_scores: by_skill.into_iter().map(|(s, t)| t.breakdown(s)).collect(),
        difficulty_scores: by_difficulty
            .into_iter()
            .map(|(d, t)| t.breakdown(d.as_str()))
            .collect(),
    }
}
