//! Level assignment and feedback generation.

use thiserror::Error;

use crate::models::{
    question::Category,
    session::{Feedback, Level, LevelAssignment, ScoreBreakdown},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("level thresholds must satisfy 0 <= intermediate ({intermediate}) < advanced ({advanced}) <= 100")]
    LevelThresholds { intermediate: i32, advanced: i32 },
    #[error("area thresholds must satisfy 0 <= improvement ({improvement}) <= strength ({strength}) <= 100")]
    AreaThresholds { improvement: i32, strength: i32 },
}

/// Cut points used to place a test taker. All values are percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelPolicy {
    /// Minimum score for `advanced`.
    pub advanced_min: i32,
    /// Minimum score for `intermediate`.
    pub intermediate_min: i32,
    /// Category percentage at or above which the category is a strength.
    pub strength_min: i32,
    /// Category percentage below which the category needs improvement.
    pub improvement_below: i32,
}

impl Default for LevelPolicy {
    fn default() -> Self {
        Self {
            advanced_min: 80,
            intermediate_min: 60,
            strength_min: 75,
            improvement_below: 50,
        }
    }
}

impl LevelPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !(0 <= self.intermediate_min
            && self.intermediate_min < self.advanced_min
            && self.advanced_min <= 100)
        {
            return Err(PolicyError::LevelThresholds {
                intermediate: self.intermediate_min,
                advanced: self.advanced_min,
            });
        }
        if !(0 <= self.improvement_below
            && self.improvement_below <= self.strength_min
            && self.strength_min <= 100)
        {
            return Err(PolicyError::AreaThresholds {
                improvement: self.improvement_below,
                strength: self.strength_min,
            });
        }
        Ok(())
    }

    pub fn level_for(&self, percentage: i32) -> Level {
        if percentage >= self.advanced_min {
            Level::Advanced
        } else if percentage >= self.intermediate_min {
            Level::Intermediate
        } else {
            Level::Beginner
        }
    }

    /// Deterministic: the same inputs always produce the same assignment.
    pub fn assign(&self, percentage: i32, category_scores: &[ScoreBreakdown]) -> LevelAssignment {
        let level = self.level_for(percentage);

        let strengths: Vec<&ScoreBreakdown> = category_scores
            .iter()
            .filter(|b| b.percentage >= self.strength_min)
            .collect();
        let improvements: Vec<&ScoreBreakdown> = category_scores
            .iter()
            .filter(|b| b.percentage < self.improvement_below)
            .collect();

        let feedback = Feedback {
            summary: summary(level, percentage, strengths.len(), improvements.len()),
            strengths: strengths
                .iter()
                .map(|b| format!("Strong performance in {} ({}%)", label(&b.key), b.percentage))
                .collect(),
            weaknesses: improvements
                .iter()
                .map(|b| format!("Needs more practice in {} ({}%)", label(&b.key), b.percentage))
                .collect(),
            recommendations: recommendations(level, &improvements),
        };

        LevelAssignment {
            assigned_level: level,
            level_code: level.code().to_string(),
            strength_areas: strengths.iter().map(|b| b.key.clone()).collect(),
            improvement_areas: improvements.iter().map(|b| b.key.clone()).collect(),
            feedback,
        }
    }
}

fn label(key: &str) -> String {
    key.parse::<Category>()
        .map(|c| c.label().to_string())
        .unwrap_or_else(|_| key.to_string())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

fn summary(level: Level, percentage: i32, strengths: usize, improvements: usize) -> String {
    let placed = format!(
        "You scored {}% and have been placed at the {} level ({}).",
        percentage,
        level.as_str(),
        level.code()
    );
    match (strengths, improvements) {
        (0, 0) => format!("{} Your results were consistent across all categories.", placed),
        (s, 0) => format!("{} You showed strength in {}.", placed, plural(s, "area")),
        (0, i) => format!("{} We found {} to focus on.", placed, plural(i, "area")),
        (s, i) => format!(
            "{} You showed strength in {} and have {} to focus on.",
            placed,
            plural(s, "area"),
            plural(i, "area")
        ),
    }
}

fn recommendations(level: Level, improvements: &[&ScoreBreakdown]) -> Vec<String> {
    let mut out: Vec<String> = improvements
        .iter()
        .map(|b| format!("Review the fundamentals of {}", label(&b.key)))
        .collect();

    out.push(
        match level {
            Level::Beginner => "Start with the beginner modules to build core vocabulary",
            Level::Intermediate => "Continue with intermediate modules and practice applying terms in context",
            Level::Advanced => "Move on to advanced modules and specialised topics",
        }
        .to_string(),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, percentage: i32) -> ScoreBreakdown {
        ScoreBreakdown {
            key: key.to_string(),
            total: 4,
            correct: 0,
            percentage,
        }
    }

    #[test]
    fn thresholds_place_at_the_boundaries() {
        let policy = LevelPolicy::default();

        let advanced = policy.assign(85, &[]);
        assert_eq!(advanced.assigned_level, Level::Advanced);
        assert_eq!(advanced.level_code, "C1-C2");

        assert_eq!(policy.assign(80, &[]).assigned_level, Level::Advanced);
        assert_eq!(policy.assign(79, &[]).assigned_level, Level::Intermediate);

        let intermediate = policy.assign(60, &[]);
        assert_eq!(intermediate.assigned_level, Level::Intermediate);
        assert_eq!(intermediate.level_code, "B1-B2");

        let beginner = policy.assign(59, &[]);
        assert_eq!(beginner.assigned_level, Level::Beginner);
        assert_eq!(beginner.level_code, "A1-A2");
    }

    #[test]
    fn custom_thresholds_move_the_cut_points() {
        let policy = LevelPolicy {
            advanced_min: 90,
            intermediate_min: 50,
            ..Default::default()
        };
        assert_eq!(policy.level_for(85), Level::Intermediate);
        assert_eq!(policy.level_for(50), Level::Intermediate);
        assert_eq!(policy.level_for(49), Level::Beginner);
    }

    #[test]
    fn categories_split_into_strengths_and_improvements() {
        let scores = vec![
            entry("database", 75),
            entry("security", 74),
            entry("networking", 50),
            entry("algorithms", 49),
        ];

        let result = LevelPolicy::default().assign(62, &scores);

        assert_eq!(result.strength_areas, vec!["database"]);
        assert_eq!(result.improvement_areas, vec!["algorithms"]);
        assert_eq!(result.feedback.strengths, vec!["Strong performance in Databases (75%)"]);
        assert_eq!(result.feedback.weaknesses, vec!["Needs more practice in Algorithms (49%)"]);
        assert!(result.feedback.summary.contains("intermediate level (B1-B2)"));
        assert!(result.feedback.summary.contains("1 area and have 1 area"));
        assert_eq!(result.feedback.recommendations.len(), 2);
    }

    #[test]
    fn feedback_is_deterministic() {
        let scores = vec![entry("programming", 100), entry("ai-ml", 0)];
        let policy = LevelPolicy::default();
        assert_eq!(policy.assign(50, &scores), policy.assign(50, &scores));
    }

    #[test]
    fn policy_validation_rejects_inverted_thresholds() {
        let inverted = LevelPolicy {
            advanced_min: 60,
            intermediate_min: 80,
            ..Default::default()
        };
        assert!(matches!(inverted.validate(), Err(PolicyError::LevelThresholds { .. })));

        let areas = LevelPolicy {
            strength_min: 40,
            improvement_below: 50,
            ..Default::default()
        };
        assert!(matches!(areas.validate(), Err(PolicyError::AreaThresholds { .. })));

        assert!(LevelPolicy::default().validate().is_ok());
    }
}
