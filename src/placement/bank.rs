//! Question bank rules: answer-key validation for admin writes and balanced
//! sampling of a test's question set.

use std::{
    borrow::Cow,
    collections::{BTreeMap, HashSet},
};

use rand::{Rng, seq::SliceRandom};
use validator::ValidationError;

use crate::{
    models::question::{
        Category, ChoiceOption, ComprehensionKey, Difficulty, MatchingKey, Question, QuestionKind,
    },
    placement::error::{PlacementError, PlacementResult},
};

/// How many questions to draw per bucket.
///
/// Difficulty quotas take precedence. When both maps are set, category quotas
/// only steer which questions fill each difficulty tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingCriteria {
    pub per_difficulty: BTreeMap<Difficulty, usize>,
    pub per_category: BTreeMap<Category, usize>,
    /// Minimum viable test length.
    pub min_questions: usize,
}

impl Default for SamplingCriteria {
    fn default() -> Self {
        Self {
            per_difficulty: BTreeMap::from([
                (Difficulty::Easy, 4),
                (Difficulty::Medium, 4),
                (Difficulty::Hard, 2),
            ]),
            per_category: BTreeMap::new(),
            min_questions: 5,
        }
    }
}

impl SamplingCriteria {
    /// Number of questions a full sample contains.
    pub fn target(&self) -> usize {
        if self.per_difficulty.is_empty() {
            self.per_category.values().sum()
        } else {
            self.per_difficulty.values().sum()
        }
    }
}

/// Tiers consulted, in order, when a difficulty bucket runs short.
fn fallback_tiers(difficulty: Difficulty) -> [Difficulty; 3] {
    match difficulty {
        Difficulty::Easy => [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard],
        Difficulty::Medium => [Difficulty::Medium, Difficulty::Easy, Difficulty::Hard],
        Difficulty::Hard => [Difficulty::Hard, Difficulty::Medium, Difficulty::Easy],
    }
}

/// Categories consulted, in order, when a category bucket runs short.
fn fallback_categories(category: Category) -> impl Iterator<Item = Category> {
    let start = Category::ALL
        .iter()
        .position(|c| *c == category)
        .unwrap_or(0);
    (0..Category::ALL.len()).map(move |offset| Category::ALL[(start + offset) % Category::ALL.len()])
}

struct Picker<'a> {
    candidates: Vec<&'a Question>,
    taken: Vec<bool>,
    category_left: BTreeMap<Category, usize>,
    picked: Vec<&'a Question>,
}

impl<'a> Picker<'a> {
    fn new(candidates: Vec<&'a Question>, category_quota: &BTreeMap<Category, usize>) -> Self {
        let taken = vec![false; candidates.len()];
        Self {
            candidates,
            taken,
            category_left: category_quota.clone(),
            picked: Vec::new(),
        }
    }

    fn category_open(&self, category: Category) -> bool {
        self.category_left.get(&category).is_some_and(|left| *left > 0)
    }

    /// Takes up to `limit` untaken candidates accepted by `accept`, preferring
    /// categories whose quota is still open. Returns how many were taken.
    fn take(&mut self, limit: usize, accept: impl Fn(&Question) -> bool) -> usize {
        let mut count = 0;
        for prefer_open in [true, false] {
            for i in 0..self.candidates.len() {
                if count == limit {
                    return count;
                }
                let question = self.candidates[i];
                if self.taken[i] || !accept(question) {
                    continue;
                }
                if prefer_open && !self.category_open(question.category) {
                    continue;
                }
                self.taken[i] = true;
                if let Some(left) = self.category_left.get_mut(&question.category) {
                    *left = left.saturating_sub(1);
                }
                self.picked.push(question);
                count += 1;
            }
        }
        count
    }
}

/// Draws a balanced question set from `bank`.
///
/// Only active questions are eligible and each id appears at most once.
/// Buckets that run short borrow from adjacent buckets. The result is ordered
/// easy to hard and random within a tier.
pub fn sample<R: Rng + ?Sized>(
    bank: &[Question],
    criteria: &SamplingCriteria,
    rng: &mut R,
) -> PlacementResult<Vec<Question>> {
    let mut seen = HashSet::new();
    let mut candidates: Vec<&Question> = bank
        .iter()
        .filter(|q| q.is_active && seen.insert(q.id))
        .collect();

    if candidates.is_empty() {
        return Err(PlacementError::InsufficientQuestions(
            "the question bank has no active questions".to_string(),
        ));
    }

    candidates.shuffle(rng);
    let mut picker = Picker::new(candidates, &criteria.per_category);

    if !criteria.per_difficulty.is_empty() {
        let mut shortfall = Vec::new();
        for (&difficulty, &wanted) in &criteria.per_difficulty {
            let got = picker.take(wanted, |q| q.difficulty == difficulty);
            if got < wanted {
                shortfall.push((difficulty, wanted - got));
            }
        }
        for (difficulty, mut missing) in shortfall {
            for tier in fallback_tiers(difficulty).into_iter().skip(1) {
                if missing == 0 {
                    break;
                }
                missing -= picker.take(missing, |q| q.difficulty == tier);
            }
        }
    } else {
        let mut shortfall = Vec::new();
        for (&category, &wanted) in &criteria.per_category {
            let got = picker.take(wanted, |q| q.category == category);
            if got < wanted {
                shortfall.push((category, wanted - got));
            }
        }
        for (category, mut missing) in shortfall {
            for other in fallback_categories(category).skip(1) {
                if missing == 0 {
                    break;
                }
                missing -= picker.take(missing, |q| q.category == other);
            }
        }
    }

    let mut picked = picker.picked;
    // Stable: keeps the shuffled order inside each tier.
    picked.sort_by_key(|q| q.difficulty);

    if picked.is_empty() || picked.len() < criteria.min_questions {
        return Err(PlacementError::InsufficientQuestions(format!(
            "requested {} questions (minimum {}), the bank can supply {}",
            criteria.target(),
            criteria.min_questions,
            picked.len()
        )));
    }

    tracing::debug!(
        requested = criteria.target(),
        sampled = picked.len(),
        "sampled placement questions"
    );

    Ok(picked.into_iter().cloned().collect())
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Checks that an answer key has the shape its question type requires.
pub fn validate_kind(kind: &QuestionKind) -> Result<(), ValidationError> {
    match kind {
        QuestionKind::DefinitionChoice(key)
        | QuestionKind::FillInBlank(key)
        | QuestionKind::UsageInSentence(key) => validate_choice(&key.options, &key.correct_answer),
        QuestionKind::TrueFalse(key) => {
            if key.options.len() != 2 {
                return Err(invalid(
                    "true_false_needs_two_options",
                    "true-false questions need exactly two options",
                ));
            }
            validate_choice(&key.options, &key.correct_answer)
        }
        QuestionKind::AcronymMatching(key) => validate_matching(key),
        QuestionKind::Comprehension(key) => validate_comprehension(key),
    }
}

fn validate_choice(options: &[ChoiceOption], correct_answer: &str) -> Result<(), ValidationError> {
    if options.len() < 2 {
        return Err(invalid("too_few_options", "at least two options are required"));
    }

    let mut labels = HashSet::new();
    for opt in options {
        if opt.label.trim().is_empty() {
            return Err(invalid("empty_option_label", "option labels cannot be empty"));
        }
        if opt.text.len() > 500 {
            return Err(invalid("option_too_long", "option text is limited to 500 characters"));
        }
        if !labels.insert(opt.label.trim()) {
            return Err(invalid("duplicate_option_label", "option labels must be unique"));
        }
    }

    if !labels.contains(correct_answer.trim()) {
        return Err(invalid(
            "correct_answer_not_an_option",
            "the correct answer must be one of the option labels",
        ));
    }
    Ok(())
}

fn validate_matching(key: &MatchingKey) -> Result<(), ValidationError> {
    if key.left_column.is_empty() || key.right_column.is_empty() {
        return Err(invalid("empty_column", "both matching columns need at least one item"));
    }

    let mut left_ids = HashSet::new();
    for item in &key.left_column {
        if item.id.trim().is_empty() || !left_ids.insert(item.id.as_str()) {
            return Err(invalid("duplicate_item_id", "left column ids must be unique and non-empty"));
        }
    }
    let mut right_ids = HashSet::new();
    for item in &key.right_column {
        if item.id.trim().is_empty() || !right_ids.insert(item.id.as_str()) {
            return Err(invalid("duplicate_item_id", "right column ids must be unique and non-empty"));
        }
    }

    if key.correct_matches.is_empty() {
        return Err(invalid("empty_matches", "at least one correct match is required"));
    }

    let mut covered = HashSet::new();
    for pair in &key.correct_matches {
        if !left_ids.contains(pair.left_id.as_str()) || !right_ids.contains(pair.right_id.as_str()) {
            return Err(invalid("unknown_match_id", "matches must reference existing column ids"));
        }
        if !covered.insert(pair.left_id.as_str()) {
            return Err(invalid("duplicate_left_match", "each left item can only be matched once"));
        }
    }

    if covered.len() != left_ids.len() {
        return Err(invalid(
            "matches_must_cover_left_column",
            "every left item needs a correct match",
        ));
    }
    Ok(())
}

fn validate_comprehension(key: &ComprehensionKey) -> Result<(), ValidationError> {
    if key.passage.trim().is_empty() {
        return Err(invalid("empty_passage", "comprehension questions need a passage"));
    }
    if key.sub_questions.is_empty() {
        return Err(invalid("no_sub_questions", "at least one sub-question is required"));
    }
    for sub in &key.sub_questions {
        if sub.prompt.trim().is_empty() {
            return Err(invalid("empty_sub_question", "sub-questions need a prompt"));
        }
        validate_choice(&sub.options, &sub.correct_answer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::question::{ChoiceKey, MatchItem, MatchPair, QuestionPayload},
        placement::testutil::{choice_question, matching_question},
    };
    use rand::{SeedableRng, rngs::StdRng};
    use validator::Validate;

    fn bank(layout: &[(Difficulty, Category, usize)]) -> Vec<Question> {
        let mut id = 0;
        let mut out = Vec::new();
        for &(difficulty, category, n) in layout {
            for _ in 0..n {
                id += 1;
                out.push(choice_question(id, category, difficulty, 2, "A"));
            }
        }
        out
    }

    fn count(picked: &[Question], difficulty: Difficulty) -> usize {
        picked.iter().filter(|q| q.difficulty == difficulty).count()
    }

    #[test]
    fn sample_fills_each_difficulty_quota() {
        let questions = bank(&[
            (Difficulty::Easy, Category::General, 10),
            (Difficulty::Medium, Category::Database, 10),
            (Difficulty::Hard, Category::Security, 10),
        ]);
        let mut rng = StdRng::seed_from_u64(7);

        let picked = sample(&questions, &SamplingCriteria::default(), &mut rng).unwrap();

        assert_eq!(picked.len(), 10);
        assert_eq!(count(&picked, Difficulty::Easy), 4);
        assert_eq!(count(&picked, Difficulty::Medium), 4);
        assert_eq!(count(&picked, Difficulty::Hard), 2);
        // easy first, hard last
        assert_eq!(picked[0].difficulty, Difficulty::Easy);
        assert_eq!(picked[9].difficulty, Difficulty::Hard);
    }

    #[test]
    fn sample_skips_inactive_and_duplicate_questions() {
        let mut questions = bank(&[(Difficulty::Easy, Category::General, 6)]);
        questions[0].is_active = false;
        questions.push(questions[1].clone());
        let criteria = SamplingCriteria {
            per_difficulty: BTreeMap::from([(Difficulty::Easy, 10)]),
            per_category: BTreeMap::new(),
            min_questions: 1,
        };

        let picked = sample(&questions, &criteria, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(picked.len(), 5);
        let ids: HashSet<i64> = picked.iter().map(|q| q.id).collect();
        assert_eq!(ids.len(), 5);
        assert!(!ids.contains(&1));
    }

    #[test]
    fn short_hard_bucket_borrows_from_medium_first() {
        let questions = bank(&[
            (Difficulty::Easy, Category::General, 3),
            (Difficulty::Medium, Category::General, 6),
            (Difficulty::Hard, Category::General, 0),
        ]);
        let criteria = SamplingCriteria {
            per_difficulty: BTreeMap::from([(Difficulty::Easy, 2), (Difficulty::Hard, 3)]),
            per_category: BTreeMap::new(),
            min_questions: 5,
        };

        let picked = sample(&questions, &criteria, &mut StdRng::seed_from_u64(3)).unwrap();

        assert_eq!(picked.len(), 5);
        assert_eq!(count(&picked, Difficulty::Easy), 2);
        assert_eq!(count(&picked, Difficulty::Medium), 3);
    }

    #[test]
    fn category_quota_steers_difficulty_picks() {
        let questions = bank(&[
            (Difficulty::Easy, Category::General, 8),
            (Difficulty::Easy, Category::Networking, 2),
        ]);
        let criteria = SamplingCriteria {
            per_difficulty: BTreeMap::from([(Difficulty::Easy, 4)]),
            per_category: BTreeMap::from([(Category::Networking, 2)]),
            min_questions: 4,
        };

        let picked = sample(&questions, &criteria, &mut StdRng::seed_from_u64(11)).unwrap();

        let networking = picked.iter().filter(|q| q.category == Category::Networking).count();
        assert_eq!(networking, 2);
    }

    #[test]
    fn category_only_criteria_top_up_from_next_category() {
        let questions = bank(&[
            (Difficulty::Easy, Category::Security, 1),
            (Difficulty::Easy, Category::AiMl, 5),
        ]);
        let criteria = SamplingCriteria {
            per_difficulty: BTreeMap::new(),
            per_category: BTreeMap::from([(Category::Security, 3)]),
            min_questions: 3,
        };

        let picked = sample(&questions, &criteria, &mut StdRng::seed_from_u64(5)).unwrap();

        assert_eq!(picked.len(), 3);
        assert_eq!(picked.iter().filter(|q| q.category == Category::AiMl).count(), 2);
    }

    #[test]
    fn sample_fails_below_minimum_length() {
        let questions = bank(&[(Difficulty::Easy, Category::General, 3)]);
        let err = sample(&questions, &SamplingCriteria::default(), &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, PlacementError::InsufficientQuestions(_)));

        let err = sample(&[], &SamplingCriteria::default(), &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, PlacementError::InsufficientQuestions(_)));
    }

    #[test]
    fn matching_key_must_cover_left_column() {
        let mut question = matching_question(1, 4, &[("L1", "R1"), ("L2", "R2")]);
        if let QuestionKind::AcronymMatching(key) = &mut question.kind {
            key.correct_matches.pop();
        }
        let err = validate_kind(&question.kind).unwrap_err();
        assert_eq!(err.code, "matches_must_cover_left_column");
    }

    #[test]
    fn matching_key_rejects_empty_columns_and_unknown_ids() {
        let empty = QuestionKind::AcronymMatching(MatchingKey {
            left_column: vec![],
            right_column: vec![],
            correct_matches: vec![],
        });
        assert_eq!(validate_kind(&empty).unwrap_err().code, "empty_column");

        let unknown = QuestionKind::AcronymMatching(MatchingKey {
            left_column: vec![MatchItem { id: "L1".into(), text: "DNS".into() }],
            right_column: vec![MatchItem { id: "R1".into(), text: "Domain Name System".into() }],
            correct_matches: vec![MatchPair { left_id: "L1".into(), right_id: "R9".into() }],
        });
        assert_eq!(validate_kind(&unknown).unwrap_err().code, "unknown_match_id");
    }

    #[test]
    fn choice_key_needs_correct_label_among_options() {
        let kind = QuestionKind::DefinitionChoice(ChoiceKey {
            options: vec![
                ChoiceOption { label: "A".into(), text: "one".into() },
                ChoiceOption { label: "B".into(), text: "two".into() },
            ],
            correct_answer: "C".into(),
        });
        assert_eq!(validate_kind(&kind).unwrap_err().code, "correct_answer_not_an_option");
    }

    #[test]
    fn true_false_needs_exactly_two_options() {
        let kind = QuestionKind::TrueFalse(ChoiceKey {
            options: vec![
                ChoiceOption { label: "T".into(), text: "True".into() },
                ChoiceOption { label: "F".into(), text: "False".into() },
                ChoiceOption { label: "M".into(), text: "Maybe".into() },
            ],
            correct_answer: "T".into(),
        });
        assert_eq!(validate_kind(&kind).unwrap_err().code, "true_false_needs_two_options");
    }

    #[test]
    fn payload_validation_reports_the_offending_field() {
        let payload: QuestionPayload = serde_json::from_value(serde_json::json!({
            "prompt": "Match each acronym",
            "category": "networking",
            "difficulty": "medium",
            "points": 0,
            "timeAllocation": 60,
            "questionType": "acronym-matching",
            "leftColumn": [{"id": "L1", "text": "IP"}],
            "rightColumn": [{"id": "R1", "text": "Internet Protocol"}],
            "correctMatches": []
        }))
        .unwrap();

        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("points"));
        assert!(fields.contains_key("kind"));
    }
}
