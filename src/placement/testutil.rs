//! Question builders shared by the unit tests.

use crate::models::question::{
    Category, ChoiceKey, ChoiceOption, ComprehensionKey, Difficulty, MatchItem, MatchPair,
    MatchingKey, Question, QuestionKind, QuestionPayload, SubQuestion,
};

fn options(labels: &[&str]) -> Vec<ChoiceOption> {
    labels
        .iter()
        .map(|l| ChoiceOption {
            label: l.to_string(),
            text: format!("option {}", l),
        })
        .collect()
}

fn question(id: i64, category: Category, difficulty: Difficulty, points: i32, kind: QuestionKind) -> Question {
    Question {
        id,
        prompt: format!("question {}", id),
        category,
        difficulty,
        points,
        time_allocation: 30,
        skills_tested: vec!["definition".to_string()],
        is_active: true,
        kind,
        created_at: None,
        updated_at: None,
    }
}

pub(crate) fn choice_question(
    id: i64,
    category: Category,
    difficulty: Difficulty,
    points: i32,
    correct: &str,
) -> Question {
    question(
        id,
        category,
        difficulty,
        points,
        QuestionKind::DefinitionChoice(ChoiceKey {
            options: options(&["A", "B", "C", "D"]),
            correct_answer: correct.to_string(),
        }),
    )
}

pub(crate) fn matching_question(id: i64, points: i32, pairs: &[(&str, &str)]) -> Question {
    let key = MatchingKey {
        left_column: pairs
            .iter()
            .map(|(l, _)| MatchItem { id: l.to_string(), text: format!("left {}", l) })
            .collect(),
        right_column: pairs
            .iter()
            .map(|(_, r)| MatchItem { id: r.to_string(), text: format!("right {}", r) })
            .collect(),
        correct_matches: pairs
            .iter()
            .map(|(l, r)| MatchPair { left_id: l.to_string(), right_id: r.to_string() })
            .collect(),
    };
    question(id, Category::Networking, Difficulty::Medium, points, QuestionKind::AcronymMatching(key))
}

pub(crate) fn comprehension_question(id: i64, points: i32, answers: &[&str]) -> Question {
    let key = ComprehensionKey {
        passage: "A stack is a last-in, first-out collection.".to_string(),
        sub_questions: answers
            .iter()
            .enumerate()
            .map(|(i, correct)| SubQuestion {
                prompt: format!("part {}", i + 1),
                options: options(&["A", "B", "C"]),
                correct_answer: correct.to_string(),
            })
            .collect(),
    };
    question(id, Category::DataStructures, Difficulty::Hard, points, QuestionKind::Comprehension(key))
}

/// Payload form of `choice_question`, for seeding a store.
pub(crate) fn choice_payload(
    category: Category,
    difficulty: Difficulty,
    points: i32,
    correct: &str,
) -> QuestionPayload {
    let q = choice_question(0, category, difficulty, points, correct);
    QuestionPayload {
        prompt: q.prompt,
        category,
        difficulty,
        points,
        time_allocation: q.time_allocation,
        skills_tested: q.skills_tested,
        is_active: true,
        kind: q.kind,
    }
}
