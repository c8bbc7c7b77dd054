// src/models/question.rs

use std::{collections::HashSet, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::placement::bank::validate_kind;

/// Returned when a stored string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Subject area a question belongs to.
/// Declaration order is the order used in breakdowns and sampling fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    General,
    Programming,
    WebDevelopment,
    Database,
    Networking,
    Algorithms,
    DataStructures,
    SoftwareEngineering,
    Security,
    AiMl,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::General,
        Category::Programming,
        Category::WebDevelopment,
        Category::Database,
        Category::Networking,
        Category::Algorithms,
        Category::DataStructures,
        Category::SoftwareEngineering,
        Category::Security,
        Category::AiMl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Programming => "programming",
            Category::WebDevelopment => "web-development",
            Category::Database => "database",
            Category::Networking => "networking",
            Category::Algorithms => "algorithms",
            Category::DataStructures => "data-structures",
            Category::SoftwareEngineering => "software-engineering",
            Category::Security => "security",
            Category::AiMl => "ai-ml",
        }
    }

    /// Human readable name used in feedback text.
    pub fn label(&self) -> &'static str {
        match self {
            Category::General => "General Computing",
            Category::Programming => "Programming",
            Category::WebDevelopment => "Web Development",
            Category::Database => "Databases",
            Category::Networking => "Networking",
            Category::Algorithms => "Algorithms",
            Category::DataStructures => "Data Structures",
            Category::SoftwareEngineering => "Software Engineering",
            Category::Security => "Security",
            Category::AiMl => "AI & Machine Learning",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "category",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "difficulty",
                value: s.to_string(),
            })
    }
}

/// Discriminant of [`QuestionKind`], used for filtering and the `question_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    DefinitionChoice,
    TrueFalse,
    FillInBlank,
    UsageInSentence,
    AcronymMatching,
    Comprehension,
}

impl QuestionType {
    pub const ALL: [QuestionType; 6] = [
        QuestionType::DefinitionChoice,
        QuestionType::TrueFalse,
        QuestionType::FillInBlank,
        QuestionType::UsageInSentence,
        QuestionType::AcronymMatching,
        QuestionType::Comprehension,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::DefinitionChoice => "definition-choice",
            QuestionType::TrueFalse => "true-false",
            QuestionType::FillInBlank => "fill-in-blank",
            QuestionType::UsageInSentence => "usage-in-sentence",
            QuestionType::AcronymMatching => "acronym-matching",
            QuestionType::Comprehension => "comprehension",
        }
    }
}

impl FromStr for QuestionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuestionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "question type",
                value: s.to_string(),
            })
    }
}

/// A labeled option, e.g. `{"label": "B", "text": "Structured Query Language"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub label: String,
    pub text: String,
}

/// Answer key shared by every single-answer question type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceKey {
    pub options: Vec<ChoiceOption>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchItem {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPair {
    pub left_id: String,
    pub right_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingKey {
    pub left_column: Vec<MatchItem>,
    pub right_column: Vec<MatchItem>,
    pub correct_matches: Vec<MatchPair>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubQuestion {
    pub prompt: String,
    pub options: Vec<ChoiceOption>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensionKey {
    pub passage: String,
    pub sub_questions: Vec<SubQuestion>,
}

/// The type-specific part of a question. Each variant carries only the
/// answer-key fields its type needs; grading matches on it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "questionType", rename_all = "kebab-case")]
pub enum QuestionKind {
    DefinitionChoice(ChoiceKey),
    TrueFalse(ChoiceKey),
    FillInBlank(ChoiceKey),
    UsageInSentence(ChoiceKey),
    AcronymMatching(MatchingKey),
    Comprehension(ComprehensionKey),
}

impl QuestionKind {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionKind::DefinitionChoice(_) => QuestionType::DefinitionChoice,
            QuestionKind::TrueFalse(_) => QuestionType::TrueFalse,
            QuestionKind::FillInBlank(_) => QuestionType::FillInBlank,
            QuestionKind::UsageInSentence(_) => QuestionType::UsageInSentence,
            QuestionKind::AcronymMatching(_) => QuestionType::AcronymMatching,
            QuestionKind::Comprehension(_) => QuestionType::Comprehension,
        }
    }
}

/// A bank question. Immutable from the point of view of a test session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub prompt: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub points: i32,
    /// Seconds allotted to this question.
    pub time_allocation: i32,
    pub skills_tested: Vec<String>,
    pub is_active: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// DTO for creating or replacing a question (admin only).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    #[validate(length(min = 1, max = 2000))]
    pub prompt: String,
    pub category: Category,
    pub difficulty: Difficulty,
    #[validate(range(min = 1, max = 100))]
    pub points: i32,
    #[validate(range(min = 1, max = 3600))]
    pub time_allocation: i32,
    #[serde(default)]
    #[validate(custom(function = validate_skills))]
    pub skills_tested: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(flatten)]
    #[validate(custom(function = validate_kind))]
    pub kind: QuestionKind,
}

fn default_active() -> bool {
    true
}

fn validate_skills(skills: &[String]) -> Result<(), ValidationError> {
    if skills.len() > 20 {
        return Err(ValidationError::new("too_many_skills"));
    }
    let mut seen = HashSet::new();
    for skill in skills {
        if skill.trim().is_empty() || skill.len() > 50 {
            return Err(ValidationError::new("invalid_skill"));
        }
        if !seen.insert(skill.trim()) {
            return Err(ValidationError::new("duplicate_skill"));
        }
    }
    Ok(())
}

impl QuestionPayload {
    pub fn into_question(
        self,
        id: i64,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Question {
        Question {
            id,
            prompt: self.prompt,
            category: self.category,
            difficulty: self.difficulty,
            points: self.points,
            time_allocation: self.time_allocation,
            skills_tested: self.skills_tested,
            is_active: self.is_active,
            kind: self.kind,
            created_at,
            updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicChoice {
    pub options: Vec<ChoiceOption>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicMatching {
    pub left_column: Vec<MatchItem>,
    pub right_column: Vec<MatchItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicSubQuestion {
    pub prompt: String,
    pub options: Vec<ChoiceOption>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicComprehension {
    pub passage: String,
    pub sub_questions: Vec<PublicSubQuestion>,
}

/// Question kind with every answer key stripped.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "questionType", rename_all = "kebab-case")]
pub enum PublicKind {
    DefinitionChoice(PublicChoice),
    TrueFalse(PublicChoice),
    FillInBlank(PublicChoice),
    UsageInSentence(PublicChoice),
    AcronymMatching(PublicMatching),
    Comprehension(PublicComprehension),
}

/// DTO for sending a question to the test taker (excludes answer keys).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    pub prompt: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub points: i32,
    pub time_allocation: i32,
    #[serde(flatten)]
    pub kind: PublicKind,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        let choice = |key: &ChoiceKey| PublicChoice {
            options: key.options.clone(),
        };
        let kind = match &q.kind {
            QuestionKind::DefinitionChoice(key) => PublicKind::DefinitionChoice(choice(key)),
            QuestionKind::TrueFalse(key) => PublicKind::TrueFalse(choice(key)),
            QuestionKind::FillInBlank(key) => PublicKind::FillInBlank(choice(key)),
            QuestionKind::UsageInSentence(key) => PublicKind::UsageInSentence(choice(key)),
            QuestionKind::AcronymMatching(key) => PublicKind::AcronymMatching(PublicMatching {
                left_column: key.left_column.clone(),
                right_column: key.right_column.clone(),
            }),
            QuestionKind::Comprehension(key) => PublicKind::Comprehension(PublicComprehension {
                passage: key.passage.clone(),
                sub_questions: key
                    .sub_questions
                    .iter()
                    .map(|sq| PublicSubQuestion {
                        prompt: sq.prompt.clone(),
                        options: sq.options.clone(),
                    })
                    .collect(),
            }),
        };

        PublicQuestion {
            id: q.id,
            prompt: q.prompt.clone(),
            category: q.category,
            difficulty: q.difficulty,
            points: q.points,
            time_allocation: q.time_allocation,
            kind,
        }
    }
}

/// Query parameters for the admin question list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionFilter {
    pub category: Option<Category>,
    pub difficulty: Option<Difficulty>,
    pub question_type: Option<QuestionType>,
    pub is_active: Option<bool>,
    /// 1-based page number (default: 1).
    pub page: Option<i64>,
    /// Items per page (default: 20, max: 100).
    pub per_page: Option<i64>,
}

impl QuestionFilter {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(20).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.per_page()
    }

    pub fn matches(&self, q: &Question) -> bool {
        self.category.is_none_or(|c| q.category == c)
            && self.difficulty.is_none_or(|d| q.difficulty == d)
            && self.question_type.is_none_or(|t| q.kind.question_type() == t)
            && self.is_active.is_none_or(|a| q.is_active == a)
    }
}

/// A page of results with the total count across all pages.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn question_document_uses_type_tag() {
        let doc = json!({
            "id": 7,
            "prompt": "What does SQL stand for?",
            "category": "database",
            "difficulty": "easy",
            "points": 2,
            "timeAllocation": 30,
            "skillsTested": ["definition"],
            "isActive": true,
            "questionType": "definition-choice",
            "options": [
                {"label": "A", "text": "Simple Query Logic"},
                {"label": "B", "text": "Structured Query Language"}
            ],
            "correctAnswer": "B",
            "createdAt": null,
            "updatedAt": null
        });

        let q: Question = serde_json::from_value(doc).unwrap();
        assert_eq!(q.category, Category::Database);
        assert_eq!(q.kind.question_type(), QuestionType::DefinitionChoice);
        match &q.kind {
            QuestionKind::DefinitionChoice(key) => assert_eq!(key.correct_answer, "B"),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn public_question_hides_answer_key() {
        let q = Question {
            id: 1,
            prompt: "Match the acronyms".into(),
            category: Category::Networking,
            difficulty: Difficulty::Medium,
            points: 4,
            time_allocation: 60,
            skills_tested: vec!["acronyms".into()],
            is_active: true,
            kind: QuestionKind::AcronymMatching(MatchingKey {
                left_column: vec![MatchItem { id: "L1".into(), text: "TCP".into() }],
                right_column: vec![MatchItem {
                    id: "R1".into(),
                    text: "Transmission Control Protocol".into(),
                }],
                correct_matches: vec![MatchPair { left_id: "L1".into(), right_id: "R1".into() }],
            }),
            created_at: None,
            updated_at: None,
        };

        let value = serde_json::to_value(PublicQuestion::from(&q)).unwrap();
        assert_eq!(value["questionType"], "acronym-matching");
        assert!(value.get("correctMatches").is_none());
        assert_eq!(value["leftColumn"][0]["id"], "L1");
    }

    #[test]
    fn enum_strings_round_trip_through_from_str() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert_eq!("ai-ml".parse::<Category>().unwrap(), Category::AiMl);
        assert!("cooking".parse::<Category>().is_err());
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(
            "fill-in-blank".parse::<QuestionType>().unwrap(),
            QuestionType::FillInBlank
        );
    }

    #[test]
    fn repeated_skill_tags_are_rejected() {
        let mut skills = vec!["definition".to_string(), "acronyms".to_string()];
        assert!(validate_skills(&skills).is_ok());

        skills.push(" definition".to_string());
        let err = validate_skills(&skills).unwrap_err();
        assert_eq!(err.code, "duplicate_skill");
    }

    #[test]
    fn filter_clamps_paging() {
        let filter = QuestionFilter {
            page: Some(0),
            per_page: Some(500),
            ..Default::default()
        };
        assert_eq!(filter.page(), 1);
        assert_eq!(filter.per_page(), 100);
        assert_eq!(filter.offset(), 0);
    }
}
