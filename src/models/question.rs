// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub quiz_id: i64,

    /// The text of the question.
    pub text: String,

    /// Informational weight shown next to the question. Scoring uses option
    /// points, not marks.
    pub marks: i64,
}

/// Represents the 'options' table in the database.
///
/// Named `QuestionOption` to avoid clashing with `std::option::Option`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,

    pub question_id: i64,

    pub text: String,

    /// Vestigial correctness flag kept for compatibility with older quizzes.
    /// Scoring is points-based and never reads it.
    pub is_correct: bool,

    /// Points awarded when a respondent selects this option.
    pub points: i64,
}

/// A question with its options attached, as consumed by scoring and by the
/// quiz detail endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithOptions {
    pub id: i64,
    pub text: String,
    pub marks: i64,
    pub options: Vec<QuestionOption>,
}

/// Client-submitted question, used both when saving a quiz and as the shape
/// AI-generated drafts are normalized into (missing marks/points default).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionDraft {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    #[serde(default = "default_marks")]
    pub marks: i64,
    #[validate(nested)]
    #[serde(default)]
    pub options: Vec<OptionDraft>,
}

/// Client-submitted option belonging to a `QuestionDraft`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OptionDraft {
    #[validate(length(min = 1, max = 500))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub points: i64,
}

fn default_marks() -> i64 {
    1
}

/// DTO for respondents taking a quiz: option points and correctness stay
/// hidden so the quiz page cannot reveal the scoring.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub options: Vec<PublicOption>,
}

#[derive(Debug, Serialize)]
pub struct PublicOption {
    pub id: i64,
    pub text: String,
}

impl From<QuestionWithOptions> for PublicQuestion {
    fn from(question: QuestionWithOptions) -> Self {
        PublicQuestion {
            id: question.id,
            text: question.text,
            options: question
                .options
                .into_iter()
                .map(|opt| PublicOption {
                    id: opt.id,
                    text: opt.text,
                })
                .collect(),
        }
    }
}
