// src/models/response.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::models::question::QuestionOption;

/// Represents the 'responses' table in the database.
/// One row per submitted attempt at a published quiz.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizResponse {
    pub id: i64,

    pub quiz_id: i64,

    /// Respondents may submit anonymously.
    pub respondent_name: Option<String>,

    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'answers' table in the database.
/// The option a response selected for one question.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub response_id: i64,
    pub question_id: i64,
    pub option_id: i64,
}

/// A response joined with its answers, the unit scoring operates on.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseWithAnswers {
    #[serde(flatten)]
    pub response: QuizResponse,
    pub answers: Vec<Answer>,
}

/// DTO for submitting a response to a published quiz.
/// At most one answer per question; handler validation enforces it.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitResponseRequest {
    #[validate(length(max = 100))]
    pub respondent_name: Option<String>,
    #[validate(length(min = 1), nested)]
    pub answers: Vec<AnswerDraft>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct AnswerDraft {
    pub question_id: i64,
    pub option_id: i64,
}

/// Scored result of a single response, with a per-question breakdown.
#[derive(Debug, Serialize)]
pub struct QuizResult {
    pub quiz_id: i64,
    pub response_id: i64,
    pub score: i64,
    pub max_score: i64,
    pub percent_score: i64,
    pub breakdown: Vec<ResultEntry>,
}

/// One question of a scored result; `selected` is None for unanswered
/// questions.
#[derive(Debug, Serialize)]
pub struct ResultEntry {
    pub question_id: i64,
    pub text: String,
    pub selected: Option<QuestionOption>,
}
