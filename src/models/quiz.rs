// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::models::question::{QuestionDraft, QuestionWithOptions};

/// Represents the 'quizzes' table in the database.
///
/// Quizzes are never hard-deleted; unpublishing removes them from the public
/// surface while keeping collected responses intact.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,

    /// Owner reference.
    pub user_id: i64,

    pub title: String,

    pub description: String,

    /// Whether the quiz is reachable through the public respondent routes.
    pub is_published: bool,

    /// Set when the quiz was imported from an AI-generated draft.
    pub ai_generated: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a quiz or replacing its content wholesale on update.
#[derive(Debug, Deserialize, Validate)]
pub struct SaveQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    #[validate(nested)]
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
    #[serde(default)]
    pub ai_generated: bool,
}

/// DTO for toggling publication.
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub is_published: bool,
}

/// Full owner-facing view of a quiz, questions and options included.
#[derive(Debug, Serialize)]
pub struct QuizDetail {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub is_published: bool,
    pub ai_generated: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub questions: Vec<QuestionWithOptions>,
}

/// The shape AI quiz generation is asked to produce and normalized into.
/// Serde defaults absorb fields the model omits.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuizDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}
