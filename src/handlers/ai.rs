// src/handlers/ai.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    ai::{AiError, DEFAULT_MAX_RETRIES, TextGenerator, prompts},
    error::AppError,
    handlers::analytics::load_responses,
    handlers::quiz::{fetch_owned_quiz, load_questions},
    models::{question::QuestionDraft, quiz::QuizDraft},
    state::SharedGenerator,
    utils::jwt::Claims,
};

/// Uniform reply of the AI endpoints: a success payload or an error string,
/// optionally with a retry hint. Upstream failure is data, not an HTTP
/// error, so these endpoints always answer 200 once the request is
/// authorized and well-formed.
#[derive(Debug, Serialize)]
pub struct GenerateReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl GenerateReply {
    pub fn from_result(result: Result<Value, AiError>) -> Self {
        match result {
            Ok(content) => Self {
                content: Some(content),
                error: None,
                retry_after_ms: None,
            },
            Err(err) => Self {
                content: None,
                retry_after_ms: err.retry_after_ms(),
                error: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    #[validate(length(min = 1, max = 20000))]
    pub prompt: String,
    pub max_retries: Option<u32>,
}

/// Runs a caller-supplied prompt through the retrying client verbatim.
pub async fn generate(
    State(generator): State<SharedGenerator>,
    Json(payload): Json<GenerateRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let max_retries = payload.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
    let result = generator.generate(&payload.prompt, max_retries).await;

    Ok(Json(GenerateReply::from_result(result)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub topic: String,
    #[validate(range(min = 1, max = 50))]
    pub num_questions: u32,
}

/// Generates a whole quiz draft about a topic, normalized into the editor's
/// draft shape (missing marks/points fall back to their defaults).
pub async fn generate_quiz(
    State(generator): State<SharedGenerator>,
    Json(payload): Json<GenerateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let prompt = prompts::quiz_prompt(&payload.topic, payload.num_questions);
    let reply = match generator.generate(&prompt, DEFAULT_MAX_RETRIES).await {
        Ok(value) => match serde_json::from_value::<QuizDraft>(value) {
            Ok(draft) if !draft.questions.is_empty() => {
                serde_json::json!({ "quiz": draft })
            }
            _ => serde_json::json!({ "error": "Could not parse AI result as quiz JSON" }),
        },
        Err(err) => serde_json::json!({
            "error": err.to_string(),
            "retry_after_ms": err.retry_after_ms(),
        }),
    };

    Ok(Json(reply))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExtendQuestionsRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
    #[validate(range(min = 1, max = 20))]
    pub count: u32,
}

/// Generates additional questions for an in-progress draft, feeding the
/// existing ones to the model so they are not repeated.
pub async fn extend_questions(
    State(generator): State<SharedGenerator>,
    Json(payload): Json<ExtendQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let prompt = prompts::extend_questions_prompt(
        &payload.title,
        &payload.description,
        &payload.questions,
        payload.count,
    );
    let reply = match generator.generate(&prompt, DEFAULT_MAX_RETRIES).await {
        Ok(value) => match serde_json::from_value::<Vec<QuestionDraft>>(value) {
            Ok(questions) if !questions.is_empty() => {
                serde_json::json!({ "questions": questions })
            }
            _ => serde_json::json!({ "error": "Could not parse AI result as questions JSON" }),
        },
        Err(err) => serde_json::json!({
            "error": err.to_string(),
            "retry_after_ms": err.retry_after_ms(),
        }),
    };

    Ok(Json(reply))
}

/// Summarizes a quiz's collected responses for the owner dashboard.
pub async fn analyze_responses(
    State(pool): State<SqlitePool>,
    State(generator): State<SharedGenerator>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_owned_quiz(&pool, id, claims.user_id()).await?;
    let questions = load_questions(&pool, id).await?;
    let responses = load_responses(&pool, id).await?;

    if questions.is_empty() || responses.is_empty() {
        return Err(AppError::BadRequest(
            "No responses to analyze".to_string(),
        ));
    }

    let prompt = prompts::analysis_prompt(&quiz, &questions, &responses);
    let result = generator.generate(&prompt, DEFAULT_MAX_RETRIES).await;

    Ok(Json(GenerateReply::from_result(result)))
}
