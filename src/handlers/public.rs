// src/handlers/public.rs

use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    ai::{DEFAULT_MAX_RETRIES, TextGenerator, prompts},
    error::AppError,
    handlers::ai::GenerateReply,
    handlers::quiz::load_questions,
    models::{
        question::PublicQuestion,
        quiz::Quiz,
        response::{
            Answer, QuizResponse, QuizResult, ResponseWithAnswers, ResultEntry,
            SubmitResponseRequest,
        },
    },
    scoring,
    state::SharedGenerator,
    utils::html::clean_html,
};

/// Fetches a quiz by id, published or not. 404 when absent.
async fn fetch_quiz(pool: &SqlitePool, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = ?")
        .bind(quiz_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

/// Fetches a quiz for the respondent surface: unpublished quizzes do not
/// exist as far as the public routes are concerned.
async fn fetch_published_quiz(pool: &SqlitePool, quiz_id: i64) -> Result<Quiz, AppError> {
    let quiz = fetch_quiz(pool, quiz_id).await?;
    if !quiz.is_published {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }
    Ok(quiz)
}

/// Loads one response of a quiz together with its answers.
async fn fetch_response(
    pool: &SqlitePool,
    quiz_id: i64,
    response_id: i64,
) -> Result<ResponseWithAnswers, AppError> {
    let response = sqlx::query_as::<_, QuizResponse>(
        "SELECT * FROM responses WHERE id = ? AND quiz_id = ?",
    )
    .bind(response_id)
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Response not found".to_string()))?;

    let answers = sqlx::query_as::<_, Answer>("SELECT * FROM answers WHERE response_id = ?")
        .bind(response_id)
        .fetch_all(pool)
        .await?;

    Ok(ResponseWithAnswers { response, answers })
}

/// Returns a published quiz for taking. Option points and correctness are
/// stripped so the page cannot reveal the scoring.
pub async fn get_public_quiz(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_published_quiz(&pool, id).await?;
    let questions = load_questions(&pool, id).await?;

    Ok(Json(serde_json::json!({
        "id": quiz.id,
        "title": quiz.title,
        "description": quiz.description,
        "questions": questions
            .into_iter()
            .map(PublicQuestion::from)
            .collect::<Vec<_>>(),
    })))
}

/// Accepts a respondent's submission for a published quiz.
///
/// Single-select is enforced here by convention: a payload with two answers
/// for the same question is rejected, as is any answer pointing at a
/// question of another quiz or an option of another question.
pub async fn submit_response(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitResponseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    fetch_published_quiz(&pool, id).await?;
    let questions = load_questions(&pool, id).await?;

    let mut seen = HashSet::new();
    for answer in &payload.answers {
        if !seen.insert(answer.question_id) {
            return Err(AppError::BadRequest(
                "Multiple answers for the same question".to_string(),
            ));
        }
        let question = questions
            .iter()
            .find(|q| q.id == answer.question_id)
            .ok_or(AppError::BadRequest(
                "Answer references a question of another quiz".to_string(),
            ))?;
        if !question.options.iter().any(|o| o.id == answer.option_id) {
            return Err(AppError::BadRequest(
                "Selected option does not belong to the question".to_string(),
            ));
        }
    }

    let respondent_name = payload
        .respondent_name
        .as_deref()
        .map(clean_html)
        .filter(|name| !name.is_empty());

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let response_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO responses (quiz_id, respondent_name, submitted_at) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(id)
    .bind(&respondent_name)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to insert response: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    for answer in &payload.answers {
        sqlx::query("INSERT INTO answers (response_id, question_id, option_id) VALUES (?, ?, ?)")
            .bind(response_id)
            .bind(answer.question_id)
            .bind(answer.option_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "response_id": response_id })),
    ))
}

/// Scores one submitted response: total, maximum, percentage and a
/// per-question breakdown of what was selected.
pub async fn get_result(
    State(pool): State<SqlitePool>,
    Path((id, response_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    fetch_quiz(&pool, id).await?;
    let questions = load_questions(&pool, id).await?;
    let response = fetch_response(&pool, id, response_id).await?;

    let score = scoring::response_score(&response.answers, &questions);
    let max_score = scoring::max_score(&questions);

    let breakdown = questions
        .iter()
        .map(|q| {
            let selected = response
                .answers
                .iter()
                .find(|a| a.question_id == q.id)
                .and_then(|a| q.options.iter().find(|o| o.id == a.option_id))
                .cloned();
            ResultEntry {
                question_id: q.id,
                text: q.text.clone(),
                selected,
            }
        })
        .collect();

    Ok(Json(QuizResult {
        quiz_id: id,
        response_id,
        score,
        max_score,
        percent_score: scoring::percent_score(score, max_score),
        breakdown,
    }))
}

/// Asks the AI for personalized advice on one scored response.
/// Always answers 200; AI failure comes back in the body.
pub async fn get_advice(
    State(pool): State<SqlitePool>,
    State(generator): State<SharedGenerator>,
    Path((id, response_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_quiz(&pool, id).await?;
    let questions = load_questions(&pool, id).await?;
    let response = fetch_response(&pool, id, response_id).await?;

    let prompt = prompts::advice_prompt(&quiz, &questions, &response);
    let result = generator.generate(&prompt, DEFAULT_MAX_RETRIES).await;

    Ok(Json(GenerateReply::from_result(result)))
}
