// src/handlers/quiz.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{SqliteConnection, SqlitePool};
use url::Url;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::{
        question::{Question, QuestionDraft, QuestionOption, QuestionWithOptions},
        quiz::{PublishRequest, Quiz, QuizDetail, SaveQuizRequest},
    },
    utils::{html::clean_html, jwt::Claims},
};

/// Fetches a quiz and verifies the requesting user owns it.
///
/// Another user's quiz comes back as 404, not 403, so quiz ids cannot be
/// probed.
pub(crate) async fn fetch_owned_quiz(
    pool: &SqlitePool,
    quiz_id: i64,
    user_id: i64,
) -> Result<Quiz, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = ?")
        .bind(quiz_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if quiz.user_id != user_id {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(quiz)
}

/// Loads a quiz's questions with their options attached, in stored order.
pub(crate) async fn load_questions(
    pool: &SqlitePool,
    quiz_id: i64,
) -> Result<Vec<QuestionWithOptions>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT * FROM questions WHERE quiz_id = ? ORDER BY id",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let options = sqlx::query_as::<_, QuestionOption>(
        r#"
        SELECT o.id, o.question_id, o.text, o.is_correct, o.points
        FROM options o
        JOIN questions q ON o.question_id = q.id
        WHERE q.quiz_id = ?
        ORDER BY o.id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<i64, Vec<QuestionOption>> = HashMap::new();
    for option in options {
        grouped.entry(option.question_id).or_default().push(option);
    }

    Ok(questions
        .into_iter()
        .map(|q| QuestionWithOptions {
            options: grouped.remove(&q.id).unwrap_or_default(),
            id: q.id,
            text: q.text,
            marks: q.marks,
        })
        .collect())
}

/// Inserts the given question drafts (and their options) for a quiz.
/// All user-supplied text is sanitized on the way in.
async fn insert_questions(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    questions: &[QuestionDraft],
) -> Result<(), AppError> {
    for question in questions {
        let question_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO questions (quiz_id, text, marks) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(quiz_id)
        .bind(clean_html(&question.text))
        .bind(question.marks)
        .fetch_one(&mut *conn)
        .await?;

        for option in &question.options {
            sqlx::query(
                "INSERT INTO options (question_id, text, is_correct, points) VALUES (?, ?, ?, ?)",
            )
            .bind(question_id)
            .bind(clean_html(&option.text))
            .bind(option.is_correct)
            .bind(option.points)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

/// Lists the requesting user's quizzes, newest first.
pub async fn list_quizzes(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = sqlx::query_as::<_, Quiz>(
        "SELECT * FROM quizzes WHERE user_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list quizzes: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(quizzes))
}

/// Creates a quiz with its questions and options in one transaction.
pub async fn create_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SaveQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let quiz_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO quizzes (user_id, title, description, is_published, ai_generated)
        VALUES (?, ?, ?, FALSE, ?)
        RETURNING id
        "#,
    )
    .bind(claims.user_id())
    .bind(clean_html(&payload.title))
    .bind(clean_html(&payload.description))
    .bind(payload.ai_generated)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    insert_questions(&mut *tx, quiz_id, &payload.questions).await?;

    tx.commit()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": quiz_id }))))
}

/// Returns the owner-facing view of a quiz, questions and options included.
pub async fn get_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_owned_quiz(&pool, id, claims.user_id()).await?;
    let questions = load_questions(&pool, id).await?;

    Ok(Json(QuizDetail {
        id: quiz.id,
        title: quiz.title,
        description: quiz.description,
        is_published: quiz.is_published,
        ai_generated: quiz.ai_generated,
        created_at: quiz.created_at,
        questions,
    }))
}

/// Updates a quiz.
///
/// Title and description are updated in place; questions and options are
/// replaced wholesale (delete then re-insert) so the stored state always
/// mirrors the submitted editor state. Collected responses stay untouched.
pub async fn update_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SaveQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    fetch_owned_quiz(&pool, id, claims.user_id()).await?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    sqlx::query("UPDATE quizzes SET title = ?, description = ? WHERE id = ?")
        .bind(clean_html(&payload.title))
        .bind(clean_html(&payload.description))
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "DELETE FROM options WHERE question_id IN (SELECT id FROM questions WHERE quiz_id = ?)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM questions WHERE quiz_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    insert_questions(&mut *tx, id, &payload.questions).await?;

    tx.commit()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(StatusCode::OK)
}

/// Publishes or unpublishes a quiz. Publishing returns the share link
/// respondents use.
pub async fn set_published(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<PublishRequest>,
) -> Result<impl IntoResponse, AppError> {
    fetch_owned_quiz(&pool, id, claims.user_id()).await?;

    sqlx::query("UPDATE quizzes SET is_published = ? WHERE id = ?")
        .bind(payload.is_published)
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update publication flag: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    let share_url = if payload.is_published {
        Some(share_url(&config.public_base_url, id)?)
    } else {
        None
    };

    Ok(Json(serde_json::json!({
        "is_published": payload.is_published,
        "share_url": share_url,
    })))
}

fn share_url(public_base_url: &str, quiz_id: i64) -> Result<String, AppError> {
    let base = Url::parse(public_base_url)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    let url = base
        .join(&format!("quiz/{quiz_id}"))
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(url.to_string())
}
