// src/handlers/analytics.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    handlers::quiz::{fetch_owned_quiz, load_questions},
    models::response::{Answer, QuizResponse, ResponseWithAnswers},
    scoring::{
        self, AggregateStats, OptionCount, ResponseFilter, ScoreBucket,
    },
    utils::jwt::Claims,
};

/// Loads all of a quiz's responses with their answers attached, newest
/// first.
pub(crate) async fn load_responses(
    pool: &SqlitePool,
    quiz_id: i64,
) -> Result<Vec<ResponseWithAnswers>, AppError> {
    let responses = sqlx::query_as::<_, QuizResponse>(
        "SELECT * FROM responses WHERE quiz_id = ? ORDER BY submitted_at DESC, id DESC",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let answers = sqlx::query_as::<_, Answer>(
        r#"
        SELECT a.id, a.response_id, a.question_id, a.option_id
        FROM answers a
        JOIN responses r ON a.response_id = r.id
        WHERE r.quiz_id = ?
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<i64, Vec<Answer>> = HashMap::new();
    for answer in answers {
        grouped.entry(answer.response_id).or_default().push(answer);
    }

    Ok(responses
        .into_iter()
        .map(|response| ResponseWithAnswers {
            answers: grouped.remove(&response.id).unwrap_or_default(),
            response,
        })
        .collect())
}

/// One row of the owner's response table.
#[derive(Debug, Serialize)]
struct ResponseSummary {
    id: i64,
    respondent_name: Option<String>,
    submitted_at: Option<chrono::DateTime<chrono::Utc>>,
    score: i64,
}

/// Selection counts for one question's options.
#[derive(Debug, Serialize)]
struct QuestionBreakdown {
    question_id: i64,
    text: String,
    option_counts: Vec<OptionCount>,
}

/// The analytics payload behind the owner's responses dashboard.
#[derive(Debug, Serialize)]
struct ResponsesReport {
    /// Count before filtering, for the "filtered: X / Y" display.
    total_responses: u64,
    responses: Vec<ResponseSummary>,
    stats: AggregateStats,
    distribution: Vec<ScoreBucket>,
    question_breakdown: Vec<QuestionBreakdown>,
}

/// Lists a quiz's responses through the given filter and aggregates them:
/// summary statistics, score distribution, per-question option counts.
///
/// Filtering and arithmetic happen in memory over the full response set;
/// the scoring module owns all of it.
pub async fn list_responses(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Query(filter): Query<ResponseFilter>,
) -> Result<impl IntoResponse, AppError> {
    fetch_owned_quiz(&pool, id, claims.user_id()).await?;

    let questions = load_questions(&pool, id).await?;
    let all_responses = load_responses(&pool, id).await?;

    let filtered = scoring::score_and_filter(&all_responses, &questions, &filter);
    let scores: Vec<i64> = filtered.iter().map(|s| s.score).collect();

    let responses = filtered
        .iter()
        .map(|s| ResponseSummary {
            id: s.response.response.id,
            respondent_name: s.response.response.respondent_name.clone(),
            submitted_at: s.response.response.submitted_at,
            score: s.score,
        })
        .collect();

    let question_breakdown = questions
        .iter()
        .map(|q| QuestionBreakdown {
            question_id: q.id,
            text: q.text.clone(),
            option_counts: scoring::option_counts(q, &filtered),
        })
        .collect();

    Ok(Json(ResponsesReport {
        total_responses: all_responses.len() as u64,
        responses,
        stats: scoring::aggregate(&scores),
        distribution: scoring::score_distribution(&scores),
        question_breakdown,
    }))
}
