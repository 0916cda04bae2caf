// src/scoring.rs

//! Points-based scoring and response aggregation.
//!
//! Everything here is pure and deterministic: handlers load the quiz
//! definition and the collected responses, then hand them to these
//! functions. Missing data never errors, it degrades to zero.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::question::QuestionWithOptions;
use crate::models::response::{Answer, ResponseWithAnswers};

/// Total points a response earned across the given questions.
///
/// Each question contributes at most once: the points of the option its
/// answer selected, or 0 when unanswered or when the selected option does
/// not belong to the question.
pub fn response_score(answers: &[Answer], questions: &[QuestionWithOptions]) -> i64 {
    let mut total = 0;
    for question in questions {
        let Some(answer) = answers.iter().find(|a| a.question_id == question.id) else {
            continue;
        };
        if let Some(option) = question.options.iter().find(|o| o.id == answer.option_id) {
            total += option.points;
        }
    }
    total
}

/// Highest total any response could earn: the sum over questions of their
/// highest-point option. A question without options contributes 0.
///
/// Deliberately independent of `is_correct`: scoring is points-based.
pub fn max_score(questions: &[QuestionWithOptions]) -> i64 {
    questions
        .iter()
        .map(|q| q.options.iter().map(|o| o.points).max().unwrap_or(0))
        .sum()
}

/// Score as a whole percentage of the maximum, conventionally rounded.
/// 0 when the maximum is 0 (a quiz with no scorable options).
pub fn percent_score(score: i64, max: i64) -> i64 {
    if max > 0 {
        (score as f64 * 100.0 / max as f64).round() as i64
    } else {
        0
    }
}

/// Inclusive bounds applied to responses before aggregation.
///
/// Date bounds only exclude a response when it actually carries a
/// timestamp; score bounds always apply. No bounds set keeps everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseFilter {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub min_points: Option<i64>,
    pub max_points: Option<i64>,
}

impl ResponseFilter {
    pub fn matches(&self, submitted_at: Option<DateTime<Utc>>, score: i64) -> bool {
        if let (Some(from), Some(at)) = (self.date_from, submitted_at) {
            if at < from {
                return false;
            }
        }
        if let (Some(to), Some(at)) = (self.date_to, submitted_at) {
            if at > to {
                return false;
            }
        }
        if let Some(min) = self.min_points {
            if score < min {
                return false;
            }
        }
        if let Some(max) = self.max_points {
            if score > max {
                return false;
            }
        }
        true
    }
}

/// A response paired with its computed score.
#[derive(Debug)]
pub struct ScoredResponse<'a> {
    pub response: &'a ResponseWithAnswers,
    pub score: i64,
}

/// Scores every response and keeps those passing the filter.
pub fn score_and_filter<'a>(
    responses: &'a [ResponseWithAnswers],
    questions: &[QuestionWithOptions],
    filter: &ResponseFilter,
) -> Vec<ScoredResponse<'a>> {
    responses
        .iter()
        .map(|r| ScoredResponse {
            score: response_score(&r.answers, questions),
            response: r,
        })
        .filter(|s| filter.matches(s.response.response.submitted_at, s.score))
        .collect()
}

/// Summary statistics over a set of scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateStats {
    pub count: u64,
    /// Arithmetic mean, rounded to 2 decimal places.
    pub mean: f64,
    pub min: i64,
    pub max: i64,
}

/// Count/mean/min/max of the given scores. An empty set yields all zeros.
pub fn aggregate(scores: &[i64]) -> AggregateStats {
    if scores.is_empty() {
        return AggregateStats {
            count: 0,
            mean: 0.0,
            min: 0,
            max: 0,
        };
    }
    let sum: i64 = scores.iter().sum();
    let mean = (sum as f64 / scores.len() as f64 * 100.0).round() / 100.0;
    AggregateStats {
        count: scores.len() as u64,
        mean,
        min: scores.iter().copied().min().unwrap_or(0),
        max: scores.iter().copied().max().unwrap_or(0),
    }
}

/// One bar of the score distribution chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBucket {
    pub score: i64,
    pub count: u64,
}

/// Responses grouped by exact score, ascending by score value.
pub fn score_distribution(scores: &[i64]) -> Vec<ScoreBucket> {
    let mut buckets: BTreeMap<i64, u64> = BTreeMap::new();
    for &score in scores {
        *buckets.entry(score).or_default() += 1;
    }
    buckets
        .into_iter()
        .map(|(score, count)| ScoreBucket { score, count })
        .collect()
}

/// How often each option of a question was selected across the given
/// (already filtered) responses, in stored option order. Options nobody
/// picked are reported with count 0 rather than omitted.
#[derive(Debug, Clone, Serialize)]
pub struct OptionCount {
    pub option_id: i64,
    pub text: String,
    pub count: u64,
}

pub fn option_counts(
    question: &QuestionWithOptions,
    responses: &[ScoredResponse<'_>],
) -> Vec<OptionCount> {
    question
        .options
        .iter()
        .map(|opt| {
            let count = responses
                .iter()
                .filter(|s| {
                    s.response
                        .answers
                        .iter()
                        .find(|a| a.question_id == question.id)
                        .map(|a| a.option_id)
                        == Some(opt.id)
                })
                .count() as u64;
            OptionCount {
                option_id: opt.id,
                text: opt.text.clone(),
                count,
            }
        })
        .collect()
}
