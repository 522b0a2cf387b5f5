//! Usage statistics and history for the assist gateway.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::rate_limit::{Decision, RateLimiter};
use super::storage;
use super::types::{
    ErrorResponse, HistoryData, HistoryItem, HistoryParams, HistoryResponse, QaEntry, StatsData,
    StatsParams, StatsResponse,
};

const RECENT_QUESTIONS: i64 = 5;
const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 100;

/// Current usage, remaining quota, and whether a question is admissible now.
#[utoipa::path(
    get,
    path = "/v1/assist/stats",
    params(StatsParams),
    responses(
        (status = 200, description = "Usage statistics", body = StatsResponse),
        (status = 400, description = "Missing student roll number", body = ErrorResponse)
    ),
    tag = "assist"
)]
pub async fn stats(
    pool: Extension<PgPool>,
    limiter: Extension<Arc<RateLimiter>>,
    params: Query<StatsParams>,
) -> impl IntoResponse {
    let student = params.student_rollno.trim().to_string();
    if student.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                success: false,
                message: "Student roll number is required".to_string(),
                error: None,
            }),
        )
            .into_response();
    }

    let result = load_stats(&pool, &limiter, &student).await;
    match result {
        Ok(data) => (
            StatusCode::OK,
            Json(StatsResponse {
                success: true,
                data,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to load assist stats: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    success: false,
                    message: "Failed to fetch assist statistics".to_string(),
                    error: None,
                }),
            )
                .into_response()
        }
    }
}

async fn load_stats(
    pool: &PgPool,
    limiter: &RateLimiter,
    student: &str,
) -> anyhow::Result<StatsData> {
    let today_usage = storage::count_today(pool, student).await?;
    let total_usage = storage::count_total(pool, student).await?;
    let recent = storage::recent(pool, student, RECENT_QUESTIONS).await?;
    let decision = limiter.check(pool, student).await?;

    let daily_limit = limiter.config().daily_quota();
    let (remaining_today, can_ask_now, wait_seconds) = match decision {
        Decision::Allowed { remaining_today } => (remaining_today, true, 0),
        Decision::Denied {
            wait_seconds,
            remaining_today,
            ..
        } => (remaining_today, false, wait_seconds.unwrap_or(0)),
    };

    Ok(StatsData {
        today_usage,
        total_usage,
        daily_limit,
        remaining_today,
        can_ask_now,
        wait_seconds,
        recent_questions: recent
            .into_iter()
            .map(|entry| QaEntry {
                question: entry.question,
                response: entry.response,
                created_at: entry.created_at,
            })
            .collect(),
    })
}

/// Paginated question/answer history, newest first.
#[utoipa::path(
    get,
    path = "/v1/assist/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Question history", body = HistoryResponse),
        (status = 400, description = "Missing student roll number", body = ErrorResponse)
    ),
    tag = "assist"
)]
pub async fn history(
    pool: Extension<PgPool>,
    params: Query<HistoryParams>,
) -> impl IntoResponse {
    let student = params.student_rollno.trim().to_string();
    if student.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                success: false,
                message: "Student roll number is required".to_string(),
                error: None,
            }),
        )
            .into_response();
    }

    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let result = load_history(&pool, &student, limit, offset).await;
    match result {
        Ok(data) => (
            StatusCode::OK,
            Json(HistoryResponse {
                success: true,
                data,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to load assist history: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    success: false,
                    message: "Failed to fetch assist history".to_string(),
                    error: None,
                }),
            )
                .into_response()
        }
    }
}

async fn load_history(
    pool: &PgPool,
    student: &str,
    limit: i64,
    offset: i64,
) -> anyhow::Result<HistoryData> {
    let rows = storage::history(pool, student, limit, offset).await?;
    let total = storage::count_total(pool, student).await?;

    Ok(HistoryData {
        history: rows
            .into_iter()
            .map(|row| HistoryItem {
                id: row.id,
                question: row.question,
                response: row.response,
                created_at: row.created_at,
            })
            .collect(),
        total,
        limit,
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::{RateLimitConfig, RateLimiter};
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn stats_blank_student() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig::new()));
        let response = stats(
            Extension(pool),
            Extension(limiter),
            Query(StatsParams {
                student_rollno: "  ".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn history_blank_student() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = history(
            Extension(pool),
            Query(HistoryParams {
                student_rollno: String::new(),
                limit: None,
                offset: None,
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
