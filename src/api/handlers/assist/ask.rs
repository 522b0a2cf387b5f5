//! The admission-guarded ask endpoint.
//!
//! Order matters here: admission (with reservation) → downstream call →
//! usage append. The append happens only after the answering service
//! replied, so `service_unavailable` outcomes never consume quota, and the
//! reservation is released on every exit path.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::client::AssistClient;
use super::rate_limit::{Decision, DenyReason, RateLimiter};
use super::types::{AskData, AskRequest, AskResponse, DeniedResponse, ErrorResponse};

const MAX_QUESTION_LENGTH: usize = 500;

fn deny_message(reason: DenyReason, wait_seconds: Option<i64>, daily_limit: i64) -> String {
    match reason {
        DenyReason::DailyLimit => {
            format!("Daily limit of {daily_limit} questions reached. Try again tomorrow.")
        }
        DenyReason::Cooldown => {
            let wait = wait_seconds.unwrap_or(0);
            format!("Please wait {wait} seconds before asking another question.")
        }
    }
}

/// Ask the answering service a question, subject to quota and cooldown.
#[utoipa::path(
    post,
    path = "/v1/assist/ask",
    request_body = AskRequest,
    responses(
        (status = 200, description = "Question answered", body = AskResponse),
        (status = 400, description = "Missing or oversized question", body = ErrorResponse),
        (status = 429, description = "Daily limit reached or cooldown active", body = DeniedResponse),
        (status = 503, description = "Answering service unreachable; not charged", body = ErrorResponse)
    ),
    tag = "assist"
)]
pub async fn ask(
    pool: Extension<PgPool>,
    limiter: Extension<Arc<RateLimiter>>,
    client: Extension<Arc<AssistClient>>,
    payload: Option<Json<AskRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                success: false,
                message: "Question is required".to_string(),
                error: None,
            }),
        )
            .into_response();
    };

    let student = request.student_rollno.trim().to_string();
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

    let question = request.question.trim().to_string();
    if question.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                success: false,
                message: "Question is required".to_string(),
                error: None,
            }),
        )
            .into_response();
    }
    if question.len() > MAX_QUESTION_LENGTH {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                success: false,
                message: "Question is too long. Maximum 500 characters allowed.".to_string(),
                error: None,
            }),
        )
            .into_response();
    }

    let daily_limit = limiter.config().daily_quota();

    let remaining_today = match limiter.admit(&pool, &student).await {
        Ok(Decision::Allowed { remaining_today }) => remaining_today,
        Ok(Decision::Denied {
            reason,
            wait_seconds,
            remaining_today,
        }) => {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(DeniedResponse {
                    success: false,
                    message: deny_message(reason, wait_seconds, daily_limit),
                    reason: reason.as_str().to_string(),
                    wait_seconds,
                    remaining_today,
                }),
            )
                .into_response();
        }
        Err(err) => {
            error!("Failed to check rate limit: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    success: false,
                    message: "Failed to process your question".to_string(),
                    error: None,
                }),
            )
                .into_response();
        }
    };

    let answer = match client.ask(&student, &question).await {
        Ok(answer) => answer,
        Err(err) => {
            error!("Answering service error: {err}");
            // The failed call must not count against the subject.
            limiter.release(&student).await;
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    success: false,
                    message: "Assist service is temporarily unavailable".to_string(),
                    error: Some("service_unavailable".to_string()),
                }),
            )
                .into_response();
        }
    };

    if let Err(err) = limiter
        .complete(&pool, &student, &question, &answer.answer, answer.tokens_used)
        .await
    {
        error!("Failed to record usage: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                success: false,
                message: "Failed to process your question".to_string(),
                error: None,
            }),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(AskResponse {
            success: true,
            data: AskData {
                question,
                answer: answer.answer,
                remaining_today: remaining_today - 1,
                daily_limit,
            },
        }),
    )
        .into_response()
}
