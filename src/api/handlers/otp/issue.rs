//! Issue and resend reset codes.
//!
//! Issuing always supersedes any outstanding code for the subject. The
//! success response only acknowledges that a code was created; delivery is
//! queued and happens out of band.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use crate::api::notify::{CodeMail, MailPurpose};

use super::identity::{self, Role, Subject};
use super::state::OtpState;
use super::storage;
use super::types::{SendCodeRequest, StatusResponse};
use super::utils;

/// Issue a reset code and queue its delivery.
#[utoipa::path(
    post,
    path = "/v1/otp/forgot/send",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code issued; delivery is best-effort", body = StatusResponse),
        (status = 400, description = "Missing or invalid fields", body = StatusResponse),
        (status = 404, description = "Unknown subject", body = StatusResponse)
    ),
    tag = "otp"
)]
pub async fn send_code(
    pool: Extension<PgPool>,
    state: Extension<Arc<OtpState>>,
    payload: Option<Json<SendCodeRequest>>,
) -> impl IntoResponse {
    issue_flow(&pool, &state, payload, "OTP sent successfully").await
}

/// Reissue a reset code, superseding the outstanding one.
#[utoipa::path(
    post,
    path = "/v1/otp/forgot/resend",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code reissued; delivery is best-effort", body = StatusResponse),
        (status = 400, description = "Missing or invalid fields", body = StatusResponse),
        (status = 404, description = "Unknown subject", body = StatusResponse)
    ),
    tag = "otp"
)]
pub async fn resend_code(
    pool: Extension<PgPool>,
    state: Extension<Arc<OtpState>>,
    payload: Option<Json<SendCodeRequest>>,
) -> impl IntoResponse {
    issue_flow(&pool, &state, payload, "OTP resent successfully").await
}

async fn issue_flow(
    pool: &PgPool,
    state: &OtpState,
    payload: Option<Json<SendCodeRequest>>,
    success_message: &str,
) -> axum::response::Response {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::fail("Role and identifier are required")),
        )
            .into_response();
    };

    let role = request.role.trim();
    let identifier = request.identifier.trim();
    if role.is_empty() || identifier.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::fail("Role and identifier are required")),
        )
            .into_response();
    }

    let Some(role) = Role::parse(role) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::fail("Invalid role")),
        )
            .into_response();
    };

    let subject = match identity::resolve(pool, role, identifier).await {
        Ok(Some(subject)) => subject,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(StatusResponse::fail(role.not_found_message())),
            )
                .into_response();
        }
        Err(err) => {
            error!("Failed to resolve subject: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse::fail("Failed to send OTP")),
            )
                .into_response();
        }
    };

    match issue_to_subject(pool, state, role, &subject).await {
        Ok(_expires_at) => {
            (StatusCode::OK, Json(StatusResponse::ok(success_message))).into_response()
        }
        Err(err) => {
            error!("Failed to issue reset code: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse::fail("Failed to send OTP")),
            )
                .into_response()
        }
    }
}

/// Create, persist, and queue a code for an already-resolved subject.
/// Returns the stored challenge's expiry.
pub(super) async fn issue_to_subject(
    pool: &PgPool,
    state: &OtpState,
    role: Role,
    subject: &Subject,
) -> anyhow::Result<DateTime<Utc>> {
    let code = utils::generate_code();
    let code_hash = utils::hash_secret(code.expose_secret())?;
    let expires_at = storage::replace_challenge(
        pool,
        &subject.id,
        role,
        &code_hash,
        state.config().ttl_seconds(),
    )
    .await?;

    // Queued only after the challenge is durable; the response never waits on
    // delivery and delivery failures stay server-side.
    state.notifier().dispatch(CodeMail {
        to: subject.email.clone(),
        code,
        purpose: MailPurpose::PasswordReset,
    });

    Ok(expires_at)
}

#[cfg(test)]
mod tests {
    use super::super::state::{OtpConfig, OtpState};
    use super::{send_code, SendCodeRequest};
    use crate::api::notify::{spawn_delivery_worker, LogMailSender};
    use anyhow::Result;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::Json;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    fn otp_state() -> Arc<OtpState> {
        let (notifier, _handle) = spawn_delivery_worker(Arc::new(LogMailSender), 4);
        Arc::new(OtpState::new(OtpConfig::new(), notifier))
    }

    #[tokio::test]
    async fn send_code_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = send_code(Extension(pool), Extension(otp_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn send_code_empty_fields() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = send_code(
            Extension(pool),
            Extension(otp_state()),
            Some(Json(SendCodeRequest {
                role: "student".to_string(),
                identifier: "  ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn send_code_unknown_role() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = send_code(
            Extension(pool),
            Extension(otp_state()),
            Some(Json(SendCodeRequest {
                role: "admin".to_string(),
                identifier: "21CS042".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
