//! Credential reset guarded by a just-consumed challenge.
//!
//! The whole chain runs inside one request: validate, resolve, consume the
//! challenge, then update the stored credential and drop refresh-token state
//! so existing sessions cannot be refreshed.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use tracing::Instrument;
use tracing::error;

use super::identity::{self, Role};
use super::types::{ResetPasswordRequest, StatusResponse};
use super::utils;
use super::verify::{consume_challenge, ChallengeOutcome, VerifiedIdentity};

const MIN_PASSWORD_LENGTH: usize = 6;

/// Reset a credential after consuming the subject's active challenge.
#[utoipa::path(
    post,
    path = "/v1/auth/forgot/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Credential updated", body = StatusResponse),
        (status = 400, description = "Validation failure or unusable code", body = StatusResponse),
        (status = 404, description = "Unknown subject", body = StatusResponse)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::fail("Role, identifier and OTP are required")),
        )
            .into_response();
    };

    let role = request.role.trim();
    let identifier = request.identifier.trim();
    let otp = request.otp.trim();
    if role.is_empty() || identifier.is_empty() || otp.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::fail("Role, identifier and OTP are required")),
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

    // Validate the new credential before any store mutation.
    if request.new_password.is_empty() || request.confirm_password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::fail("Both password fields are required")),
        )
            .into_response();
    }
    if request.new_password != request.confirm_password {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::fail("Passwords do not match")),
        )
            .into_response();
    }
    if request.new_password.len() < MIN_PASSWORD_LENGTH {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::fail(
                "Password must be at least 6 characters long",
            )),
        )
            .into_response();
    }

    let subject = match identity::resolve(&pool, role, identifier).await {
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
                Json(StatusResponse::fail("Internal server error")),
            )
                .into_response();
        }
    };

    let identity = match consume_challenge(&pool, &subject.id, role, otp).await {
        Ok(ChallengeOutcome::Consumed) => VerifiedIdentity {
            subject_id: subject.id,
            role,
        },
        Ok(ChallengeOutcome::NotFound) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(StatusResponse::fail("OTP not found")),
            )
                .into_response();
        }
        Ok(ChallengeOutcome::Expired) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(StatusResponse::fail("OTP expired")),
            )
                .into_response();
        }
        Ok(ChallengeOutcome::Mismatch) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(StatusResponse::fail("Invalid OTP")),
            )
                .into_response();
        }
        Err(err) => {
            error!("Failed to verify reset code: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse::fail("Internal server error")),
            )
                .into_response();
        }
    };

    match apply_reset(&pool, &identity, &request.new_password).await {
        Ok(()) => (
            StatusCode::OK,
            Json(StatusResponse::ok(
                "Password reset successfully. Please login again.",
            )),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to reset password: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse::fail("Internal server error")),
            )
                .into_response()
        }
    }
}

/// Store the new credential hash and invalidate refresh tokens.
async fn apply_reset(
    pool: &PgPool,
    identity: &VerifiedIdentity,
    new_password: &str,
) -> anyhow::Result<()> {
    let password_hash = utils::hash_secret(new_password)?;

    let query = match identity.role {
        Role::Student => {
            r"
            UPDATE students
            SET password = $1,
                refresh_token_hash = NULL,
                refresh_token_expires = NULL
            WHERE student_rollno = $2
            "
        }
        Role::Teacher => {
            r"
            UPDATE teachers
            SET password = $1,
                refresh_token_hash = NULL,
                refresh_token_expires = NULL
            WHERE teacher_id = $2
            "
        }
    };
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(password_hash)
        .bind(&identity.subject_id)
        .execute(pool)
        .instrument(span)
        .await
        .map_err(|err| anyhow::anyhow!("failed to update credential: {err}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    fn request(new_password: &str, confirm_password: &str) -> ResetPasswordRequest {
        ResetPasswordRequest {
            role: "student".to_string(),
            identifier: "21CS042".to_string(),
            otp: "482913".to_string(),
            new_password: new_password.to_string(),
            confirm_password: confirm_password.to_string(),
        }
    }

    #[tokio::test]
    async fn reset_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = reset_password(Extension(pool), None).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_mismatch() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = reset_password(
            Extension(pool),
            Some(Json(request("s3cret!", "different"))),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_password_too_short() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = reset_password(Extension(pool), Some(Json(request("abc", "abc"))))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_empty_passwords() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = reset_password(Extension(pool), Some(Json(request("", ""))))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
