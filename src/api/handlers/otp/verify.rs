//! Verification and consumption of reset codes.
//!
//! A challenge is strictly single-use: a successful match deletes it before
//! the handler reports success, so an immediate retry with the same code
//! fails as not-found. Expired challenges are cleaned up lazily when a
//! verification attempt touches them; a mismatch leaves the challenge intact
//! so the subject can retry until expiry.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use sqlx::PgPool;
use tracing::error;

use super::identity::{self, Role};
use super::storage;
use super::types::{StatusResponse, VerifyCodeRequest};
use super::utils;

/// Proof that a subject just passed code verification.
///
/// Only handed to the next privileged step inside the same request; never
/// serialized or stored.
#[derive(Debug)]
pub struct VerifiedIdentity {
    pub subject_id: String,
    pub role: Role,
}

/// Result of attempting to consume the active challenge for a subject.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum ChallengeOutcome {
    /// Code matched; the challenge row is gone.
    Consumed,
    /// No active challenge (never issued, already consumed, or superseded).
    NotFound,
    /// Challenge was past its expiry; the stale row was removed.
    Expired,
    /// Wrong code; the challenge stays for further attempts.
    Mismatch,
}

/// Check a candidate code against the subject's active challenge and consume
/// it on a match.
///
/// # Errors
/// Returns an error if a store operation fails.
pub(super) async fn consume_challenge(
    pool: &PgPool,
    subject_id: &str,
    role: Role,
    candidate: &str,
) -> anyhow::Result<ChallengeOutcome> {
    let Some(challenge) = storage::latest_challenge(pool, subject_id, role).await? else {
        return Ok(ChallengeOutcome::NotFound);
    };

    if Utc::now() > challenge.expires_at {
        // Lazy expiry: stale rows are only removed when touched.
        storage::delete_challenge(pool, challenge.id).await?;
        return Ok(ChallengeOutcome::Expired);
    }

    if !utils::secret_matches(candidate, &challenge.code_hash)? {
        return Ok(ChallengeOutcome::Mismatch);
    }

    storage::delete_challenge(pool, challenge.id).await?;
    Ok(ChallengeOutcome::Consumed)
}

/// Verify a reset code. Consumes the challenge on success.
#[utoipa::path(
    post,
    path = "/v1/otp/forgot/verify",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Code verified and consumed", body = StatusResponse),
        (status = 400, description = "Missing fields, unknown code, expired, or mismatch", body = StatusResponse),
        (status = 404, description = "Unknown subject", body = StatusResponse)
    ),
    tag = "otp"
)]
pub async fn verify_code(
    pool: Extension<PgPool>,
    payload: Option<Json<VerifyCodeRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::fail("All fields are required")),
        )
            .into_response();
    };

    let role = request.role.trim();
    let identifier = request.identifier.trim();
    let otp = request.otp.trim();
    if role.is_empty() || identifier.is_empty() || otp.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::fail("All fields are required")),
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
                Json(StatusResponse::fail("Failed to verify OTP")),
            )
                .into_response();
        }
    };

    match consume_challenge(&pool, &subject.id, role, otp).await {
        Ok(ChallengeOutcome::Consumed) => (
            StatusCode::OK,
            Json(StatusResponse::ok("OTP verified successfully")),
        )
            .into_response(),
        Ok(ChallengeOutcome::NotFound) => (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::fail("OTP not found. Please resend OTP.")),
        )
            .into_response(),
        Ok(ChallengeOutcome::Expired) => (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::fail("OTP expired. Please resend OTP.")),
        )
            .into_response(),
        Ok(ChallengeOutcome::Mismatch) => (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::fail("Invalid OTP")),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to verify reset code: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse::fail("Failed to verify OTP")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn verify_code_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_code(Extension(pool), None).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_code_blank_otp() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_code(
            Extension(pool),
            Some(Json(VerifyCodeRequest {
                role: "student".to_string(),
                identifier: "21CS042".to_string(),
                otp: " ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_code_unknown_role() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_code(
            Extension(pool),
            Some(Json(VerifyCodeRequest {
                role: "principal".to_string(),
                identifier: "21CS042".to_string(),
                otp: "482913".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
