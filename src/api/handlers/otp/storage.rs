//! Database helpers for the challenge store.
//!
//! At most one challenge row exists per `(subject, role)` after a completed
//! issuance: `replace_challenge` runs the delete and the insert inside a
//! single transaction, so concurrent reissues cannot leave two live rows.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::identity::Role;

/// One outstanding challenge, as read back for verification.
pub(super) struct Challenge {
    pub(super) id: Uuid,
    pub(super) code_hash: String,
    pub(super) expires_at: DateTime<Utc>,
}

/// Supersede any outstanding challenge and insert the new one atomically.
/// Returns the expiry of the stored challenge.
///
/// # Errors
/// Returns an error if the transaction fails; no partial state remains.
pub(super) async fn replace_challenge(
    pool: &PgPool,
    subject_id: &str,
    role: Role,
    code_hash: &str,
    ttl_seconds: i64,
) -> Result<DateTime<Utc>> {
    let mut tx = pool.begin().await.context("begin challenge transaction")?;

    let query = "DELETE FROM password_otps WHERE user_id = $1 AND role = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(subject_id)
        .bind(role.as_str())
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to delete outstanding challenge")?;

    let query = r"
        INSERT INTO password_otps (id, user_id, role, otp, expires_at)
        VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
        RETURNING expires_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(Uuid::new_v4())
        .bind(subject_id)
        .bind(role.as_str())
        .bind(code_hash)
        .bind(ttl_seconds)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert challenge")?;

    tx.commit().await.context("commit challenge transaction")?;

    Ok(row.get("expires_at"))
}

/// Most recently issued challenge for a subject, if any.
///
/// # Errors
/// Returns an error if the lookup query fails.
pub(super) async fn latest_challenge(
    pool: &PgPool,
    subject_id: &str,
    role: Role,
) -> Result<Option<Challenge>> {
    let query = r"
        SELECT id, otp, expires_at
        FROM password_otps
        WHERE user_id = $1 AND role = $2
        ORDER BY created_at DESC
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(subject_id)
        .bind(role.as_str())
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to load latest challenge")?;

    Ok(row.map(|row| Challenge {
        id: row.get("id"),
        code_hash: row.get("otp"),
        expires_at: row.get("expires_at"),
    }))
}

/// Remove a challenge row (consumption or lazy expiry).
///
/// # Errors
/// Returns an error if the delete fails.
pub(super) async fn delete_challenge(pool: &PgPool, id: Uuid) -> Result<()> {
    let query = "DELETE FROM password_otps WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete challenge")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_holds_values() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let challenge = Challenge {
            id,
            code_hash: "$argon2id$stub".to_string(),
            expires_at: now,
        };
        assert_eq!(challenge.id, id);
        assert_eq!(challenge.code_hash, "$argon2id$stub");
        assert_eq!(challenge.expires_at, now);
    }
}
