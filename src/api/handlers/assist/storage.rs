//! Database helpers for the assist usage log.
//!
//! `assist_usage` is append-only: rows are written only after the answering
//! service responded successfully, and admission decisions are computed from
//! time-windowed counts over it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

/// One recorded question/answer pair.
pub(super) struct UsageEntry {
    pub(super) question: String,
    pub(super) response: String,
    pub(super) created_at: DateTime<Utc>,
}

/// History row including its id for client-side pagination anchors.
pub(super) struct HistoryEntry {
    pub(super) id: Uuid,
    pub(super) question: String,
    pub(super) response: String,
    pub(super) created_at: DateTime<Utc>,
}

/// Admitted actions so far today (calendar day of the database clock).
pub(super) async fn count_today(pool: &PgPool, subject: &str) -> Result<i64> {
    let query = r"
        SELECT COUNT(*) AS count
        FROM assist_usage
        WHERE student_rollno = $1
          AND created_at::date = CURRENT_DATE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(subject)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count today's usage")?;
    Ok(row.get("count"))
}

/// Admitted actions since a point in time.
pub(super) async fn count_since(
    pool: &PgPool,
    subject: &str,
    since: DateTime<Utc>,
) -> Result<i64> {
    let query = r"
        SELECT COUNT(*) AS count
        FROM assist_usage
        WHERE student_rollno = $1
          AND created_at > $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(subject)
        .bind(since)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count recent usage")?;
    Ok(row.get("count"))
}

/// All-time admitted actions for a subject.
pub(super) async fn count_total(pool: &PgPool, subject: &str) -> Result<i64> {
    let query = "SELECT COUNT(*) AS count FROM assist_usage WHERE student_rollno = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(subject)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count total usage")?;
    Ok(row.get("count"))
}

/// Timestamp of the most recent admitted action, used for wait computation.
pub(super) async fn last_event_at(pool: &PgPool, subject: &str) -> Result<Option<DateTime<Utc>>> {
    let query = r"
        SELECT created_at
        FROM assist_usage
        WHERE student_rollno = $1
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
        .bind(subject)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to load last usage timestamp")?;
    Ok(row.map(|row| row.get("created_at")))
}

/// Append a usage event and bump the daily aggregate in one transaction.
/// Called only after the guarded downstream call succeeded.
pub(super) async fn record_usage(
    pool: &PgPool,
    subject: &str,
    question: &str,
    response: &str,
    tokens_used: i32,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin usage transaction")?;

    let query = r"
        INSERT INTO assist_usage (id, student_rollno, question, response, tokens_used)
        VALUES ($1, $2, $3, $4, $5)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(Uuid::new_v4())
        .bind(subject)
        .bind(question)
        .bind(response)
        .bind(tokens_used)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to append usage event")?;

    let query = r"
        INSERT INTO assist_daily_stats (date, total_questions, total_tokens)
        VALUES (CURRENT_DATE, 1, $1)
        ON CONFLICT (date)
        DO UPDATE SET
            total_questions = assist_daily_stats.total_questions + 1,
            total_tokens = assist_daily_stats.total_tokens + EXCLUDED.total_tokens
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(tokens_used)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to update daily stats")?;

    tx.commit().await.context("commit usage transaction")?;
    Ok(())
}

/// Most recent question/answer pairs for the stats endpoint.
pub(super) async fn recent(pool: &PgPool, subject: &str, limit: i64) -> Result<Vec<UsageEntry>> {
    let query = r"
        SELECT question, response, created_at
        FROM assist_usage
        WHERE student_rollno = $1
        ORDER BY created_at DESC
        LIMIT $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(subject)
        .bind(limit)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to load recent usage")?;

    Ok(rows
        .into_iter()
        .map(|row| UsageEntry {
            question: row.get("question"),
            response: row.get("response"),
            created_at: row.get("created_at"),
        })
        .collect())
}

/// Paginated history, newest first.
pub(super) async fn history(
    pool: &PgPool,
    subject: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<HistoryEntry>> {
    let query = r"
        SELECT id, question, response, created_at
        FROM assist_usage
        WHERE student_rollno = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(subject)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to load usage history")?;

    Ok(rows
        .into_iter()
        .map(|row| HistoryEntry {
            id: row.get("id"),
            question: row.get("question"),
            response: row.get("response"),
            created_at: row.get("created_at"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_entry_holds_values() {
        let now = Utc::now();
        let entry = UsageEntry {
            question: "What is the attendance cutoff?".to_string(),
            response: "75 percent.".to_string(),
            created_at: now,
        };
        assert_eq!(entry.question, "What is the attendance cutoff?");
        assert_eq!(entry.response, "75 percent.");
        assert_eq!(entry.created_at, now);
    }
}
