//! Role-aware resolution of human identifiers to canonical subjects.
//!
//! Students are keyed by roll number, teachers by email. Both resolve to a
//! [`Subject`] carrying the canonical id used by the challenge store and the
//! address the code is delivered to.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;

/// Principal kind a challenge or admission decision applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    /// Parse the wire value; anything else is a validation error.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student" => Some(Self::Student),
            "teacher" => Some(Self::Teacher),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
        }
    }

    /// Message used when an identifier does not resolve.
    #[must_use]
    pub const fn not_found_message(self) -> &'static str {
        match self {
            Self::Student => "Student not found or email not registered",
            Self::Teacher => "Teacher not found",
        }
    }
}

/// Canonical subject plus the address codes are delivered to.
#[derive(Debug, Clone)]
pub struct Subject {
    pub id: String,
    pub email: String,
}

/// Resolve a role-scoped identifier to a subject.
///
/// Students without a registered email resolve to `None`: a code could never
/// reach them, which callers surface the same way as an unknown identifier.
///
/// # Errors
/// Returns an error if the lookup query fails.
pub async fn resolve(pool: &PgPool, role: Role, identifier: &str) -> Result<Option<Subject>> {
    // A malformed address can never match a stored teacher row.
    if role == Role::Teacher && !crate::api::handlers::valid_email(identifier) {
        return Ok(None);
    }

    let query = match role {
        Role::Student => "SELECT student_rollno AS id, email FROM students WHERE student_rollno = $1",
        Role::Teacher => "SELECT teacher_id AS id, email FROM teachers WHERE email = $1",
    };
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(identifier)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to resolve subject")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let email: Option<String> = row.get("email");
    let Some(email) = email else {
        return Ok(None);
    };

    Ok(Some(Subject {
        id: row.get("id"),
        email,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_roles() {
        assert_eq!(Role::parse("student"), Some(Role::Student));
        assert_eq!(Role::parse("teacher"), Some(Role::Teacher));
    }

    #[test]
    fn parse_rejects_unknown_roles() {
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse("Student"), None);
    }

    #[test]
    fn role_round_trips_as_str() {
        for role in [Role::Student, Role::Teacher] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn not_found_messages_differ_by_role() {
        assert_ne!(
            Role::Student.not_found_message(),
            Role::Teacher.not_found_message()
        );
    }
}
