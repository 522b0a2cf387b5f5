//! # Upasthit (Attendance Management Backend)
//!
//! `upasthit` is the backend for the Upasthit attendance platform. This crate
//! carries the security-sensitive core of the system: the one-time-code
//! challenge lifecycle used for credential resets, and the quota/cooldown
//! admission control that guards the downstream answering (assist) service.
//!
//! ## One-time codes
//!
//! Reset codes are short-lived (5 minutes by default), stored only as salted
//! `argon2` hashes, and strictly single-use. Issuing a new code supersedes any
//! outstanding one for the same subject; the delete+insert runs inside a
//! single transaction so at most one challenge row is ever observable per
//! `(subject, role)`.
//!
//! ## Admission control
//!
//! The assist gateway admits at most `daily-quota` questions per student per
//! calendar day, with a cooldown between consecutive questions. Usage is
//! recorded only after the downstream call succeeds, so an unreachable
//! answering service never consumes quota or triggers cooldown.
//!
//! ## Out-of-band delivery
//!
//! Plaintext codes are handed to a bounded in-process queue and delivered by a
//! background worker. Delivery is best-effort and decoupled from the request;
//! outcomes are only visible in the server logs. Codes are never persisted.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
