//! API handlers for Upasthit.
//!
//! Route handlers live in submodules by concern: `otp` for the reset-code
//! lifecycle, `assist` for the admission-guarded answering gateway.

pub mod assist;
pub mod health;
pub mod otp;
pub mod root;

use regex::Regex;

/// Lightweight email sanity check used before identifier lookups.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}
