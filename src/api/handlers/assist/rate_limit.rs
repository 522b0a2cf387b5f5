//! Admission control for the assist gateway.
//!
//! Two windows are enforced per subject: a daily quota over the calendar day
//! and a cooldown between consecutive admitted questions. Counts come from
//! the append-only usage log, which is written only after the guarded
//! downstream call succeeds, so a failed call never consumes quota or starts
//! a cooldown.
//!
//! Counting and admitting are not one atomic database step, so two
//! concurrent requests could both observe a clear window. The limiter closes
//! that race with per-subject in-flight reservations: the map lookup and
//! insert happen under one lock, the reservation counts as cooldown for
//! concurrent callers, and it is released when the guarded call completes
//! (successfully or not). Reservations also age out after the cooldown width
//! so a crashed handler cannot wedge a subject.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::storage;

const DEFAULT_DAILY_QUOTA: i64 = 10;
const DEFAULT_COOLDOWN_SECONDS: i64 = 2 * 60;

/// Quota/cooldown tunables.
#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
    daily_quota: i64,
    cooldown_seconds: i64,
}

impl RateLimitConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            daily_quota: DEFAULT_DAILY_QUOTA,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
        }
    }

    #[must_use]
    pub fn with_daily_quota(mut self, daily_quota: i64) -> Self {
        self.daily_quota = daily_quota;
        self
    }

    #[must_use]
    pub fn with_cooldown_seconds(mut self, cooldown_seconds: i64) -> Self {
        self.cooldown_seconds = cooldown_seconds;
        self
    }

    #[must_use]
    pub fn daily_quota(&self) -> i64 {
        self.daily_quota
    }

    #[must_use]
    pub fn cooldown_seconds(&self) -> i64 {
        self.cooldown_seconds
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Why an admission was denied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
    DailyLimit,
    Cooldown,
}

impl DenyReason {
    /// Wire value carried in deny responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DailyLimit => "daily_limit",
            Self::Cooldown => "rate_limit",
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Allowed {
        remaining_today: i64,
    },
    Denied {
        reason: DenyReason,
        wait_seconds: Option<i64>,
        remaining_today: i64,
    },
}

impl Decision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Seconds a caller must still wait, rounded up, never negative.
fn wait_seconds(cooldown_seconds: i64, elapsed_ms: i64) -> i64 {
    let remaining_ms = cooldown_seconds
        .saturating_mul(1000)
        .saturating_sub(elapsed_ms)
        .max(0);
    (remaining_ms + 999) / 1000
}

/// Process-wide admission gate over the usage log.
pub struct RateLimiter {
    config: RateLimitConfig,
    in_flight: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Decide admission and reserve the subject's slot when allowed.
    ///
    /// The caller must pair an `Allowed` result with exactly one later call
    /// to [`Self::complete`] or [`Self::release`].
    ///
    /// # Errors
    /// Returns an error if a usage-log query fails.
    pub async fn admit(&self, pool: &PgPool, subject: &str) -> Result<Decision> {
        self.evaluate(pool, subject, true).await
    }

    /// Non-reserving admission check (stats endpoint).
    ///
    /// # Errors
    /// Returns an error if a usage-log query fails.
    pub async fn check(&self, pool: &PgPool, subject: &str) -> Result<Decision> {
        self.evaluate(pool, subject, false).await
    }

    async fn evaluate(&self, pool: &PgPool, subject: &str, reserve: bool) -> Result<Decision> {
        let quota = self.config.daily_quota();
        let cooldown_seconds = self.config.cooldown_seconds();

        let count_today = storage::count_today(pool, subject).await?;
        if count_today >= quota {
            return Ok(Decision::Denied {
                reason: DenyReason::DailyLimit,
                wait_seconds: None,
                remaining_today: 0,
            });
        }
        let remaining_today = quota - count_today;

        let window_start = Utc::now() - ChronoDuration::seconds(cooldown_seconds);
        let count_recent = storage::count_since(pool, subject, window_start).await?;
        if count_recent >= 1 {
            let wait = match storage::last_event_at(pool, subject).await? {
                Some(last) => {
                    let elapsed_ms = (Utc::now() - last).num_milliseconds();
                    wait_seconds(cooldown_seconds, elapsed_ms)
                }
                None => 0,
            };
            return Ok(Decision::Denied {
                reason: DenyReason::Cooldown,
                wait_seconds: Some(wait),
                remaining_today,
            });
        }

        // Lookup and insert share one lock so two concurrent admits for the
        // same subject cannot both pass.
        let cooldown = Duration::from_secs(cooldown_seconds.max(0).unsigned_abs());
        let mut in_flight = self.in_flight.lock().await;
        in_flight.retain(|_, started| started.elapsed() < cooldown);
        if let Some(started) = in_flight.get(subject) {
            let elapsed_ms =
                i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
            return Ok(Decision::Denied {
                reason: DenyReason::Cooldown,
                wait_seconds: Some(wait_seconds(cooldown_seconds, elapsed_ms)),
                remaining_today,
            });
        }
        if reserve {
            in_flight.insert(subject.to_string(), Instant::now());
        }

        Ok(Decision::Allowed { remaining_today })
    }

    /// Record a successful guarded action and release the reservation.
    ///
    /// # Errors
    /// Returns an error if the usage append fails; the reservation is
    /// released either way, so a storage failure never charges the subject.
    pub async fn complete(
        &self,
        pool: &PgPool,
        subject: &str,
        question: &str,
        response: &str,
        tokens_used: i32,
    ) -> Result<()> {
        let result = storage::record_usage(pool, subject, question, response, tokens_used).await;
        self.release(subject).await;
        result
    }

    /// Drop the reservation without recording usage (failed guarded action).
    pub async fn release(&self, subject: &str) {
        self.in_flight.lock().await.remove(subject);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[test]
    fn config_defaults_and_overrides() {
        let config = RateLimitConfig::new();
        assert_eq!(config.daily_quota(), 10);
        assert_eq!(config.cooldown_seconds(), 120);

        let config = config.with_daily_quota(3).with_cooldown_seconds(10);
        assert_eq!(config.daily_quota(), 3);
        assert_eq!(config.cooldown_seconds(), 10);
    }

    #[test]
    fn deny_reason_wire_values() {
        assert_eq!(DenyReason::DailyLimit.as_str(), "daily_limit");
        assert_eq!(DenyReason::Cooldown.as_str(), "rate_limit");
    }

    #[test]
    fn decision_is_allowed() {
        assert!(Decision::Allowed { remaining_today: 1 }.is_allowed());
        assert!(!Decision::Denied {
            reason: DenyReason::Cooldown,
            wait_seconds: Some(90),
            remaining_today: 9,
        }
        .is_allowed());
    }

    #[test]
    fn wait_seconds_rounds_up_and_clamps() {
        // 30s into a 120s window leaves 90s.
        assert_eq!(wait_seconds(120, 30_000), 90);
        // A fraction of a second left still reports one full second.
        assert_eq!(wait_seconds(120, 119_001), 1);
        // Window already over: no wait, never negative.
        assert_eq!(wait_seconds(120, 120_000), 0);
        assert_eq!(wait_seconds(120, 500_000), 0);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let limiter = RateLimiter::new(RateLimitConfig::new());
        limiter.release("21CS042").await;
        limiter.release("21CS042").await;
    }

    #[tokio::test]
    async fn admit_propagates_store_errors() {
        // Lazy pool with nothing listening: the first count query fails.
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(100))
            .connect_lazy("postgres://postgres@127.0.0.1:1/postgres")
            .expect("lazy pool");
        let limiter = RateLimiter::new(RateLimitConfig::new());
        let result = limiter.admit(&pool, "21CS042").await;
        assert!(result.is_err());
    }
}
