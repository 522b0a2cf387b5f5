//! Configuration and shared state for the reset-code flow.

use crate::api::notify::Notifier;

const DEFAULT_CODE_TTL_SECONDS: i64 = 5 * 60;

/// Tunables for code issuance.
#[derive(Clone, Copy, Debug)]
pub struct OtpConfig {
    ttl_seconds: i64,
}

impl OtpConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ttl_seconds: DEFAULT_CODE_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-process state handed to the reset-code handlers.
pub struct OtpState {
    config: OtpConfig,
    notifier: Notifier,
}

impl OtpState {
    #[must_use]
    pub fn new(config: OtpConfig, notifier: Notifier) -> Self {
        Self { config, notifier }
    }

    #[must_use]
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    pub(super) fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_config_defaults_and_overrides() {
        let config = OtpConfig::new();
        assert_eq!(config.ttl_seconds(), DEFAULT_CODE_TTL_SECONDS);

        let config = config.with_ttl_seconds(60);
        assert_eq!(config.ttl_seconds(), 60);
    }
}
