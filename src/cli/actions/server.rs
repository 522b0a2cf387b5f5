use crate::api;
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_url: String,
    pub otp_ttl_seconds: i64,
    pub mail_api_url: String,
    pub mail_api_key: Option<SecretString>,
    pub mail_from_email: String,
    pub mail_from_name: String,
    pub mail_queue_depth: usize,
    pub assist_url: String,
    pub assist_api_key: Option<SecretString>,
    pub assist_timeout_seconds: u64,
    pub assist_daily_quota: i64,
    pub assist_cooldown_seconds: i64,
}

/// Execute the server action.
///
/// # Errors
/// Returns an error if configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let otp_config = api::handlers::otp::OtpConfig::new().with_ttl_seconds(args.otp_ttl_seconds);

    let mut mail_config = api::notify::MailConfig::new(
        args.mail_api_url,
        args.mail_from_email,
        args.mail_from_name,
    )
    .with_queue_depth(args.mail_queue_depth);
    if let Some(key) = args.mail_api_key {
        mail_config = mail_config.with_api_key(key);
    }

    let rate_config = api::handlers::assist::RateLimitConfig::new()
        .with_daily_quota(args.assist_daily_quota)
        .with_cooldown_seconds(args.assist_cooldown_seconds);

    let mut assist_config = api::handlers::assist::AssistConfig::new(args.assist_url)
        .with_timeout_seconds(args.assist_timeout_seconds);
    if let Some(key) = args.assist_api_key {
        assist_config = assist_config.with_api_key(key);
    }

    api::new(
        args.port,
        args.dsn,
        &args.frontend_url,
        otp_config,
        mail_config,
        rate_config,
        assist_config,
    )
    .await
}
