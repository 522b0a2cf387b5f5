//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{assist, mail, otp};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let frontend_url = matches
        .get_one::<String>("frontend-url")
        .cloned()
        .context("missing required argument: --frontend-url")?;

    let otp_opts = otp::Options::parse(matches)?;
    let mail_opts = mail::Options::parse(matches)?;
    let assist_opts = assist::Options::parse(matches)?;

    Ok(Action::Server(Box::new(Args {
        port,
        dsn,
        frontend_url,
        otp_ttl_seconds: otp_opts.ttl_seconds,
        mail_api_url: mail_opts.api_url,
        mail_api_key: mail_opts.api_key,
        mail_from_email: mail_opts.from_email,
        mail_from_name: mail_opts.from_name,
        mail_queue_depth: mail_opts.queue_depth,
        assist_url: assist_opts.url,
        assist_api_key: assist_opts.api_key,
        assist_timeout_seconds: assist_opts.timeout_seconds,
        assist_daily_quota: assist_opts.daily_quota,
        assist_cooldown_seconds: assist_opts.cooldown_seconds,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;

    #[test]
    fn handler_builds_server_action() {
        temp_env::with_vars(
            [
                ("UPASTHIT_MAIL_API_KEY", None::<&str>),
                ("UPASTHIT_ASSIST_API_KEY", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec![
                    "upasthit",
                    "--dsn",
                    "postgres://user@localhost:5432/upasthit",
                    "--assist-url",
                    "https://assist.upasthit.com/api/chat",
                ]);
                let action = handler(&matches).expect("server action");
                let Action::Server(args) = action;
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, "postgres://user@localhost:5432/upasthit");
                assert_eq!(args.otp_ttl_seconds, 300);
                assert_eq!(args.assist_daily_quota, 10);
                assert_eq!(args.assist_cooldown_seconds, 120);
                assert_eq!(args.mail_queue_depth, 64);
            },
        );
    }
}
